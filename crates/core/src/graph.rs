use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A stored agent/task graph. The definition is handed to the crew engine as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct Graph {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub definition: serde_json::Value,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl Graph {
    pub fn new(id: impl Into<String>, name: impl Into<String>, definition: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            definition,
            created_at: Utc::now(),
        }
    }
}
