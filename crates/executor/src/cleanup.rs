//! The `cleanup_execution` maintenance task.

use std::sync::Arc;

use async_trait::async_trait;
use crewstream_core::ExecutionStatus;
use crewstream_queue::{TaskContext, TaskFailure, TaskHandler};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use crate::error::ExecutionError;
use crate::store::Database;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanupArgs {
    pub execution_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleanupReport {
    pub execution_id: Uuid,
    pub found: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ExecutionStatus>,
}

/// Looks an execution up and reports what it found. Mutates nothing.
pub struct CleanupTask {
    database: Arc<dyn Database>,
}

impl CleanupTask {
    pub fn new(database: Arc<dyn Database>) -> Self {
        Self { database }
    }

    pub async fn cleanup(&self, execution_id: Uuid) -> Result<CleanupReport, ExecutionError> {
        let mut session = self.database.session().await?;
        let execution = session.get_execution(&execution_id).await?;
        let report = CleanupReport {
            execution_id,
            found: execution.is_some(),
            status: execution.map(|e| e.status),
        };
        info!(
            execution_id = %execution_id,
            found = report.found,
            status = ?report.status,
            "execution cleanup checked"
        );
        Ok(report)
    }
}

#[async_trait]
impl TaskHandler for CleanupTask {
    async fn run(&self, _ctx: TaskContext, args: Value) -> Result<Value, TaskFailure> {
        let args: CleanupArgs = serde_json::from_value(args)
            .map_err(|e| TaskFailure::new(format!("invalid cleanup arguments: {e}")))?;
        let report = self
            .cleanup(args.execution_id)
            .await
            .map_err(|e| TaskFailure::new(e.to_string()))?;
        serde_json::to_value(report).map_err(|e| TaskFailure::new(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crewstream_core::{Execution, NewExecution};
    use serde_json::json;

    use crate::memory::MemoryDatabase;
    use crate::store::Session;

    #[tokio::test]
    async fn reports_found_and_missing() {
        let db = MemoryDatabase::new();
        let execution = Execution::new(NewExecution {
            id: Uuid::new_v4(),
            graph_id: "g1".into(),
            user_id: "u1".into(),
            thread_id: None,
            trigger_message_id: None,
            priority: 0,
            config: json!({}),
            inputs: json!({}),
        });
        db.session()
            .await
            .unwrap()
            .create_execution(&execution)
            .await
            .unwrap();

        let task = CleanupTask::new(Arc::new(db.clone()));
        let report = task.cleanup(execution.id).await.unwrap();
        assert!(report.found);
        assert_eq!(report.status, Some(ExecutionStatus::Pending));

        let missing = Uuid::new_v4();
        let value = task
            .run(TaskContext::detached(), json!({ "execution_id": missing }))
            .await
            .unwrap();
        assert_eq!(value, json!({ "execution_id": missing, "found": false }));
        assert_eq!(db.open_sessions(), 0);
    }
}
