//! Task requests and the queue's own bookkeeping for them.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type TaskId = Uuid;

/// Queue used when a request names none.
pub const DEFAULT_QUEUE: &str = "executions";

/// Queue for housekeeping tasks.
pub const MAINTENANCE_QUEUE: &str = "maintenance";

/// A unit of work to hand to a named handler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRequest {
    /// Registered handler name, e.g. `execute_crew`.
    pub name: String,
    pub args: serde_json::Value,
    /// Higher runs first. Equal priorities run in enqueue order.
    #[serde(default)]
    pub priority: i32,
    #[serde(default = "default_queue")]
    pub queue: String,
}

fn default_queue() -> String {
    DEFAULT_QUEUE.to_string()
}

impl TaskRequest {
    pub fn new(name: impl Into<String>, args: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            args,
            priority: 0,
            queue: default_queue(),
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn on_queue(mut self, queue: impl Into<String>) -> Self {
        self.queue = queue.into();
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Pending,
    Started,
    /// Between attempts, waiting out a backoff.
    Retry,
    Success,
    Failure,
    Revoked,
}

impl TaskState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Started => "started",
            Self::Retry => "retry",
            Self::Success => "success",
            Self::Failure => "failure",
            Self::Revoked => "revoked",
        }
    }

    /// Whether the task has stopped running for good.
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Success | Self::Failure | Self::Revoked)
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskRecord {
    pub id: TaskId,
    pub name: String,
    pub queue: String,
    pub priority: i32,
    pub state: TaskState,
    #[serde(skip)]
    pub args: serde_json::Value,
    pub result: Option<serde_json::Value>,
    pub traceback: Option<String>,
    /// Progress details published by the handler while it runs.
    pub meta: Option<serde_json::Value>,
    pub enqueued_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl TaskRecord {
    pub(crate) fn pending(id: TaskId, request: TaskRequest) -> Self {
        Self {
            id,
            name: request.name,
            queue: request.queue,
            priority: request.priority,
            state: TaskState::Pending,
            args: request.args,
            result: None,
            traceback: None,
            meta: None,
            enqueued_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }
}

/// Status as reported to callers.
///
/// `status` is a [`TaskState`] name, or `"unknown"` for ids the queue has
/// never seen. `result` is only filled once the task is ready, `traceback`
/// only on failure.
#[derive(Debug, Clone, PartialEq, Serialize, utoipa::ToSchema)]
pub struct TaskStatusReport {
    pub id: String,
    pub status: String,
    pub result: Option<serde_json::Value>,
    pub traceback: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
    pub meta: Option<serde_json::Value>,
}

impl TaskStatusReport {
    pub const UNKNOWN: &'static str = "unknown";

    pub fn unknown(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status: Self::UNKNOWN.to_string(),
            result: None,
            traceback: None,
            completed_at: None,
            meta: None,
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.status == Self::UNKNOWN
    }
}

impl From<&TaskRecord> for TaskStatusReport {
    fn from(record: &TaskRecord) -> Self {
        let ready = record.state.is_ready();
        Self {
            id: record.id.to_string(),
            status: record.state.as_str().to_string(),
            result: if ready { record.result.clone() } else { None },
            traceback: if record.state == TaskState::Failure {
                record.traceback.clone()
            } else {
                None
            },
            completed_at: record.completed_at,
            meta: record.meta.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_defaults_to_execution_queue() {
        let req: TaskRequest =
            serde_json::from_value(json!({"name": "execute_crew", "args": {}})).unwrap();
        assert_eq!(req.queue, DEFAULT_QUEUE);
        assert_eq!(req.priority, 0);

        let req = TaskRequest::new("cleanup_execution", json!({}))
            .with_priority(5)
            .on_queue("maintenance");
        assert_eq!(req.queue, "maintenance");
        assert_eq!(req.priority, 5);
    }

    #[test]
    fn report_hides_result_until_ready() {
        let mut record = TaskRecord::pending(Uuid::new_v4(), TaskRequest::new("t", json!({})));
        record.state = TaskState::Started;
        record.result = Some(json!("partial"));
        record.traceback = Some("boom".into());

        let report = TaskStatusReport::from(&record);
        assert_eq!(report.status, "started");
        assert!(report.result.is_none());
        assert!(report.traceback.is_none());

        record.state = TaskState::Failure;
        let report = TaskStatusReport::from(&record);
        assert_eq!(report.result, Some(json!("partial")));
        assert_eq!(report.traceback.as_deref(), Some("boom"));
    }

    #[test]
    fn unknown_report() {
        let report = TaskStatusReport::unknown("nope");
        assert!(report.is_unknown());
        assert_eq!(report.id, "nope");
        assert!(!TaskState::Retry.is_ready());
        assert!(TaskState::Revoked.is_ready());
    }
}
