//! Task handler trait and the context handed to each run.

use std::sync::Arc;

use async_trait::async_trait;

use crate::ledger::Ledger;
use crate::task::{TaskId, TaskState};

/// A task that ran to completion but did not succeed.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskFailure {
    pub message: String,
    /// Stored as the task's traceback. Falls back to `message`.
    pub traceback: Option<String>,
    /// Stored as the task's result, for handlers that report a summary.
    pub summary: Option<serde_json::Value>,
}

impl TaskFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            traceback: None,
            summary: None,
        }
    }

    pub fn with_traceback(mut self, traceback: impl Into<String>) -> Self {
        self.traceback = Some(traceback.into());
        self
    }

    pub fn with_summary(mut self, summary: serde_json::Value) -> Self {
        self.summary = Some(summary);
        self
    }
}

/// Executes one named kind of task.
#[async_trait]
pub trait TaskHandler: Send + Sync {
    async fn run(&self, ctx: TaskContext, args: serde_json::Value)
        -> Result<serde_json::Value, TaskFailure>;
}

/// Per-run view of the queue's bookkeeping for the current task.
#[derive(Clone)]
pub struct TaskContext {
    id: TaskId,
    ledger: Arc<Ledger>,
}

impl TaskContext {
    pub(crate) fn new(id: TaskId, ledger: Arc<Ledger>) -> Self {
        Self { id, ledger }
    }

    /// A context not attached to any queue, for running a handler inline.
    pub fn detached() -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            ledger: Arc::new(Ledger::default()),
        }
    }

    pub fn task_id(&self) -> TaskId {
        self.id
    }

    /// Whether the task was revoked. Handlers check this between steps.
    pub fn is_revoked(&self) -> bool {
        self.ledger.state(&self.id) == Some(TaskState::Revoked)
    }

    /// Report that the task is waiting to retry. `meta` is visible to status queries.
    pub fn mark_retry(&self, meta: serde_json::Value) {
        self.ledger.mark(&self.id, TaskState::Retry, Some(meta));
    }

    /// Report that the task is running again after a retry wait.
    pub fn mark_started(&self) {
        self.ledger.mark(&self.id, TaskState::Started, None);
    }
}
