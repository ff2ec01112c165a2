//! Task queue trait.

use async_trait::async_trait;

use crate::error::QueueError;
use crate::task::{TaskId, TaskRecord, TaskRequest};

/// Trait for task queue backends.
///
/// Implementations own their bookkeeping: `status` must answer from it
/// without running or waiting on the task.
#[async_trait]
pub trait TaskQueue: Send + Sync {
    /// Queue a task and return its id. Fails for unregistered task names or
    /// unknown queues.
    async fn enqueue(&self, request: TaskRequest) -> Result<TaskId, QueueError>;

    /// Current bookkeeping for a task, or `None` if the id was never seen.
    async fn status(&self, id: &TaskId) -> Option<TaskRecord>;

    /// Revoke a task. Pending tasks never run. Running tasks see the flag
    /// through their context. Returns `false` for unknown or finished tasks.
    async fn revoke(&self, id: &TaskId) -> Result<bool, QueueError>;
}
