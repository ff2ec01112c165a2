//! Queue error types.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueueError {
    #[error("unknown task: {0}")]
    UnknownTask(String),

    #[error("unknown queue: {0}")]
    UnknownQueue(String),

    #[error("queue is shutting down")]
    ShuttingDown,

    #[error("handler error: {0}")]
    Handler(String),

    #[error("timeout after {0}ms")]
    Timeout(u64),
}
