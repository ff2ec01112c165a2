//! Execution error types.

use crewstream_core::{CoreError, ExecutionStatus};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExecutionError {
    #[error("{resource} not found: {id}")]
    NotFound { resource: &'static str, id: String },

    #[error("validation error: {0}")]
    Validation(String),

    #[error("crew execution failed: {0}")]
    TransientExecution(String),

    #[error("crew call timed out after {0}s")]
    Timeout(u64),

    /// The stored execution is already terminal and rejects the write.
    #[error("execution {id} is already {status}")]
    Conflict { id: String, status: ExecutionStatus },

    #[error("storage error: {0}")]
    Storage(String),
}

impl ExecutionError {
    pub fn not_found(resource: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            resource,
            id: id.to_string(),
        }
    }

    pub fn conflict(id: impl ToString, status: ExecutionStatus) -> Self {
        Self::Conflict {
            id: id.to_string(),
            status,
        }
    }

    /// Whether another attempt may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::TransientExecution(_) | Self::Timeout(_))
    }

    /// Stable name recorded in `error_details.kind`.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::Validation(_) => "validation",
            Self::TransientExecution(_) => "transient_execution",
            Self::Timeout(_) => "timeout",
            Self::Conflict { .. } => "conflict",
            Self::Storage(_) => "storage",
        }
    }
}

impl From<sqlx::Error> for ExecutionError {
    fn from(e: sqlx::Error) -> Self {
        Self::Storage(e.to_string())
    }
}

impl From<CoreError> for ExecutionError {
    fn from(e: CoreError) -> Self {
        Self::Validation(e.to_string())
    }
}
