use thiserror::Error;

use crate::execution::ExecutionStatus;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("invalid execution transition: {from} -> {to}")]
    InvalidTransition {
        from: ExecutionStatus,
        to: ExecutionStatus,
    },

    #[error("unknown execution status: {0}")]
    UnknownStatus(String),
}
