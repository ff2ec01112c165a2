use thiserror::Error;

use crate::registry::ConnectionId;

/// Per-connection delivery failures. Broadcasters contain these by dropping
/// the offending connection; they never reach the publisher.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RealtimeError {
    #[error("connection lost: {0}")]
    ConnectionLost(ConnectionId),

    #[error("outbound queue full for connection {0}")]
    Overflow(ConnectionId),
}
