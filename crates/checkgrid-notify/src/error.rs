//! Publication error types. These never reach a publisher; the delivery
//! task logs and drops them.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("failed to serialize event: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("event endpoint unreachable: {0}")]
    Connect(String),

    #[error("event endpoint returned HTTP {0}")]
    Status(u16),

    #[error("event delivery timed out")]
    Timeout,

    #[error("sink rejected event: {0}")]
    Rejected(String),
}
