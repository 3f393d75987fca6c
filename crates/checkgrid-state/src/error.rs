//! Store errors. Backend and codec failures carry the rendered cause.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StateError {
    #[error("cannot open store: {0}")]
    Open(String),

    #[error("store transaction failed: {0}")]
    Transaction(String),

    #[error("cannot open table: {0}")]
    Table(String),

    #[error("store read failed: {0}")]
    Read(String),

    #[error("store write failed: {0}")]
    Write(String),

    /// A record could not be encoded to or decoded from JSON.
    #[error("record codec error: {0}")]
    Codec(String),

    #[error("schema migration failed: {0}")]
    Migration(String),
}

pub type StateResult<T> = Result<T, StateError>;
