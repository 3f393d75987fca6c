//! Cluster metadata error types.

use thiserror::Error;

/// A cluster state refresh failed.
#[derive(Debug, Error)]
pub enum ClusterStateFetchError {
    #[error("invalid metadata url: {0}")]
    InvalidUrl(String),

    #[error("metadata service unreachable: {0}")]
    Connect(String),

    #[error("metadata service returned HTTP {0}")]
    Status(u16),

    #[error("metadata request timed out")]
    Timeout,

    #[error("malformed cluster metadata: {0}")]
    Malformed(String),

    #[error("no snapshot for cluster {cluster_id}: {cause}")]
    NoSnapshot { cluster_id: String, cause: String },

    #[error("state store error: {0}")]
    State(#[from] checkgrid_state::StateError),
}

pub type FetchResult<T> = Result<T, ClusterStateFetchError>;
