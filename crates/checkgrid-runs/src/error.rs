//! Run state machine error types.

use checkgrid_state::{RunId, RunStatus};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RunError {
    #[error("test run not found: {0}")]
    NotFound(RunId),

    #[error("test set not found: {0}")]
    TestSetNotFound(String),

    #[error("cannot {action} run {run_id} while {status}")]
    InvalidTransition {
        run_id: RunId,
        action: &'static str,
        status: RunStatus,
    },

    #[error("run {run_id} is already active for {cluster_id}/{test_set_id}")]
    AlreadyActive {
        run_id: RunId,
        cluster_id: String,
        test_set_id: String,
    },

    #[error("no eligible tests in {test_set_id} for cluster {cluster_id}")]
    NoEligibleTests {
        cluster_id: String,
        test_set_id: String,
    },

    #[error("unknown tests for {test_set_id}: {}", .test_ids.join(", "))]
    UnknownTests {
        test_set_id: String,
        test_ids: Vec<String>,
    },

    #[error("test set {test_set_id} conflicts with active run {run_id} of {conflicting} on {cluster_id}")]
    ExclusiveConflict {
        cluster_id: String,
        test_set_id: String,
        conflicting: String,
        run_id: RunId,
    },

    #[error("run {run_id} is superseded by run {latest} of the same test set")]
    Superseded { run_id: RunId, latest: RunId },

    #[error("outcome for {test_id} in run {run_id} rejected: {reason}")]
    OutcomeRejected {
        run_id: RunId,
        test_id: String,
        reason: String,
    },

    #[error("cluster state unavailable: {0}")]
    ClusterState(#[from] checkgrid_cluster::ClusterStateFetchError),

    #[error("runner spawn failed: {0}")]
    Spawn(#[from] checkgrid_executor::ExecutorError),

    #[error("state store error: {0}")]
    State(#[from] checkgrid_state::StateError),

    #[error("catalog error: {0}")]
    Catalog(checkgrid_catalog::CatalogError),
}

impl From<checkgrid_catalog::CatalogError> for RunError {
    fn from(e: checkgrid_catalog::CatalogError) -> Self {
        match e {
            checkgrid_catalog::CatalogError::NotFound(id) => RunError::TestSetNotFound(id),
            other => RunError::Catalog(other),
        }
    }
}

pub type RunResult<T> = Result<T, RunError>;
