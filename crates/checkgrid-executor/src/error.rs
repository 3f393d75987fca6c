//! Executor error types.

use checkgrid_state::RunId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExecutorError {
    /// The runner process could not be started.
    #[error("failed to spawn runner for run {run_id}: {message}")]
    Spawn { run_id: RunId, message: String },

    #[error("run {0} already has a live runner process")]
    AlreadyRunning(RunId),

    #[error("cleanup for run {0} timed out")]
    Timeout(RunId),

    #[error("runner for run {run_id} exited with {exit_code:?}")]
    Failed { run_id: RunId, exit_code: Option<i32> },
}

pub type ExecResult<T> = Result<T, ExecutorError>;
