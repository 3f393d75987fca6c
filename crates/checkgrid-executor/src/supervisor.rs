//! The seam between the run state machine and process supervision.

use checkgrid_state::RunId;
use tokio::sync::mpsc;

use crate::error::ExecResult;
use crate::outcome::TestOutcome;

pub type BoxFuture<'a, T> = std::pin::Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;

/// What to run for one test run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpawnRequest {
    pub run_id: RunId,
    pub cluster_id: String,
    pub test_path: String,
    /// Tests the runner should execute, in order.
    pub test_ids: Vec<String>,
}

/// Best-effort cleanup invocation after a stop or crash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanupRequest {
    pub run_id: RunId,
    pub cluster_id: String,
    pub cleanup_path: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessHandle {
    pub run_id: RunId,
    pub pid: u32,
}

/// Emitted by a supervised process, in the order it happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutorEvent {
    Outcome {
        run_id: RunId,
        pid: u32,
        outcome: TestOutcome,
    },
    /// The process has been reaped. Always the last event for `pid`.
    Exited {
        run_id: RunId,
        pid: u32,
        exit_code: Option<i32>,
        /// Exit followed a `terminate` request.
        terminated: bool,
    },
}

impl ExecutorEvent {
    pub fn run_id(&self) -> RunId {
        match self {
            ExecutorEvent::Outcome { run_id, .. } | ExecutorEvent::Exited { run_id, .. } => *run_id,
        }
    }

    pub fn pid(&self) -> u32 {
        match self {
            ExecutorEvent::Outcome { pid, .. } | ExecutorEvent::Exited { pid, .. } => *pid,
        }
    }
}

/// Process supervision as seen by the run state machine.
pub trait Supervisor: Send + Sync {
    /// Start the runner for a run. Events for the new process go to `events`.
    ///
    /// Fails with `AlreadyRunning` while a previous process of the same run
    /// has not been reaped.
    fn spawn(
        &self,
        request: SpawnRequest,
        events: mpsc::Sender<ExecutorEvent>,
    ) -> ExecResult<ProcessHandle>;

    /// Ask the process of `run_id` to stop: SIGTERM, then SIGKILL after the
    /// grace period. Returns immediately; `false` when nothing is running.
    fn terminate(&self, run_id: RunId) -> bool;

    /// Resolves once no process of `run_id` is alive.
    fn wait_for_exit(&self, run_id: RunId) -> BoxFuture<'_, ()>;

    /// Run the cleanup invocation to completion or timeout.
    fn cleanup(&self, request: CleanupRequest) -> BoxFuture<'_, ExecResult<()>>;

    fn is_alive(&self, run_id: RunId) -> bool;
}
