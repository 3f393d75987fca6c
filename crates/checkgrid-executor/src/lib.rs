//! checkgrid-executor: supervision of external check-runner processes.
//!
//! One runner process per active test run. The runner reports per-test
//! outcomes as JSON lines on stdout; the supervisor forwards them, and the
//! final exit, as [`ExecutorEvent`]s tagged with the process id so a
//! consumer can discard events from a superseded process.

pub mod error;
pub mod outcome;
pub mod process;
pub mod supervisor;

pub use error::{ExecResult, ExecutorError};
pub use outcome::TestOutcome;
pub use process::ProcessSupervisor;
pub use supervisor::{BoxFuture, CleanupRequest, ExecutorEvent, ProcessHandle, SpawnRequest, Supervisor};
