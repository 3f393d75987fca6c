//! Pure transition rules over runs and tests.
//!
//! Nothing here touches the store or the executor; the machine applies
//! these rules under the per-run lock and persists the result.

use checkgrid_state::{RunStatus, TestRecord, TestStatus};

pub const CRASH_MESSAGE: &str = "execution terminated unexpectedly";
pub const ORPHAN_MESSAGE: &str = "execution interrupted by daemon restart";

/// Why a reported outcome was not applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutcomeRejected {
    /// The test already ended.
    AlreadyEnded(TestStatus),
    /// Runners may only report `running` or a terminal status.
    NotReportable(TestStatus),
}

pub fn can_stop(status: RunStatus) -> bool {
    matches!(
        status,
        RunStatus::Running | RunStatus::WaitRunning | RunStatus::Restarted
    )
}

/// `restarted` only qualifies when it never got a process, i.e. a retry
/// after a failed spawn.
pub fn can_restart(status: RunStatus, has_process: bool) -> bool {
    match status {
        RunStatus::Stopped | RunStatus::Finished | RunStatus::Error => true,
        RunStatus::Restarted => !has_process,
        RunStatus::WaitRunning | RunStatus::Running => false,
    }
}

/// Statuses a runner may report for a test.
pub fn reportable(status: TestStatus) -> bool {
    matches!(
        status,
        TestStatus::Running
            | TestStatus::Success
            | TestStatus::Failure
            | TestStatus::Error
            | TestStatus::Skipped
            | TestStatus::Disabled
    )
}

/// Apply one reported outcome to a test.
pub fn apply_outcome(
    test: &mut TestRecord,
    status: TestStatus,
    message: Option<String>,
    started_at: Option<u64>,
    ended_at: Option<u64>,
    now: u64,
) -> Result<(), OutcomeRejected> {
    if !reportable(status) {
        return Err(OutcomeRejected::NotReportable(status));
    }
    if !test.status.is_outstanding() {
        return Err(OutcomeRejected::AlreadyEnded(test.status));
    }

    if status == TestStatus::Running {
        test.status = TestStatus::Running;
        test.started_at = Some(started_at.unwrap_or(now));
        if message.is_some() {
            test.message = message;
        }
        return Ok(());
    }

    test.status = status;
    test.message = message;
    test.started_at = test.started_at.or(started_at).or(Some(now));
    test.ended_at = Some(ended_at.unwrap_or(now));
    Ok(())
}

pub fn has_outstanding(tests: &[TestRecord]) -> bool {
    tests.iter().any(|t| t.status.is_outstanding())
}

/// Run status once no test is outstanding: `error` when any test errored,
/// otherwise `finished`.
pub fn settled_status(tests: &[TestRecord]) -> RunStatus {
    if tests.iter().any(|t| t.status == TestStatus::Error) {
        RunStatus::Error
    } else {
        RunStatus::Finished
    }
}

/// End every outstanding test with `status`. Returns the indices changed.
pub fn end_outstanding(
    tests: &mut [TestRecord],
    status: TestStatus,
    message: Option<&str>,
    now: u64,
) -> Vec<usize> {
    let mut changed = Vec::new();
    for (i, test) in tests.iter_mut().enumerate() {
        if test.status.is_outstanding() {
            test.status = status;
            if let Some(message) = message {
                test.message = Some(message.to_string());
            }
            test.ended_at = Some(now);
            changed.push(i);
        }
    }
    changed
}

/// Reset tests for a full rerun. Tests left out of the run's selection
/// stay `disabled`.
pub fn reset_for_rerun(tests: &mut [TestRecord]) {
    for test in tests.iter_mut().filter(|t| t.status != TestStatus::Disabled) {
        test.status = TestStatus::WaitRunning;
        test.message = None;
        test.started_at = None;
        test.ended_at = None;
    }
}
