//! Event payload.

use checkgrid_state::{RunId, TestRecord, TestRun};
use serde::{Deserialize, Serialize};

/// One committed transition, of a run or of one of its tests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunEvent {
    pub run_id: RunId,
    pub test_set_id: String,
    pub cluster_id: String,
    /// New status of the run, or of the test when `test_id` is set.
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub timestamp: u64,
}

impl RunEvent {
    pub fn for_run(run: &TestRun, timestamp: u64) -> Self {
        Self {
            run_id: run.id,
            test_set_id: run.test_set_id.clone(),
            cluster_id: run.cluster_id.clone(),
            status: run.status.to_string(),
            test_id: None,
            message: None,
            timestamp,
        }
    }

    pub fn for_test(run: &TestRun, test: &TestRecord, timestamp: u64) -> Self {
        Self {
            status: test.status.to_string(),
            test_id: Some(test.id.clone()),
            message: test.message.clone(),
            ..Self::for_run(run, timestamp)
        }
    }

    pub fn is_run_event(&self) -> bool {
        self.test_id.is_none()
    }
}
