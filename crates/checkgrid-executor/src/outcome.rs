//! Runner stdout protocol.
//!
//! Each stdout line that parses as a JSON object with `test_id` and
//! `status` is one outcome. Anything else is runner chatter and only
//! logged.

use checkgrid_state::TestStatus;
use serde::{Deserialize, Serialize};

/// One reported test status change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestOutcome {
    pub test_id: String,
    pub status: TestStatus,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub started_at: Option<u64>,
    #[serde(default)]
    pub ended_at: Option<u64>,
}

/// Parse one stdout line. `None` for anything that is not an outcome.
pub fn parse_line(line: &str) -> Option<TestOutcome> {
    let line = line.trim();
    if !line.starts_with('{') {
        return None;
    }
    serde_json::from_str(line).ok()
}
