//! Persisted record types.
//!
//! Test runs and their tests are append-only history: a run is never
//! deleted, a new start for the same (cluster, test set) pair creates a new
//! row. All types serialize to JSON for storage in redb tables.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a test run, allocated from a persisted counter.
pub type RunId = u64;

// ── Test run ──────────────────────────────────────────────────────

/// Lifecycle status of a test run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    WaitRunning,
    Running,
    Stopped,
    Restarted,
    Finished,
    Error,
}

impl RunStatus {
    /// Statuses that hold a claim on the (cluster, test set) pair.
    pub fn is_active(self) -> bool {
        matches!(
            self,
            RunStatus::WaitRunning | RunStatus::Running | RunStatus::Restarted
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RunStatus::WaitRunning => "wait_running",
            RunStatus::Running => "running",
            RunStatus::Stopped => "stopped",
            RunStatus::Restarted => "restarted",
            RunStatus::Finished => "finished",
            RunStatus::Error => "error",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One execution attempt of a test set against a cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestRun {
    pub id: RunId,
    pub cluster_id: String,
    pub test_set_id: String,
    pub status: RunStatus,
    /// Process id of the supervised runner, if one is attached.
    pub pid: Option<u32>,
    /// Unix timestamp (seconds) of creation or the latest restart.
    pub started_at: u64,
    pub ended_at: Option<u64>,
    /// Copied from the cluster snapshot at creation, never updated.
    pub release_version: String,
    /// Runner locator of the test set, frozen at creation.
    #[serde(default)]
    pub test_path: String,
    #[serde(default)]
    pub cleanup_path: Option<String>,
    #[serde(default)]
    pub updated_at: u64,
}

impl TestRun {
    pub fn table_key(&self) -> String {
        run_key(self.id)
    }

    /// Key for the run index: `{cluster_id}/{test_set_id}`.
    pub fn index_key(&self) -> String {
        index_key(&self.cluster_id, &self.test_set_id)
    }
}

// ── Test ──────────────────────────────────────────────────────────

/// Status of a single test within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestStatus {
    WaitRunning,
    Running,
    Success,
    Failure,
    Error,
    Skipped,
    Stopped,
    Restarted,
    Disabled,
}

impl TestStatus {
    /// Not yet ended: still waiting for the runner to report.
    pub fn is_outstanding(self) -> bool {
        matches!(self, TestStatus::WaitRunning | TestStatus::Running)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TestStatus::WaitRunning => "wait_running",
            TestStatus::Running => "running",
            TestStatus::Success => "success",
            TestStatus::Failure => "failure",
            TestStatus::Error => "error",
            TestStatus::Skipped => "skipped",
            TestStatus::Stopped => "stopped",
            TestStatus::Restarted => "restarted",
            TestStatus::Disabled => "disabled",
        }
    }
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persisted per-test record of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestRecord {
    /// Test profile id (fully-qualified locator).
    pub id: String,
    pub test_run_id: RunId,
    /// Declaration order within the test set.
    pub position: u32,
    #[serde(default)]
    pub title: String,
    pub status: TestStatus,
    pub message: Option<String>,
    pub started_at: Option<u64>,
    pub ended_at: Option<u64>,
}

impl TestRecord {
    pub fn table_key(&self) -> String {
        format!("{}:{:05}", run_key(self.test_run_id), self.position)
    }
}

// ── Catalog history ───────────────────────────────────────────────

/// Record of a successful catalog load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogSnapshotRecord {
    /// SHA-256 hex digest of the loaded profiles.
    pub fingerprint: String,
    pub loaded_at: u64,
    /// Where the profiles came from (directory path or "memory").
    pub source: String,
    pub test_set_ids: Vec<String>,
}

impl CatalogSnapshotRecord {
    pub fn table_key(&self) -> String {
        format!("{:020}:{}", self.loaded_at, self.fingerprint)
    }
}

/// Zero-padded key so lexicographic order equals numeric order.
pub fn run_key(run_id: RunId) -> String {
    format!("{run_id:020}")
}

pub fn index_key(cluster_id: &str, test_set_id: &str) -> String {
    format!("{cluster_id}/{test_set_id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_serialize_snake_case() {
        assert_eq!(
            serde_json::to_string(&RunStatus::WaitRunning).unwrap(),
            "\"wait_running\""
        );
        assert_eq!(
            serde_json::to_string(&TestStatus::Disabled).unwrap(),
            "\"disabled\""
        );
        assert_eq!(RunStatus::Restarted.to_string(), "restarted");
    }

    #[test]
    fn active_and_outstanding_sets() {
        assert!(RunStatus::WaitRunning.is_active());
        assert!(RunStatus::Restarted.is_active());
        assert!(!RunStatus::Stopped.is_active());
        assert!(!RunStatus::Finished.is_active());

        assert!(TestStatus::Running.is_outstanding());
        assert!(!TestStatus::Stopped.is_outstanding());
        assert!(!TestStatus::Disabled.is_outstanding());
    }

    #[test]
    fn keys_sort_numerically() {
        assert!(run_key(9) < run_key(10));
        let a = TestRecord {
            id: "a".to_string(),
            test_run_id: 7,
            position: 2,
            title: String::new(),
            status: TestStatus::WaitRunning,
            message: None,
            started_at: None,
            ended_at: None,
        };
        let mut b = a.clone();
        b.position = 10;
        assert!(a.table_key() < b.table_key());
        assert!(a.table_key().starts_with(&run_key(7)));
    }
}
