//! Shared types used across checkgrid crates.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::tags::{all_satisfied, DeploymentTags, TagExpr};
use crate::version::release_at_least;

/// Identifier of a target cluster.
pub type ClusterId = String;

/// Identifier of a registered test set.
pub type TestSetId = String;

// ── Cluster state ──────────────────────────────────────────────────

/// Point-in-time snapshot of a cluster's deployment metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterState {
    pub cluster_id: ClusterId,
    pub release_version: String,
    pub deployment_mode: String,
    pub operating_system: String,
    #[serde(default)]
    pub enabled_components: BTreeSet<String>,
    /// Unix timestamp (seconds) when the snapshot was fetched.
    #[serde(default)]
    pub fetched_at: u64,
}

impl ClusterState {
    /// Derived tag set: mode, OS and every enabled component.
    pub fn tags(&self) -> DeploymentTags {
        DeploymentTags::new(
            [self.deployment_mode.as_str(), self.operating_system.as_str()]
                .into_iter()
                .chain(self.enabled_components.iter().map(String::as_str)),
        )
    }
}

// ── Profiles ───────────────────────────────────────────────────────

/// Catalog entry for a group of checks sharing one runner invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestSetProfile {
    pub id: TestSetId,
    /// Opaque locator handed to the check runner.
    pub test_path: String,
    #[serde(default)]
    pub deployment_tags: Vec<TagExpr>,
    /// As declared; the catalog resolves the symmetric closure.
    #[serde(default)]
    pub exclusive_with: BTreeSet<TestSetId>,
    pub available_since_release: Option<String>,
    /// Lower runs first when several sets are scheduled together.
    #[serde(default)]
    pub ordering_priority: i64,
    #[serde(default)]
    pub description: String,
    /// Locator of a cleanup invocation run after a stop or crash.
    pub cleanup_path: Option<String>,
    #[serde(default)]
    pub tests: Vec<TestProfile>,
}

/// Metadata for a single check within a test set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestProfile {
    /// Fully-qualified locator, unique within its test set.
    pub id: String,
    #[serde(default)]
    pub deployment_tags: Vec<TagExpr>,
    pub available_since_release: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Documentation only (e.g. "30s").
    pub expected_duration: Option<String>,
}

impl TestSetProfile {
    /// Whether the set-level tag and release gates admit `cluster`.
    pub fn admits(&self, cluster: &ClusterState, tags: &DeploymentTags) -> bool {
        all_satisfied(&self.deployment_tags, tags)
            && release_at_least(
                &cluster.release_version,
                self.available_since_release.as_deref(),
            )
    }
}

impl TestProfile {
    pub fn admits(&self, cluster: &ClusterState, tags: &DeploymentTags) -> bool {
        all_satisfied(&self.deployment_tags, tags)
            && release_at_least(
                &cluster.release_version,
                self.available_since_release.as_deref(),
            )
    }
}
