//! Resolver: decides which test sets and tests apply to a cluster.
//!
//! A set is eligible when its tag expressions match the cluster's derived
//! tag set and the cluster release is at least `available_since_release`.
//! Tests of an eligible set pass through the same two gates independently.
//! Mutual exclusion is not considered here; it depends on which runs are
//! active and is enforced when a run is created.

use std::collections::BTreeSet;

use checkgrid_core::{ClusterState, TestProfile, TestSetId, TestSetProfile};
use tracing::debug;

use crate::catalog::{Catalog, CatalogSnapshot};
use crate::error::{CatalogError, CatalogResult};

/// Outcome of resolving one test set against one cluster, taken from a
/// single catalog snapshot.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub test_set: TestSetProfile,
    /// Eligible tests in declaration order. Empty means the set does not
    /// apply to the cluster.
    pub tests: Vec<TestProfile>,
    /// Symmetric exclusion set of `test_set`.
    pub exclusive_with: BTreeSet<TestSetId>,
}

impl Resolution {
    pub fn is_empty(&self) -> bool {
        self.tests.is_empty()
    }
}

#[derive(Clone)]
pub struct Resolver {
    catalog: Catalog,
}

impl Resolver {
    pub fn new(catalog: Catalog) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Full resolution of `test_set_id`, including its exclusion set.
    pub fn resolve(&self, cluster: &ClusterState, test_set_id: &str) -> CatalogResult<Resolution> {
        let snapshot = self.catalog.snapshot();
        let test_set = snapshot
            .get(test_set_id)
            .ok_or_else(|| CatalogError::NotFound(test_set_id.to_string()))?;
        Ok(Resolution {
            tests: eligible_tests(test_set, cluster),
            exclusive_with: snapshot.exclusions_of(test_set_id),
            test_set: test_set.clone(),
        })
    }

    /// Eligible tests of `test_set_id` for `cluster`, in declaration order.
    /// An empty result means the whole set is ineligible.
    pub fn resolve_eligible(
        &self,
        cluster: &ClusterState,
        test_set_id: &str,
    ) -> CatalogResult<Vec<TestProfile>> {
        Ok(self.resolve(cluster, test_set_id)?.tests)
    }

    /// Every test set with a non-empty resolution, ascending priority then id.
    pub fn eligible_test_sets(&self, cluster: &ClusterState) -> Vec<Resolution> {
        let snapshot = self.catalog.snapshot();
        eligible_in(&snapshot, cluster)
    }
}

fn eligible_in(snapshot: &CatalogSnapshot, cluster: &ClusterState) -> Vec<Resolution> {
    snapshot
        .ordered()
        .filter_map(|test_set| {
            let tests = eligible_tests(test_set, cluster);
            (!tests.is_empty()).then(|| Resolution {
                exclusive_with: snapshot.exclusions_of(&test_set.id),
                test_set: test_set.clone(),
                tests,
            })
        })
        .collect()
}

fn eligible_tests(test_set: &TestSetProfile, cluster: &ClusterState) -> Vec<TestProfile> {
    let tags = cluster.tags();
    if !test_set.admits(cluster, &tags) {
        debug!(
            test_set = %test_set.id,
            cluster_id = %cluster.cluster_id,
            "test set not applicable"
        );
        return Vec::new();
    }
    test_set
        .tests
        .iter()
        .filter(|test| test.admits(cluster, &tags))
        .cloned()
        .collect()
}
