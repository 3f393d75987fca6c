//! StateStore: redb-backed persistence for checkgrid.
//!
//! Provides typed operations over test runs, tests, cluster snapshots and
//! catalog history. Every write commits before returning, so a caller that
//! got `Ok` can treat the change as durable. The store supports both
//! on-disk and in-memory backends (the latter for testing).

use std::path::Path;
use std::sync::Arc;

use checkgrid_core::ClusterState;
use redb::{Database, ReadableDatabase, ReadableTable, WriteTransaction};
use tracing::debug;

use crate::error::StateResult;
use crate::migrations;
use crate::tables::*;
use crate::types::*;

/// Thread-safe store backed by redb.
#[derive(Clone)]
pub struct StateStore {
    db: Arc<Database>,
}

impl StateStore {
    /// Open (or create) a persistent store at the given path, upgrading
    /// its schema to head.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.migrate_to(migrations::head())?;
        debug!(?path, "state store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory store (for testing).
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.migrate_to(migrations::head())?;
        debug!("in-memory state store opened");
        Ok(store)
    }

    /// Upgrade or downgrade the schema to `revision`.
    pub fn migrate_to(&self, revision: u32) -> StateResult<u32> {
        migrations::migrate(&self.db, revision)
    }

    /// Currently applied schema revision.
    pub fn schema_revision(&self) -> StateResult<u32> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(META).map_err(map_err!(Table))?;
        let revision = table
            .get(SCHEMA_REVISION_KEY)
            .map_err(map_err!(Read))?
            .map(|guard| guard.value())
            .unwrap_or(0);
        Ok(revision as u32)
    }

    // ── Test runs ──────────────────────────────────────────────────

    /// Insert a new run and its tests in one transaction.
    ///
    /// Allocates the run id, stamps it on `run` and every test, and points
    /// the run index for (cluster, test set) at the new run.
    pub fn create_run(&self, run: &mut TestRun, tests: &mut [TestRecord]) -> StateResult<RunId> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let run_id = {
            let mut meta = txn.open_table(META).map_err(map_err!(Table))?;
            let next = meta
                .get(NEXT_RUN_ID_KEY)
                .map_err(map_err!(Read))?
                .map(|guard| guard.value())
                .unwrap_or(1);
            meta.insert(NEXT_RUN_ID_KEY, next + 1)
                .map_err(map_err!(Write))?;
            next
        };

        run.id = run_id;
        for test in tests.iter_mut() {
            test.test_run_id = run_id;
        }

        write_run(&txn, run)?;
        for test in tests.iter() {
            write_test(&txn, test)?;
        }
        {
            let mut index = txn.open_table(RUN_INDEX).map_err(map_err!(Table))?;
            index
                .insert(run.index_key().as_str(), run_id)
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%run_id, tests = tests.len(), "test run created");
        Ok(run_id)
    }

    /// Update an existing run.
    pub fn put_run(&self, run: &TestRun) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        write_run(&txn, run)?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    /// Update a run and any number of its tests atomically.
    pub fn put_run_with_tests(&self, run: &TestRun, tests: &[TestRecord]) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        write_run(&txn, run)?;
        for test in tests {
            write_test(&txn, test)?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(run_id = %run.id, status = %run.status, tests = tests.len(), "test run stored");
        Ok(())
    }

    /// Get a run by id.
    pub fn get_run(&self, run_id: RunId) -> StateResult<Option<TestRun>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(TEST_RUNS).map_err(map_err!(Table))?;
        match table.get(run_key(run_id).as_str()).map_err(map_err!(Read))? {
            Some(guard) => {
                let run: TestRun =
                    serde_json::from_slice(guard.value()).map_err(map_err!(Codec))?;
                Ok(Some(run))
            }
            None => Ok(None),
        }
    }

    /// List all runs in id order.
    pub fn list_runs(&self) -> StateResult<Vec<TestRun>> {
        self.scan_runs(|_| true)
    }

    /// List all runs against one cluster in id order.
    pub fn list_runs_for_cluster(&self, cluster_id: &str) -> StateResult<Vec<TestRun>> {
        self.scan_runs(|run| run.cluster_id == cluster_id)
    }

    /// Runs holding a claim on their (cluster, test set) pair.
    pub fn list_active_runs(&self) -> StateResult<Vec<TestRun>> {
        self.scan_runs(|run| run.status.is_active())
    }

    /// Latest run for (cluster, test set), via the run index.
    pub fn latest_run(&self, cluster_id: &str, test_set_id: &str) -> StateResult<Option<TestRun>> {
        let run_id = {
            let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
            let table = txn.open_table(RUN_INDEX).map_err(map_err!(Table))?;
            let found = table
                .get(index_key(cluster_id, test_set_id).as_str())
                .map_err(map_err!(Read))?
                .map(|guard| guard.value());
            found
        };
        match run_id {
            Some(id) => self.get_run(id),
            None => Ok(None),
        }
    }

    /// Latest run of every test set ever run against `cluster_id`.
    ///
    /// Cluster ids may contain `/` while test set ids never do, so the
    /// cluster part of an index key is everything before the last `/`.
    pub fn latest_runs_for_cluster(&self, cluster_id: &str) -> StateResult<Vec<TestRun>> {
        let prefix = format!("{cluster_id}/");
        let ids: Vec<u64> = {
            let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
            let table = txn.open_table(RUN_INDEX).map_err(map_err!(Table))?;
            let mut ids = Vec::new();
            for entry in table.range(prefix.as_str()..).map_err(map_err!(Read))? {
                let (key, value) = entry.map_err(map_err!(Read))?;
                let key = key.value();
                if !key.starts_with(&prefix) {
                    break;
                }
                if key.rsplit_once('/').map(|(cluster, _)| cluster) == Some(cluster_id) {
                    ids.push(value.value());
                }
            }
            ids
        };
        let mut runs = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(run) = self.get_run(id)? {
                runs.push(run);
            }
        }
        Ok(runs)
    }

    fn scan_runs(&self, keep: impl Fn(&TestRun) -> bool) -> StateResult<Vec<TestRun>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(TEST_RUNS).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            let run: TestRun =
                serde_json::from_slice(value.value()).map_err(map_err!(Codec))?;
            if keep(&run) {
                results.push(run);
            }
        }
        Ok(results)
    }

    // ── Tests ──────────────────────────────────────────────────────

    /// Insert or update a single test record.
    pub fn put_test(&self, test: &TestRecord) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        write_test(&txn, test)?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    /// Tests of a run in declaration order.
    pub fn list_tests_for_run(&self, run_id: RunId) -> StateResult<Vec<TestRecord>> {
        let prefix = format!("{}:", run_key(run_id));
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(TESTS).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.range(prefix.as_str()..).map_err(map_err!(Read))? {
            let (key, value) = entry.map_err(map_err!(Read))?;
            if !key.value().starts_with(&prefix) {
                break;
            }
            let test: TestRecord =
                serde_json::from_slice(value.value()).map_err(map_err!(Codec))?;
            results.push(test);
        }
        Ok(results)
    }

    /// Find a test of a run by its profile id.
    pub fn get_test(&self, run_id: RunId, test_id: &str) -> StateResult<Option<TestRecord>> {
        Ok(self
            .list_tests_for_run(run_id)?
            .into_iter()
            .find(|t| t.id == test_id))
    }

    // ── Cluster snapshots ──────────────────────────────────────────

    /// Replace the stored snapshot for a cluster.
    pub fn put_cluster_state(&self, state: &ClusterState) -> StateResult<()> {
        let value = serde_json::to_vec(state).map_err(map_err!(Codec))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(CLUSTER_STATES).map_err(map_err!(Table))?;
            table
                .insert(state.cluster_id.as_str(), value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(cluster_id = %state.cluster_id, "cluster snapshot stored");
        Ok(())
    }

    pub fn get_cluster_state(&self, cluster_id: &str) -> StateResult<Option<ClusterState>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(CLUSTER_STATES).map_err(map_err!(Table))?;
        match table.get(cluster_id).map_err(map_err!(Read))? {
            Some(guard) => {
                let state: ClusterState =
                    serde_json::from_slice(guard.value()).map_err(map_err!(Codec))?;
                Ok(Some(state))
            }
            None => Ok(None),
        }
    }

    pub fn list_cluster_states(&self) -> StateResult<Vec<ClusterState>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(CLUSTER_STATES).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            let state: ClusterState =
                serde_json::from_slice(value.value()).map_err(map_err!(Codec))?;
            results.push(state);
        }
        Ok(results)
    }

    // ── Catalog history ────────────────────────────────────────────

    pub fn put_catalog_snapshot(&self, record: &CatalogSnapshotRecord) -> StateResult<()> {
        let key = record.table_key();
        let value = serde_json::to_vec(record).map_err(map_err!(Codec))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(CATALOG_SNAPSHOTS).map_err(map_err!(Table))?;
            table
                .insert(key.as_str(), value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%key, "catalog snapshot recorded");
        Ok(())
    }

    /// Catalog loads, oldest first.
    pub fn list_catalog_snapshots(&self) -> StateResult<Vec<CatalogSnapshotRecord>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(CATALOG_SNAPSHOTS).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            let record: CatalogSnapshotRecord =
                serde_json::from_slice(value.value()).map_err(map_err!(Codec))?;
            results.push(record);
        }
        Ok(results)
    }

    pub fn latest_catalog_snapshot(&self) -> StateResult<Option<CatalogSnapshotRecord>> {
        Ok(self.list_catalog_snapshots()?.pop())
    }
}

fn write_run(txn: &WriteTransaction, run: &TestRun) -> StateResult<()> {
    let key = run.table_key();
    let value = serde_json::to_vec(run).map_err(map_err!(Codec))?;
    let mut table = txn.open_table(TEST_RUNS).map_err(map_err!(Table))?;
    table
        .insert(key.as_str(), value.as_slice())
        .map_err(map_err!(Write))?;
    Ok(())
}

fn write_test(txn: &WriteTransaction, test: &TestRecord) -> StateResult<()> {
    let key = test.table_key();
    let value = serde_json::to_vec(test).map_err(map_err!(Codec))?;
    let mut table = txn.open_table(TESTS).map_err(map_err!(Table))?;
    table
        .insert(key.as_str(), value.as_slice())
        .map_err(map_err!(Write))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StateError;

    fn test_run(cluster_id: &str, test_set_id: &str) -> TestRun {
        TestRun {
            id: 0,
            cluster_id: cluster_id.to_string(),
            test_set_id: test_set_id.to_string(),
            status: RunStatus::WaitRunning,
            pid: None,
            started_at: 1000,
            ended_at: None,
            release_version: "8.0".to_string(),
            test_path: format!("checks/{test_set_id}"),
            cleanup_path: None,
            updated_at: 1000,
        }
    }

    fn test_records(ids: &[&str]) -> Vec<TestRecord> {
        ids.iter()
            .enumerate()
            .map(|(i, id)| TestRecord {
                id: id.to_string(),
                test_run_id: 0,
                position: i as u32,
                title: String::new(),
                status: TestStatus::WaitRunning,
                message: None,
                started_at: None,
                ended_at: None,
            })
            .collect()
    }

    fn cluster(id: &str) -> ClusterState {
        ClusterState {
            cluster_id: id.to_string(),
            release_version: "8.0".to_string(),
            deployment_mode: "ha_compact".to_string(),
            operating_system: "ubuntu".to_string(),
            enabled_components: Default::default(),
            fetched_at: 1000,
        }
    }

    // ── Runs ───────────────────────────────────────────────────────

    #[test]
    fn create_run_allocates_sequential_ids() {
        let store = StateStore::open_in_memory().unwrap();

        let mut first = test_run("env-1", "smoke");
        let mut tests = test_records(&["smoke.a", "smoke.b"]);
        let id1 = store.create_run(&mut first, &mut tests).unwrap();

        let mut second = test_run("env-1", "smoke");
        let id2 = store.create_run(&mut second, &mut []).unwrap();

        assert_eq!(id1, 1);
        assert_eq!(id2, 2);
        assert_eq!(first.id, 1);
        assert!(tests.iter().all(|t| t.test_run_id == 1));
    }

    #[test]
    fn run_put_and_get() {
        let store = StateStore::open_in_memory().unwrap();
        let mut run = test_run("env-1", "smoke");
        store.create_run(&mut run, &mut []).unwrap();

        run.status = RunStatus::Running;
        run.pid = Some(4242);
        store.put_run(&run).unwrap();

        assert_eq!(store.get_run(run.id).unwrap(), Some(run));
        assert!(store.get_run(99).unwrap().is_none());
    }

    #[test]
    fn tests_come_back_in_declaration_order() {
        let store = StateStore::open_in_memory().unwrap();
        let mut run = test_run("env-1", "smoke");
        let ids: Vec<String> = (0..12).map(|i| format!("smoke.t{i}")).collect();
        let refs: Vec<&str> = ids.iter().map(String::as_str).collect();
        let mut tests = test_records(&refs);
        store.create_run(&mut run, &mut tests).unwrap();

        // A neighbouring run must not leak into the scan.
        let mut other = test_run("env-1", "sanity");
        store
            .create_run(&mut other, &mut test_records(&["sanity.x"]))
            .unwrap();

        let stored = store.list_tests_for_run(run.id).unwrap();
        let stored_ids: Vec<&str> = stored.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(stored_ids, refs);
    }

    #[test]
    fn run_and_tests_update_together() {
        let store = StateStore::open_in_memory().unwrap();
        let mut run = test_run("env-1", "smoke");
        let mut tests = test_records(&["smoke.a", "smoke.b"]);
        store.create_run(&mut run, &mut tests).unwrap();

        run.status = RunStatus::Stopped;
        tests[1].status = TestStatus::Stopped;
        store.put_run_with_tests(&run, &tests[1..]).unwrap();

        let stored = store.list_tests_for_run(run.id).unwrap();
        assert_eq!(stored[0].status, TestStatus::WaitRunning);
        assert_eq!(stored[1].status, TestStatus::Stopped);
        assert_eq!(store.get_run(run.id).unwrap().unwrap().status, RunStatus::Stopped);
    }

    #[test]
    fn get_test_by_profile_id() {
        let store = StateStore::open_in_memory().unwrap();
        let mut run = test_run("env-1", "smoke");
        let mut tests = test_records(&["smoke.a", "smoke.b"]);
        store.create_run(&mut run, &mut tests).unwrap();

        let found = store.get_test(run.id, "smoke.b").unwrap().unwrap();
        assert_eq!(found.position, 1);
        assert!(store.get_test(run.id, "smoke.zzz").unwrap().is_none());
    }

    #[test]
    fn active_and_cluster_filters() {
        let store = StateStore::open_in_memory().unwrap();
        let mut a = test_run("env-1", "smoke");
        let mut b = test_run("env-2", "smoke");
        store.create_run(&mut a, &mut []).unwrap();
        store.create_run(&mut b, &mut []).unwrap();

        b.status = RunStatus::Finished;
        store.put_run(&b).unwrap();

        let active = store.list_active_runs().unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].cluster_id, "env-1");
        assert_eq!(store.list_runs_for_cluster("env-2").unwrap().len(), 1);
        assert_eq!(store.list_runs().unwrap().len(), 2);
    }

    #[test]
    fn run_index_tracks_latest_run_per_pair() {
        let store = StateStore::open_in_memory().unwrap();
        let mut first = test_run("env-1", "smoke");
        let mut second = test_run("env-1", "smoke");
        let mut other = test_run("env-1", "sanity");
        let mut elsewhere = test_run("env-10", "smoke");
        store.create_run(&mut first, &mut []).unwrap();
        store.create_run(&mut second, &mut []).unwrap();
        store.create_run(&mut other, &mut []).unwrap();
        store.create_run(&mut elsewhere, &mut []).unwrap();

        let latest = store.latest_run("env-1", "smoke").unwrap().unwrap();
        assert_eq!(latest.id, second.id);

        let per_set = store.latest_runs_for_cluster("env-1").unwrap();
        let ids: Vec<u64> = per_set.iter().map(|r| r.id).collect();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&second.id));
        assert!(ids.contains(&other.id));
    }

    #[test]
    fn latest_runs_ignore_clusters_nested_under_the_id() {
        let store = StateStore::open_in_memory().unwrap();
        let mut parent = test_run("a", "smoke");
        let mut nested = test_run("a/b", "smoke");
        let mut nested_other = test_run("a/b", "sanity");
        store.create_run(&mut parent, &mut []).unwrap();
        store.create_run(&mut nested, &mut []).unwrap();
        store.create_run(&mut nested_other, &mut []).unwrap();

        let ids: Vec<u64> = store
            .latest_runs_for_cluster("a")
            .unwrap()
            .iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec![parent.id]);

        let nested_ids: Vec<u64> = store
            .latest_runs_for_cluster("a/b")
            .unwrap()
            .iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(nested_ids.len(), 2);
        assert!(nested_ids.contains(&nested.id));
        assert!(nested_ids.contains(&nested_other.id));
        assert_eq!(store.latest_run("a", "smoke").unwrap().unwrap().id, parent.id);
    }

    // ── Cluster snapshots ──────────────────────────────────────────

    #[test]
    fn cluster_state_replaced_wholesale() {
        let store = StateStore::open_in_memory().unwrap();
        let mut state = cluster("env-1");
        store.put_cluster_state(&state).unwrap();

        state.release_version = "9.0".to_string();
        state.enabled_components.insert("murano".to_string());
        store.put_cluster_state(&state).unwrap();

        assert_eq!(store.get_cluster_state("env-1").unwrap(), Some(state));
        assert_eq!(store.list_cluster_states().unwrap().len(), 1);
        assert!(store.get_cluster_state("env-2").unwrap().is_none());
    }

    // ── Catalog history ────────────────────────────────────────────

    #[test]
    fn catalog_snapshots_ordered_by_load_time() {
        let store = StateStore::open_in_memory().unwrap();
        for (loaded_at, fp) in [(2000u64, "bbb"), (1000, "aaa")] {
            store
                .put_catalog_snapshot(&CatalogSnapshotRecord {
                    fingerprint: fp.to_string(),
                    loaded_at,
                    source: "memory".to_string(),
                    test_set_ids: vec!["smoke".to_string()],
                })
                .unwrap();
        }
        let latest = store.latest_catalog_snapshot().unwrap().unwrap();
        assert_eq!(latest.fingerprint, "bbb");
        assert_eq!(store.list_catalog_snapshots().unwrap().len(), 2);
    }

    // ── Schema ─────────────────────────────────────────────────────

    #[test]
    fn fresh_store_is_at_head() {
        let store = StateStore::open_in_memory().unwrap();
        assert_eq!(store.schema_revision().unwrap(), migrations::head());
    }

    #[test]
    fn downgrade_removes_exactly_the_added_table() {
        let store = StateStore::open_in_memory().unwrap();
        let mut run = test_run("env-1", "smoke");
        store.create_run(&mut run, &mut []).unwrap();

        assert_eq!(store.migrate_to(3).unwrap(), 3);
        // run_index is gone, runs are untouched.
        assert!(matches!(
            store.latest_run("env-1", "smoke"),
            Err(StateError::Table(_))
        ));
        assert_eq!(store.get_run(run.id).unwrap().unwrap().test_set_id, "smoke");

        // Upgrading again backfills the index from existing runs.
        assert_eq!(store.migrate_to(4).unwrap(), 4);
        assert_eq!(store.latest_run("env-1", "smoke").unwrap().unwrap().id, run.id);
    }

    #[test]
    fn full_downgrade_and_reupgrade() {
        let store = StateStore::open_in_memory().unwrap();
        assert_eq!(store.migrate_to(0).unwrap(), 0);
        assert_eq!(store.schema_revision().unwrap(), 0);
        assert!(store.list_runs().is_err());

        assert_eq!(store.migrate_to(migrations::head()).unwrap(), 4);
        assert!(store.list_runs().unwrap().is_empty());
    }

    #[test]
    fn migrating_past_head_fails() {
        let store = StateStore::open_in_memory().unwrap();
        assert!(matches!(store.migrate_to(99), Err(StateError::Migration(_))));
    }

    // ── Persistence (on-disk) ──────────────────────────────────────

    #[test]
    fn persistence_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("test.redb");

        let run_id = {
            let store = StateStore::open(&db_path).unwrap();
            let mut run = test_run("prod", "smoke");
            store
                .create_run(&mut run, &mut test_records(&["smoke.a"]))
                .unwrap()
        };

        // Reopen the same database file.
        let store = StateStore::open(&db_path).unwrap();
        let run = store.get_run(run_id).unwrap().unwrap();
        assert_eq!(run.cluster_id, "prod");
        assert_eq!(store.list_tests_for_run(run_id).unwrap().len(), 1);

        // The id counter survives too.
        let mut next = test_run("prod", "smoke");
        assert_eq!(store.create_run(&mut next, &mut []).unwrap(), run_id + 1);
    }

    #[test]
    fn empty_store_operations() {
        let store = StateStore::open_in_memory().unwrap();

        assert!(store.list_runs().unwrap().is_empty());
        assert!(store.list_active_runs().unwrap().is_empty());
        assert!(store.list_tests_for_run(1).unwrap().is_empty());
        assert!(store.latest_run("any", "thing").unwrap().is_none());
        assert!(store.latest_runs_for_cluster("any").unwrap().is_empty());
        assert!(store.latest_catalog_snapshot().unwrap().is_none());
    }
}
