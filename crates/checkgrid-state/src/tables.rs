//! redb table definitions for the checkgrid store.
//!
//! Record tables use `&str` keys and `&[u8]` values (JSON-serialized domain
//! types). Which tables exist depends on the applied schema revision.

use redb::TableDefinition;

/// Schema bookkeeping (`schema_revision`, `next_run_id`). Always present.
pub const META: TableDefinition<&str, u64> = TableDefinition::new("meta");

/// Test runs keyed by `{run_id:020}`. Added in revision 1.
pub const TEST_RUNS: TableDefinition<&str, &[u8]> = TableDefinition::new("test_runs");

/// Tests keyed by `{run_id:020}:{position:05}`. Added in revision 1.
pub const TESTS: TableDefinition<&str, &[u8]> = TableDefinition::new("tests");

/// Last good cluster snapshot keyed by `{cluster_id}`. Added in revision 2.
pub const CLUSTER_STATES: TableDefinition<&str, &[u8]> = TableDefinition::new("cluster_states");

/// Catalog loads keyed by `{loaded_at:020}:{fingerprint}`. Added in revision 3.
pub const CATALOG_SNAPSHOTS: TableDefinition<&str, &[u8]> =
    TableDefinition::new("catalog_snapshots");

/// Latest run id keyed by `{cluster_id}/{test_set_id}`. Added in revision 4.
pub const RUN_INDEX: TableDefinition<&str, u64> = TableDefinition::new("run_index");

pub const SCHEMA_REVISION_KEY: &str = "schema_revision";
pub const NEXT_RUN_ID_KEY: &str = "next_run_id";
