//! Linear, additive schema migrations.
//!
//! Every revision names exactly one predecessor (`None` for the first).
//! Upgrades only add tables or keys; each downgrade removes exactly what
//! its upgrade added. The applied revision lives in the `meta` table and is
//! bumped in the same write transaction as the step itself.

use std::collections::HashMap;

use redb::{Database, ReadableTable, WriteTransaction};
use tracing::info;

use crate::error::{StateError, StateResult};
use crate::tables::*;
use crate::types::TestRun;

type Step = fn(&WriteTransaction) -> StateResult<()>;

/// One schema revision.
pub struct Migration {
    pub revision: u32,
    pub down_revision: Option<u32>,
    pub description: &'static str,
    upgrade: Step,
    downgrade: Step,
}

pub const MIGRATIONS: &[Migration] = &[
    Migration {
        revision: 1,
        down_revision: None,
        description: "test_runs and tests",
        upgrade: r1_upgrade,
        downgrade: r1_downgrade,
    },
    Migration {
        revision: 2,
        down_revision: Some(1),
        description: "cluster_states",
        upgrade: r2_upgrade,
        downgrade: r2_downgrade,
    },
    Migration {
        revision: 3,
        down_revision: Some(2),
        description: "catalog_snapshots",
        upgrade: r3_upgrade,
        downgrade: r3_downgrade,
    },
    Migration {
        revision: 4,
        down_revision: Some(3),
        description: "run_index with backfill",
        upgrade: r4_upgrade,
        downgrade: r4_downgrade,
    },
];

/// Latest known revision.
pub fn head() -> u32 {
    MIGRATIONS.last().map(|m| m.revision).unwrap_or(0)
}

/// Check that `migrations` form a single chain starting from the empty schema.
pub fn validate_chain(migrations: &[Migration]) -> StateResult<()> {
    let mut previous: Option<u32> = None;
    for m in migrations {
        if m.down_revision != previous {
            return Err(StateError::Migration(format!(
                "revision {} expects predecessor {:?}, chain is at {:?}",
                m.revision, m.down_revision, previous
            )));
        }
        if previous.is_some_and(|p| m.revision <= p) {
            return Err(StateError::Migration(format!(
                "revision {} does not advance past {:?}",
                m.revision, previous
            )));
        }
        previous = Some(m.revision);
    }
    Ok(())
}

/// Move the schema to `target`, upgrading or downgrading one step per
/// transaction. Returns the revision reached.
pub(crate) fn migrate(db: &Database, target: u32) -> StateResult<u32> {
    validate_chain(MIGRATIONS)?;
    if target > head() {
        return Err(StateError::Migration(format!(
            "unknown revision {target}, head is {}",
            head()
        )));
    }

    let mut current = {
        let txn = db.begin_write().map_err(map_err!(Transaction))?;
        let revision = read_revision(&txn)?;
        txn.commit().map_err(map_err!(Transaction))?;
        revision
    };

    while current < target {
        let from = (current > 0).then_some(current);
        let step = MIGRATIONS
            .iter()
            .find(|m| m.down_revision == from)
            .ok_or_else(|| StateError::Migration(format!("no upgrade from revision {current}")))?;
        let txn = db.begin_write().map_err(map_err!(Transaction))?;
        (step.upgrade)(&txn)?;
        write_revision(&txn, step.revision)?;
        txn.commit().map_err(map_err!(Transaction))?;
        info!(revision = step.revision, description = step.description, "schema upgraded");
        current = step.revision;
    }

    while current > target {
        let step = MIGRATIONS
            .iter()
            .find(|m| m.revision == current)
            .ok_or_else(|| StateError::Migration(format!("unknown applied revision {current}")))?;
        let to = step.down_revision.unwrap_or(0);
        let txn = db.begin_write().map_err(map_err!(Transaction))?;
        (step.downgrade)(&txn)?;
        write_revision(&txn, to)?;
        txn.commit().map_err(map_err!(Transaction))?;
        info!(revision = to, description = step.description, "schema downgraded");
        current = to;
    }

    Ok(current)
}

fn read_revision(txn: &WriteTransaction) -> StateResult<u32> {
    let meta = txn.open_table(META).map_err(map_err!(Table))?;
    let revision = meta
        .get(SCHEMA_REVISION_KEY)
        .map_err(map_err!(Read))?
        .map(|guard| guard.value())
        .unwrap_or(0);
    Ok(revision as u32)
}

fn write_revision(txn: &WriteTransaction, revision: u32) -> StateResult<()> {
    let mut meta = txn.open_table(META).map_err(map_err!(Table))?;
    meta.insert(SCHEMA_REVISION_KEY, u64::from(revision))
        .map_err(map_err!(Write))?;
    Ok(())
}

// ── Steps ─────────────────────────────────────────────────────────

fn r1_upgrade(txn: &WriteTransaction) -> StateResult<()> {
    // Opening a table in a write transaction creates it if absent.
    txn.open_table(TEST_RUNS).map_err(map_err!(Table))?;
    txn.open_table(TESTS).map_err(map_err!(Table))?;
    Ok(())
}

fn r1_downgrade(txn: &WriteTransaction) -> StateResult<()> {
    txn.delete_table(TESTS).map_err(map_err!(Table))?;
    txn.delete_table(TEST_RUNS).map_err(map_err!(Table))?;
    let mut meta = txn.open_table(META).map_err(map_err!(Table))?;
    meta.remove(NEXT_RUN_ID_KEY).map_err(map_err!(Write))?;
    Ok(())
}

fn r2_upgrade(txn: &WriteTransaction) -> StateResult<()> {
    txn.open_table(CLUSTER_STATES).map_err(map_err!(Table))?;
    Ok(())
}

fn r2_downgrade(txn: &WriteTransaction) -> StateResult<()> {
    txn.delete_table(CLUSTER_STATES).map_err(map_err!(Table))?;
    Ok(())
}

fn r3_upgrade(txn: &WriteTransaction) -> StateResult<()> {
    txn.open_table(CATALOG_SNAPSHOTS).map_err(map_err!(Table))?;
    Ok(())
}

fn r3_downgrade(txn: &WriteTransaction) -> StateResult<()> {
    txn.delete_table(CATALOG_SNAPSHOTS).map_err(map_err!(Table))?;
    Ok(())
}

fn r4_upgrade(txn: &WriteTransaction) -> StateResult<()> {
    let mut latest: HashMap<String, u64> = HashMap::new();
    {
        let runs = txn.open_table(TEST_RUNS).map_err(map_err!(Table))?;
        for entry in runs.iter().map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            let run: TestRun =
                serde_json::from_slice(value.value()).map_err(map_err!(Codec))?;
            let slot = latest.entry(run.index_key()).or_insert(run.id);
            *slot = (*slot).max(run.id);
        }
    }
    let mut index = txn.open_table(RUN_INDEX).map_err(map_err!(Table))?;
    for (key, run_id) in &latest {
        index
            .insert(key.as_str(), *run_id)
            .map_err(map_err!(Write))?;
    }
    Ok(())
}

fn r4_downgrade(txn: &WriteTransaction) -> StateResult<()> {
    txn.delete_table(RUN_INDEX).map_err(map_err!(Table))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(_: &WriteTransaction) -> StateResult<()> {
        Ok(())
    }

    fn step(revision: u32, down_revision: Option<u32>) -> Migration {
        Migration {
            revision,
            down_revision,
            description: "test",
            upgrade: noop,
            downgrade: noop,
        }
    }

    #[test]
    fn shipped_chain_is_linear() {
        validate_chain(MIGRATIONS).unwrap();
        assert_eq!(head(), 4);
    }

    #[test]
    fn branching_chain_is_rejected() {
        let chain = vec![step(1, None), step(2, Some(1)), step(3, Some(1))];
        assert!(matches!(validate_chain(&chain), Err(StateError::Migration(_))));
    }

    #[test]
    fn second_root_is_rejected() {
        let chain = vec![step(1, None), step(2, None)];
        assert!(validate_chain(&chain).is_err());
    }

    #[test]
    fn non_advancing_revision_is_rejected() {
        let chain = vec![step(5, None), step(5, Some(5))];
        assert!(validate_chain(&chain).is_err());
    }
}
