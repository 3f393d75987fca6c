use std::path::PathBuf;

use checkgrid_catalog::{Catalog, ProfileSource};
use checkgrid_core::CheckgridConfig;

pub fn catalog_check(dir: PathBuf) -> anyhow::Result<()> {
    let catalog = Catalog::from_source(ProfileSource::Directory(dir.clone()))?;
    let snapshot = catalog.snapshot();
    println!("✓ {} test sets in {}", snapshot.len(), dir.display());
    for test_set in snapshot.ordered() {
        println!(
            "  {} [priority {}] {} tests",
            test_set.id,
            test_set.ordering_priority,
            test_set.tests.len()
        );
    }
    println!("fingerprint {}", snapshot.fingerprint());
    Ok(())
}

pub fn catalog_history(config: &CheckgridConfig) -> anyhow::Result<()> {
    let state = checkd::daemon::open_store(&config.store)?;
    for record in state.list_catalog_snapshots()? {
        println!(
            "{}  {}  {} test sets  {}",
            record.loaded_at,
            &record.fingerprint[..record.fingerprint.len().min(12)],
            record.test_set_ids.len(),
            record.source
        );
    }
    Ok(())
}

pub fn migrate(config: &CheckgridConfig, to: Option<u32>) -> anyhow::Result<()> {
    let state = checkd::daemon::open_store(&config.store)?;
    let target = to.unwrap_or_else(checkgrid_state::migrations::head);
    let revision = state.migrate_to(target)?;
    println!("schema at revision {revision}");
    Ok(())
}
