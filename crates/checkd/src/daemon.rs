//! Daemon assembly: store, catalog, cluster cache, executor, notifier and
//! the run state machine, wired in dependency order.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use checkgrid_catalog::{Catalog, CatalogSnapshot, ProfileSource, Resolution, Resolver};
use checkgrid_cluster::{ClusterStateCache, HttpMetadataSource, MetadataSource};
use checkgrid_core::config::StoreConfig;
use checkgrid_core::{CheckgridConfig, ClusterState};
use checkgrid_executor::ProcessSupervisor;
use checkgrid_notify::{EventSink, HttpSink, LogSink, Notifier};
use checkgrid_runs::RunStateMachine;
use checkgrid_state::{CatalogSnapshotRecord, RunId, StateStore, TestRun};
use tokio::task::JoinHandle;
use tracing::{info, warn};

const DELIVERY_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

pub struct Daemon {
    config: CheckgridConfig,
    state: StateStore,
    catalog: Catalog,
    clusters: ClusterStateCache,
    supervisor: Arc<ProcessSupervisor>,
    machine: RunStateMachine,
    delivery: JoinHandle<()>,
}

impl Daemon {
    /// Start with the HTTP metadata client from `config.cluster`.
    pub async fn start(config: CheckgridConfig) -> anyhow::Result<Self> {
        let source =
            HttpMetadataSource::new(&config.cluster.metadata_url, config.cluster.timeout())?;
        Self::start_with_source(config, Arc::new(source)).await
    }

    pub async fn start_with_source(
        config: CheckgridConfig,
        source: Arc<dyn MetadataSource>,
    ) -> anyhow::Result<Self> {
        info!("checkgrid daemon starting");

        let state = open_store(&config.store)?;
        let catalog = load_catalog(&config.catalog.dir, &state)?;
        let clusters = ClusterStateCache::new(source, state.clone());
        let supervisor = Arc::new(ProcessSupervisor::new(&config.executor));
        info!(
            program = %config.executor.program,
            capacity = config.executor.capacity,
            "executor initialized"
        );

        let sink: Arc<dyn EventSink> = match &config.notifier.endpoint {
            Some(endpoint) => {
                info!(%endpoint, "publishing run events over http");
                Arc::new(HttpSink::new(endpoint, config.notifier.timeout())?)
            }
            None => {
                info!("no notifier endpoint configured, run events are logged only");
                Arc::new(LogSink)
            }
        };
        let (notifier, delivery) = Notifier::spawn(sink, config.notifier.queue_capacity);

        let machine = RunStateMachine::new(
            state.clone(),
            Resolver::new(catalog.clone()),
            clusters.clone(),
            supervisor.clone(),
            notifier,
            config.executor.capacity,
        );
        let recovered = machine.recover_orphans().await?;
        if !recovered.is_empty() {
            warn!(count = recovered.len(), runs = ?recovered, "runs interrupted by a previous daemon marked error");
        }

        info!("checkgrid daemon ready");
        Ok(Self {
            config,
            state,
            catalog,
            clusters,
            supervisor,
            machine,
            delivery,
        })
    }

    pub fn config(&self) -> &CheckgridConfig {
        &self.config
    }

    pub fn state(&self) -> &StateStore {
        &self.state
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn machine(&self) -> &RunStateMachine {
        &self.machine
    }

    /// Reload profiles from the configured directory. On failure the live
    /// catalog is left untouched.
    pub fn reload_catalog(&self) -> anyhow::Result<Arc<CatalogSnapshot>> {
        let snapshot = self
            .catalog
            .load_profiles(ProfileSource::Directory(self.config.catalog.dir.clone()))?;
        record_snapshot(&self.state, &snapshot)?;
        Ok(snapshot)
    }

    /// Current cluster snapshot and every test set that applies to it.
    pub async fn eligible(&self, cluster_id: &str) -> anyhow::Result<(Arc<ClusterState>, Vec<Resolution>)> {
        let cluster = self.clusters.refresh_or_last_good(cluster_id).await?;
        let sets = Resolver::new(self.catalog.clone()).eligible_test_sets(&cluster);
        Ok((cluster, sets))
    }

    /// Poll until the run has settled and its runner has been reaped.
    pub async fn wait_settled(&self, run_id: RunId, poll: Duration) -> anyhow::Result<TestRun> {
        loop {
            let run = self.machine.get_run(run_id)?;
            if is_settled(&run) {
                return Ok(run);
            }
            tokio::time::sleep(poll).await;
        }
    }

    /// Terminate live runners, then stop the machine and drain the notifier.
    pub async fn shutdown(self) {
        info!("checkgrid daemon shutting down");
        self.supervisor.shutdown().await;
        self.machine.shutdown().await;

        let Self {
            machine,
            clusters,
            supervisor,
            delivery,
            ..
        } = self;
        drop(machine);
        drop(clusters);
        drop(supervisor);
        if tokio::time::timeout(DELIVERY_DRAIN_TIMEOUT, delivery).await.is_err() {
            warn!("notifier did not drain in time, pending events dropped");
        }
        info!("checkgrid daemon stopped");
    }
}

/// Not active and no runner attached.
pub fn is_settled(run: &TestRun) -> bool {
    !run.status.is_active() && run.pid.is_none()
}

/// Open (and upgrade) the store, creating its directory if needed.
pub fn open_store(config: &StoreConfig) -> anyhow::Result<StateStore> {
    if let Some(parent) = config.path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let state = StateStore::open(&config.path)?;
    info!(path = ?config.path, revision = state.schema_revision()?, "state store opened");
    Ok(state)
}

fn load_catalog(dir: &Path, state: &StateStore) -> anyhow::Result<Catalog> {
    let catalog = Catalog::from_source(ProfileSource::Directory(dir.to_path_buf()))?;
    record_snapshot(state, &catalog.snapshot())?;
    Ok(catalog)
}

fn record_snapshot(state: &StateStore, snapshot: &CatalogSnapshot) -> anyhow::Result<()> {
    state.put_catalog_snapshot(&CatalogSnapshotRecord {
        fingerprint: snapshot.fingerprint().to_string(),
        loaded_at: snapshot.loaded_at(),
        source: snapshot.source().to_string(),
        test_set_ids: snapshot.test_set_ids(),
    })?;
    info!(
        test_sets = snapshot.len(),
        fingerprint = %snapshot.fingerprint(),
        source = %snapshot.source(),
        "catalog loaded"
    );
    Ok(())
}
