//! Cluster state cache: last good snapshot per cluster.
//!
//! Snapshots are replaced whole. A failed refresh leaves the previous
//! snapshot untouched in memory and in the store.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use checkgrid_core::ClusterState;
use checkgrid_state::StateStore;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::error::{ClusterStateFetchError, FetchResult};
use crate::source::MetadataSource;

#[derive(Clone)]
pub struct ClusterStateCache {
    source: Arc<dyn MetadataSource>,
    state: StateStore,
    snapshots: Arc<RwLock<HashMap<String, Arc<ClusterState>>>>,
}

impl ClusterStateCache {
    pub fn new(source: Arc<dyn MetadataSource>, state: StateStore) -> Self {
        Self {
            source,
            state,
            snapshots: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Fetch a fresh snapshot and make it the current one.
    ///
    /// On failure the previous snapshot is kept and the error returned.
    pub async fn refresh(&self, cluster_id: &str) -> FetchResult<Arc<ClusterState>> {
        let metadata = self.source.fetch(cluster_id).await?;
        let snapshot = Arc::new(metadata.into_state(cluster_id, epoch_secs()));

        if let Err(e) = self.state.put_cluster_state(&snapshot) {
            error!(%cluster_id, error = %e, "failed to persist cluster snapshot");
        }
        self.snapshots
            .write()
            .await
            .insert(cluster_id.to_string(), Arc::clone(&snapshot));

        debug!(
            %cluster_id,
            release = %snapshot.release_version,
            mode = %snapshot.deployment_mode,
            "cluster snapshot refreshed"
        );
        Ok(snapshot)
    }

    /// Refresh, falling back to the last good snapshot when the fetch fails.
    pub async fn refresh_or_last_good(&self, cluster_id: &str) -> FetchResult<Arc<ClusterState>> {
        match self.refresh(cluster_id).await {
            Ok(snapshot) => Ok(snapshot),
            Err(e) => match self.get(cluster_id).await? {
                Some(snapshot) => {
                    warn!(
                        %cluster_id,
                        error = %e,
                        fetched_at = snapshot.fetched_at,
                        "cluster refresh failed, using last good snapshot"
                    );
                    Ok(snapshot)
                }
                None => Err(ClusterStateFetchError::NoSnapshot {
                    cluster_id: cluster_id.to_string(),
                    cause: e.to_string(),
                }),
            },
        }
    }

    /// Current snapshot without refreshing, loading it from the store when
    /// this process has not fetched the cluster yet.
    pub async fn get(&self, cluster_id: &str) -> FetchResult<Option<Arc<ClusterState>>> {
        if let Some(snapshot) = self.snapshots.read().await.get(cluster_id) {
            return Ok(Some(Arc::clone(snapshot)));
        }
        let Some(stored) = self.state.get_cluster_state(cluster_id)? else {
            return Ok(None);
        };
        let snapshot = Arc::new(stored);
        self.snapshots
            .write()
            .await
            .entry(cluster_id.to_string())
            .or_insert_with(|| Arc::clone(&snapshot));
        info!(%cluster_id, fetched_at = snapshot.fetched_at, "cluster snapshot loaded from store");
        Ok(Some(snapshot))
    }
}

fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{ClusterMetadata, StaticMetadataSource};

    fn metadata(release: &str) -> ClusterMetadata {
        ClusterMetadata {
            deployment_mode: "ha_compact".to_string(),
            operating_system: "ubuntu".to_string(),
            release_version: release.to_string(),
            enabled_components: vec!["murano".to_string()],
        }
    }

    fn setup() -> (Arc<StaticMetadataSource>, StateStore, ClusterStateCache) {
        let source = Arc::new(StaticMetadataSource::new());
        let state = StateStore::open_in_memory().unwrap();
        let cache = ClusterStateCache::new(source.clone(), state.clone());
        (source, state, cache)
    }

    #[tokio::test]
    async fn refresh_persists_snapshot() {
        let (source, state, cache) = setup();
        source.insert("env-1", metadata("8.0"));

        let snapshot = cache.refresh("env-1").await.unwrap();
        assert_eq!(snapshot.release_version, "8.0");
        assert!(snapshot.enabled_components.contains("murano"));

        let stored = state.get_cluster_state("env-1").unwrap().unwrap();
        assert_eq!(stored, *snapshot);
    }

    #[tokio::test]
    async fn failed_refresh_keeps_last_good() {
        let (source, state, cache) = setup();
        source.insert("env-1", metadata("8.0"));
        cache.refresh("env-1").await.unwrap();

        source.set_unavailable("env-1");
        assert!(cache.refresh("env-1").await.is_err());

        let fallback = cache.refresh_or_last_good("env-1").await.unwrap();
        assert_eq!(fallback.release_version, "8.0");
        assert_eq!(state.get_cluster_state("env-1").unwrap().unwrap().release_version, "8.0");
    }

    #[tokio::test]
    async fn fallback_reads_store_after_restart() {
        let (source, state, cache) = setup();
        source.insert("env-1", metadata("9.0"));
        cache.refresh("env-1").await.unwrap();

        // A new cache over the same store, with the service down.
        let down = Arc::new(StaticMetadataSource::new());
        down.set_unavailable("env-1");
        let cache = ClusterStateCache::new(down, state);

        let snapshot = cache.refresh_or_last_good("env-1").await.unwrap();
        assert_eq!(snapshot.release_version, "9.0");
    }

    #[tokio::test]
    async fn no_snapshot_and_no_service_fails() {
        let (_source, _state, cache) = setup();
        assert!(matches!(
            cache.refresh_or_last_good("ghost").await,
            Err(ClusterStateFetchError::NoSnapshot { .. })
        ));
        assert!(cache.get("ghost").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn refresh_replaces_snapshot_whole() {
        let (source, _state, cache) = setup();
        source.insert("env-1", metadata("8.0"));
        let first = cache.refresh("env-1").await.unwrap();

        let mut upgraded = metadata("9.0");
        upgraded.enabled_components.clear();
        source.insert("env-1", upgraded);
        let second = cache.refresh("env-1").await.unwrap();

        // Holders of the old snapshot still see it intact.
        assert_eq!(first.release_version, "8.0");
        assert!(first.enabled_components.contains("murano"));
        assert!(second.enabled_components.is_empty());
        assert_eq!(cache.get("env-1").await.unwrap().unwrap().release_version, "9.0");
    }
}
