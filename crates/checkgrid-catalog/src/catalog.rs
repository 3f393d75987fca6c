//! Catalog: validated, atomically swapped registry of test set profiles.
//!
//! Profiles come from a directory tree of `*.toml` files (one test set per
//! file) or from an in-memory list. A reload parses and validates the whole
//! source before publishing anything; one malformed profile fails the
//! reload and the previous snapshot stays live.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::{SystemTime, UNIX_EPOCH};

use checkgrid_core::{TestSetId, TestSetProfile};
use regex::Regex;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::{CatalogError, CatalogResult, DiscoveryError};

/// Allowed shape of test set and test ids.
const ID_PATTERN: &str = r"^[A-Za-z0-9][A-Za-z0-9_.:-]*$";

/// Where a reload reads its profiles from.
#[derive(Debug, Clone)]
pub enum ProfileSource {
    /// Every `*.toml` file below this directory, one test set per file.
    Directory(PathBuf),
    Profiles(Vec<TestSetProfile>),
}

impl ProfileSource {
    fn describe(&self) -> String {
        match self {
            ProfileSource::Directory(dir) => dir.display().to_string(),
            ProfileSource::Profiles(_) => "memory".to_string(),
        }
    }
}

/// Immutable view of the catalog at one point in time.
#[derive(Debug, Default)]
pub struct CatalogSnapshot {
    sets: HashMap<TestSetId, TestSetProfile>,
    /// Ids ordered by ascending priority, ties by id.
    ordered: Vec<TestSetId>,
    /// Symmetric closure of `exclusive_with`.
    exclusions: HashMap<TestSetId, BTreeSet<TestSetId>>,
    fingerprint: String,
    loaded_at: u64,
    source: String,
}

impl CatalogSnapshot {
    fn build(profiles: Vec<TestSetProfile>, source: String) -> Result<Self, DiscoveryError> {
        validate(&profiles)?;

        let mut exclusions: HashMap<TestSetId, BTreeSet<TestSetId>> = HashMap::new();
        for profile in &profiles {
            for other in &profile.exclusive_with {
                exclusions
                    .entry(profile.id.clone())
                    .or_default()
                    .insert(other.clone());
                exclusions
                    .entry(other.clone())
                    .or_default()
                    .insert(profile.id.clone());
            }
        }

        let mut by_priority: Vec<&TestSetProfile> = profiles.iter().collect();
        by_priority.sort_by(|a, b| {
            a.ordering_priority
                .cmp(&b.ordering_priority)
                .then_with(|| a.id.cmp(&b.id))
        });
        let ordered = by_priority.iter().map(|p| p.id.clone()).collect();

        let fingerprint = fingerprint(&profiles)?;
        let sets = profiles.into_iter().map(|p| (p.id.clone(), p)).collect();

        Ok(Self {
            sets,
            ordered,
            exclusions,
            fingerprint,
            loaded_at: epoch_secs(),
            source,
        })
    }

    pub fn get(&self, id: &str) -> Option<&TestSetProfile> {
        self.sets.get(id)
    }

    /// All test sets, ascending `ordering_priority`, ties by id.
    pub fn ordered(&self) -> impl Iterator<Item = &TestSetProfile> {
        self.ordered.iter().filter_map(|id| self.sets.get(id))
    }

    /// Sets that may not be active on the same cluster as `id`, in
    /// either declaration direction.
    pub fn exclusions_of(&self, id: &str) -> BTreeSet<TestSetId> {
        self.exclusions.get(id).cloned().unwrap_or_default()
    }

    pub fn excludes(&self, a: &str, b: &str) -> bool {
        self.exclusions.get(a).is_some_and(|set| set.contains(b))
    }

    /// SHA-256 hex digest over the canonical JSON of the profiles.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn loaded_at(&self) -> u64 {
        self.loaded_at
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Test set ids sorted by id.
    pub fn test_set_ids(&self) -> Vec<TestSetId> {
        let mut ids: Vec<TestSetId> = self.sets.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }
}

/// Shared handle to the live catalog snapshot.
///
/// Cloning is cheap; all clones observe the same reloads.
#[derive(Clone, Debug, Default)]
pub struct Catalog {
    current: Arc<RwLock<Arc<CatalogSnapshot>>>,
}

impl Catalog {
    /// An empty catalog. Nothing is eligible until the first load.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a catalog from an initial source.
    pub fn from_source(source: ProfileSource) -> Result<Self, DiscoveryError> {
        let catalog = Self::new();
        catalog.load_profiles(source)?;
        Ok(catalog)
    }

    /// Parse and validate `source`, then swap it in as the live snapshot.
    ///
    /// On error the previous snapshot is kept.
    pub fn load_profiles(&self, source: ProfileSource) -> Result<Arc<CatalogSnapshot>, DiscoveryError> {
        let description = source.describe();
        let profiles = match source {
            ProfileSource::Directory(dir) => read_directory(&dir),
            ProfileSource::Profiles(profiles) => Ok(profiles),
        }
        .and_then(|profiles| CatalogSnapshot::build(profiles, description.clone()));

        let snapshot = match profiles {
            Ok(snapshot) => Arc::new(snapshot),
            Err(e) => {
                warn!(source = %description, error = %e, "catalog reload rejected, keeping previous");
                return Err(e);
            }
        };

        {
            let mut current = self.current.write().unwrap_or_else(|e| e.into_inner());
            *current = Arc::clone(&snapshot);
        }
        info!(
            source = %description,
            test_sets = snapshot.len(),
            fingerprint = %snapshot.fingerprint(),
            "catalog loaded"
        );
        Ok(snapshot)
    }

    /// The live snapshot. Holding it pins that version across reloads.
    pub fn snapshot(&self) -> Arc<CatalogSnapshot> {
        let current = self.current.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&current)
    }

    pub fn get_test_set(&self, id: &str) -> CatalogResult<TestSetProfile> {
        self.snapshot()
            .get(id)
            .cloned()
            .ok_or_else(|| CatalogError::NotFound(id.to_string()))
    }

    /// Every test set, ascending `ordering_priority`, ties by id.
    pub fn all_test_sets(&self) -> Vec<TestSetProfile> {
        self.snapshot().ordered().cloned().collect()
    }
}

fn read_directory(dir: &Path) -> Result<Vec<TestSetProfile>, DiscoveryError> {
    let mut profiles = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.map_err(|e| DiscoveryError::Io {
            path: e.path().map(Path::to_path_buf).unwrap_or_else(|| dir.to_path_buf()),
            message: e.to_string(),
        })?;
        let path = entry.path();
        if !entry.file_type().is_file() || path.extension().is_none_or(|ext| ext != "toml") {
            continue;
        }
        let content = std::fs::read_to_string(path).map_err(|e| DiscoveryError::Io {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let profile: TestSetProfile = toml::from_str(&content).map_err(|e| DiscoveryError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        debug!(path = %path.display(), test_set = %profile.id, "profile parsed");
        profiles.push(profile);
    }
    Ok(profiles)
}

fn validate(profiles: &[TestSetProfile]) -> Result<(), DiscoveryError> {
    let id_re = Regex::new(ID_PATTERN).map_err(|e| DiscoveryError::Pattern(e.to_string()))?;

    let mut set_ids = HashSet::new();
    for profile in profiles {
        if !id_re.is_match(&profile.id) {
            return Err(DiscoveryError::InvalidId {
                kind: "test set",
                id: profile.id.clone(),
            });
        }
        if !set_ids.insert(profile.id.as_str()) {
            return Err(DiscoveryError::DuplicateTestSet(profile.id.clone()));
        }
        if profile.test_path.trim().is_empty() {
            return Err(DiscoveryError::EmptyTestPath(profile.id.clone()));
        }

        let mut test_ids = HashSet::new();
        for test in &profile.tests {
            if !id_re.is_match(&test.id) {
                return Err(DiscoveryError::InvalidId {
                    kind: "test",
                    id: test.id.clone(),
                });
            }
            if !test_ids.insert(test.id.as_str()) {
                return Err(DiscoveryError::DuplicateTest {
                    set: profile.id.clone(),
                    test: test.id.clone(),
                });
            }
        }
    }

    for profile in profiles {
        for target in &profile.exclusive_with {
            if *target == profile.id {
                return Err(DiscoveryError::SelfExclusion(profile.id.clone()));
            }
            if !set_ids.contains(target.as_str()) {
                return Err(DiscoveryError::UnknownExclusion {
                    set: profile.id.clone(),
                    target: target.clone(),
                });
            }
        }
    }
    Ok(())
}

/// Digest over the profiles sorted by id, independent of source order.
fn fingerprint(profiles: &[TestSetProfile]) -> Result<String, DiscoveryError> {
    let mut sorted: Vec<&TestSetProfile> = profiles.iter().collect();
    sorted.sort_by(|a, b| a.id.cmp(&b.id));
    let canonical =
        serde_json::to_vec(&sorted).map_err(|e| DiscoveryError::Fingerprint(e.to_string()))?;
    Ok(hex::encode(Sha256::digest(&canonical)))
}

fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
