//! checkgrid.toml configuration parser.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckgridConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub cluster: ClusterConfig,
    #[serde(default)]
    pub executor: ExecutorConfig,
    #[serde(default)]
    pub notifier: NotifierConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Path of the redb database file.
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Directory scanned recursively for `*.toml` test set profiles.
    #[serde(default = "default_catalog_dir")]
    pub dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// Base URL of the cluster metadata API.
    #[serde(default = "default_metadata_url")]
    pub metadata_url: String,
    #[serde(default = "default_cluster_timeout")]
    pub timeout: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Check-runner program spawned once per active test run.
    #[serde(default = "default_runner_program")]
    pub program: String,
    /// Arguments placed before the generated `run`/`cleanup` arguments.
    #[serde(default)]
    pub args: Vec<String>,
    /// Maximum number of concurrently supervised runner processes.
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    /// Time between SIGTERM and SIGKILL on stop.
    #[serde(default = "default_grace_period")]
    pub grace_period: String,
    #[serde(default = "default_cleanup_timeout")]
    pub cleanup_timeout: String,
    pub working_dir: Option<PathBuf>,
    #[serde(default)]
    pub env: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifierConfig {
    /// Bus gateway endpoint receiving JSON events. Events are only logged when unset.
    pub endpoint: Option<String>,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default = "default_notifier_timeout")]
    pub timeout: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Fallback filter when `RUST_LOG` is unset.
    #[serde(default = "default_log_filter")]
    pub filter: String,
    #[serde(default)]
    pub json: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            dir: default_catalog_dir(),
        }
    }
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            metadata_url: default_metadata_url(),
            timeout: default_cluster_timeout(),
        }
    }
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            program: default_runner_program(),
            args: Vec::new(),
            capacity: default_capacity(),
            grace_period: default_grace_period(),
            cleanup_timeout: default_cleanup_timeout(),
            working_dir: None,
            env: HashMap::new(),
        }
    }
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            queue_capacity: default_queue_capacity(),
            timeout: default_notifier_timeout(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
            json: false,
        }
    }
}

impl ClusterConfig {
    pub fn timeout(&self) -> Duration {
        parse_duration(&self.timeout).unwrap_or(Duration::from_secs(5))
    }
}

impl ExecutorConfig {
    pub fn grace_period(&self) -> Duration {
        parse_duration(&self.grace_period).unwrap_or(Duration::from_secs(10))
    }

    pub fn cleanup_timeout(&self) -> Duration {
        parse_duration(&self.cleanup_timeout).unwrap_or(Duration::from_secs(60))
    }
}

impl NotifierConfig {
    pub fn timeout(&self) -> Duration {
        parse_duration(&self.timeout).unwrap_or(Duration::from_secs(2))
    }
}

impl CheckgridConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let config: CheckgridConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.executor.capacity == 0 {
            anyhow::bail!("executor.capacity must be at least 1");
        }
        if self.executor.program.trim().is_empty() {
            anyhow::bail!("executor.program must not be empty");
        }
        if self.notifier.queue_capacity == 0 {
            anyhow::bail!("notifier.queue_capacity must be at least 1");
        }
        for (field, value) in [
            ("cluster.timeout", &self.cluster.timeout),
            ("executor.grace_period", &self.executor.grace_period),
            ("executor.cleanup_timeout", &self.executor.cleanup_timeout),
            ("notifier.timeout", &self.notifier.timeout),
        ] {
            if parse_duration(value).is_none() {
                anyhow::bail!("{field}: invalid duration {value:?}");
            }
        }
        Ok(())
    }
}

/// Parse a duration string like "5s", "500ms", "1m".
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if let Some(secs) = s.strip_suffix('s') {
        if let Some(ms) = secs.strip_suffix('m') {
            ms.parse::<u64>().ok().map(Duration::from_millis)
        } else {
            secs.parse::<u64>().ok().map(Duration::from_secs)
        }
    } else if let Some(mins) = s.strip_suffix('m') {
        mins.parse::<u64>().ok().map(|m| Duration::from_secs(m * 60))
    } else {
        s.parse::<u64>().ok().map(Duration::from_secs)
    }
}

fn default_store_path() -> PathBuf {
    PathBuf::from("/var/lib/checkgrid/checkgrid.redb")
}

fn default_catalog_dir() -> PathBuf {
    PathBuf::from("/etc/checkgrid/testsets")
}

fn default_metadata_url() -> String {
    "http://127.0.0.1:8000/api".to_string()
}

fn default_cluster_timeout() -> String {
    "5s".to_string()
}

fn default_runner_program() -> String {
    "checkgrid-runner".to_string()
}

fn default_capacity() -> usize {
    4
}

fn default_grace_period() -> String {
    "10s".to_string()
}

fn default_cleanup_timeout() -> String {
    "60s".to_string()
}

fn default_queue_capacity() -> usize {
    1024
}

fn default_notifier_timeout() -> String {
    "2s".to_string()
}

fn default_log_filter() -> String {
    "info,checkd=debug,checkgrid=debug".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let config = CheckgridConfig::from_toml_str("").unwrap();
        assert_eq!(config.executor.capacity, 4);
        assert_eq!(config.executor.grace_period(), Duration::from_secs(10));
        assert_eq!(config.cluster.timeout(), Duration::from_secs(5));
        assert!(config.notifier.endpoint.is_none());
        assert!(!config.log.json);
    }

    #[test]
    fn parse_full_config() {
        let toml_str = r#"
[store]
path = "/tmp/cg.redb"

[catalog]
dir = "/tmp/testsets"

[cluster]
metadata_url = "http://nailgun:8000/api"
timeout = "3s"

[executor]
program = "/usr/bin/run-checks"
args = ["--verbose"]
capacity = 2
grace_period = "500ms"
cleanup_timeout = "2m"

[executor.env]
OS_AUTH_URL = "http://keystone:5000"

[notifier]
endpoint = "http://bus:15672/publish"
queue_capacity = 16

[log]
filter = "debug"
json = true
"#;
        let config = CheckgridConfig::from_toml_str(toml_str).unwrap();
        assert_eq!(config.store.path, PathBuf::from("/tmp/cg.redb"));
        assert_eq!(config.executor.capacity, 2);
        assert_eq!(config.executor.args, vec!["--verbose".to_string()]);
        assert_eq!(config.executor.grace_period(), Duration::from_millis(500));
        assert_eq!(config.executor.cleanup_timeout(), Duration::from_secs(120));
        assert_eq!(
            config.executor.env.get("OS_AUTH_URL").map(String::as_str),
            Some("http://keystone:5000")
        );
        assert_eq!(config.notifier.queue_capacity, 16);
        assert!(config.log.json);
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let err = CheckgridConfig::from_toml_str("[executor]\ncapacity = 0\n").unwrap_err();
        assert!(err.to_string().contains("capacity"));
    }

    #[test]
    fn invalid_duration_is_rejected() {
        let err =
            CheckgridConfig::from_toml_str("[executor]\ngrace_period = \"soon\"\n").unwrap_err();
        assert!(err.to_string().contains("executor.grace_period"));
    }

    #[test]
    fn roundtrips_through_toml() {
        let config = CheckgridConfig::default();
        let text = config.to_toml_string().unwrap();
        let back = CheckgridConfig::from_toml_str(&text).unwrap();
        assert_eq!(back.executor.program, config.executor.program);
    }

    #[test]
    fn parse_duration_units() {
        assert_eq!(parse_duration("5s"), Some(Duration::from_secs(5)));
        assert_eq!(parse_duration("500ms"), Some(Duration::from_millis(500)));
        assert_eq!(parse_duration("2m"), Some(Duration::from_secs(120)));
        assert_eq!(parse_duration("10"), Some(Duration::from_secs(10)));
        assert_eq!(parse_duration("soon"), None);
    }
}
