//! checkd: the checkgrid daemon and operator CLI.
//!
//! # Usage
//!
//! ```text
//! checkd --config /etc/checkgrid/checkgrid.toml run --cluster env-1 --test-set smoke
//! checkd eligible --cluster env-1 --format json
//! checkd history --cluster env-1
//! checkd catalog check --dir ./testsets
//! checkd migrate --to 3
//! ```

use std::path::{Path, PathBuf};

use checkgrid_core::{parse_duration, CheckgridConfig};
use clap::{Parser, Subcommand};
use tracing::debug;

mod commands;

const DEFAULT_CONFIG_PATH: &str = "checkgrid.toml";

#[derive(Parser)]
#[command(
    name = "checkd",
    about = "checkgrid: health-check orchestration daemon",
    version,
    propagate_version = true,
)]
struct Cli {
    /// Configuration file. Defaults to ./checkgrid.toml when present.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Data directory; the store is kept at <data-dir>/checkgrid.redb.
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a test run and follow it until it settles. Ctrl-C stops it.
    Run {
        #[arg(long)]
        cluster: String,
        #[arg(long)]
        test_set: String,
        /// Run only these tests (comma separated); the rest are disabled.
        #[arg(long, value_delimiter = ',')]
        tests: Vec<String>,
        /// Status poll interval.
        #[arg(long, default_value = "500ms")]
        poll: String,
    },
    /// Re-execute a stopped, finished or failed run and follow it.
    Restart {
        #[arg(long)]
        run_id: u64,
        #[arg(long, default_value = "500ms")]
        poll: String,
    },
    /// List the test sets and tests that apply to a cluster.
    Eligible {
        #[arg(long)]
        cluster: String,
        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: String,
    },
    /// Show past runs, or one run with its tests.
    History {
        #[arg(long)]
        cluster: Option<String>,
        #[arg(long)]
        run_id: Option<u64>,
        /// Only the latest run of each test set (requires --cluster).
        #[arg(long)]
        latest: bool,
        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: String,
    },
    /// Inspect test set profiles.
    Catalog {
        #[command(subcommand)]
        action: CatalogAction,
    },
    /// Move the store schema to a revision (default: head).
    Migrate {
        #[arg(long)]
        to: Option<u32>,
    },
}

#[derive(Subcommand)]
enum CatalogAction {
    /// Validate a profile directory without touching the store.
    Check {
        /// Profile directory (default: catalog.dir from the config)
        #[arg(long)]
        dir: Option<PathBuf>,
    },
    /// Catalog loads recorded in the store.
    History,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref(), cli.data_dir.as_deref())?;
    checkd::logging::init(&config.log)?;
    debug!(store = ?config.store.path, catalog = ?config.catalog.dir, "configuration loaded");

    match cli.command {
        Commands::Run {
            cluster,
            test_set,
            tests,
            poll,
        } => commands::run::run(config, &cluster, &test_set, tests, poll_interval(&poll)?).await,
        Commands::Restart { run_id, poll } => {
            commands::run::restart(config, run_id, poll_interval(&poll)?).await
        }
        Commands::Eligible { cluster, format } => {
            commands::inspect::eligible(config, &cluster, &format).await
        }
        Commands::History {
            cluster,
            run_id,
            latest,
            format,
        } => commands::inspect::history(&config, cluster.as_deref(), run_id, latest, &format),
        Commands::Catalog { action } => match action {
            CatalogAction::Check { dir } => {
                commands::store::catalog_check(dir.unwrap_or(config.catalog.dir))
            }
            CatalogAction::History => commands::store::catalog_history(&config),
        },
        Commands::Migrate { to } => commands::store::migrate(&config, to),
    }
}

fn load_config(path: Option<&Path>, data_dir: Option<&Path>) -> anyhow::Result<CheckgridConfig> {
    let mut config = match path {
        Some(path) => CheckgridConfig::from_file(path)
            .map_err(|e| anyhow::anyhow!("load {}: {e}", path.display()))?,
        None if Path::new(DEFAULT_CONFIG_PATH).exists() => {
            CheckgridConfig::from_file(Path::new(DEFAULT_CONFIG_PATH))?
        }
        None => CheckgridConfig::default(),
    };
    if let Some(dir) = data_dir {
        config.store.path = dir.join("checkgrid.redb");
    }
    Ok(config)
}

fn poll_interval(raw: &str) -> anyhow::Result<std::time::Duration> {
    parse_duration(raw).ok_or_else(|| anyhow::anyhow!("invalid poll interval {raw:?}"))
}
