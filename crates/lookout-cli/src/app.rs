//! Application context for the Lookout CLI.
//!
//! Bundles the parsed arguments with the lazily-loaded config file and
//! builds the core components commands need.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use once_cell::unsync::OnceCell;

use lookout_core::{AlertScheduler, DeltaTracker, Matcher, SqliteSearchStore};

use crate::cli::Cli;
use crate::config::{default_config_path, read_config, LookoutConfig};
use crate::errors::CliError;
use crate::index::JsonFileIndex;
use crate::sink::build_sink;

/// Resolve the config file path, checking LOOKOUT_CONFIG first.
pub fn resolve_config_path() -> anyhow::Result<PathBuf> {
    if let Ok(value) = std::env::var("LOOKOUT_CONFIG") {
        if !value.trim().is_empty() {
            return Ok(PathBuf::from(value));
        }
    }
    default_config_path()
}

/// Error returned when no config file exists yet.
pub fn missing_config_error(config_path: &Path) -> CliError {
    CliError::not_found(
        format!("No lookout config found at {}", config_path.display()),
        "Hint: Run `lookout init --listings <PATH>` to create one.",
    )
}

pub struct AppContext<'a> {
    cli: &'a Cli,
    config: OnceCell<LookoutConfig>,
}

impl<'a> AppContext<'a> {
    pub fn new(cli: &'a Cli) -> Self {
        Self {
            cli,
            config: OnceCell::new(),
        }
    }

    pub fn cli(&self) -> &Cli {
        self.cli
    }

    pub fn quiet(&self) -> bool {
        self.cli.quiet
    }

    /// Load the config file on first use.
    pub fn config(&self) -> anyhow::Result<&LookoutConfig> {
        self.config.get_or_try_init(|| {
            let path = resolve_config_path()?;
            if !path.exists() {
                return Err(missing_config_error(&path).into());
            }
            read_config(&path)
        })
    }

    /// Database path: `--db` / `LOOKOUT_DB`, else the config file.
    pub fn store_path(&self) -> anyhow::Result<PathBuf> {
        if let Some(path) = &self.cli.db {
            return Ok(PathBuf::from(path));
        }
        Ok(PathBuf::from(&self.config()?.store.path))
    }

    pub fn open_store(&self) -> anyhow::Result<Arc<SqliteSearchStore>> {
        let path = self.store_path()?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    anyhow::anyhow!("Failed to create {}: {}", parent.display(), e)
                })?;
            }
        }
        Ok(Arc::new(SqliteSearchStore::open(&path)?))
    }

    pub fn tracker(&self) -> anyhow::Result<Arc<DeltaTracker>> {
        let store = self.open_store()?;
        let index = JsonFileIndex::new(&self.config()?.index.listings);
        Ok(Arc::new(DeltaTracker::new(
            store,
            Matcher::new(Arc::new(index)),
        )))
    }

    pub fn scheduler(&self) -> anyhow::Result<AlertScheduler> {
        let config = self.config()?;
        let scheduler_config = config.scheduler.to_scheduler_config()?;
        Ok(AlertScheduler::new(
            self.tracker()?,
            build_sink(&config.notifications),
            scheduler_config,
        ))
    }
}
