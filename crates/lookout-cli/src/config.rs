use std::path::{Path, PathBuf};
use std::time::Duration as StdDuration;

use lookout_core::SchedulerConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LookoutConfig {
    pub store: StoreSection,
    pub index: IndexSection,
    #[serde(default)]
    pub notifications: NotificationsSection,
    #[serde(default)]
    pub scheduler: SchedulerSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreSection {
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexSection {
    /// JSON file holding an array of listings
    pub listings: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct NotificationsSection {
    /// JSONL outbox; notifications are only logged when unset
    pub outbox: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerSection {
    pub tick_seconds: u64,
    pub daily_window_hours: i64,
    pub weekly_window_days: i64,
    pub max_concurrent_checks: usize,
}

impl Default for SchedulerSection {
    fn default() -> Self {
        Self {
            tick_seconds: 60,
            daily_window_hours: 24,
            weekly_window_days: 7,
            max_concurrent_checks: 8,
        }
    }
}

impl SchedulerSection {
    pub fn to_scheduler_config(&self) -> anyhow::Result<SchedulerConfig> {
        if self.tick_seconds == 0 {
            return Err(anyhow::anyhow!("scheduler.tick_seconds must be positive"));
        }
        if self.daily_window_hours <= 0 || self.weekly_window_days <= 0 {
            return Err(anyhow::anyhow!("scheduler windows must be positive"));
        }
        if self.max_concurrent_checks == 0 {
            return Err(anyhow::anyhow!(
                "scheduler.max_concurrent_checks must be positive"
            ));
        }
        Ok(SchedulerConfig {
            tick_interval: StdDuration::from_secs(self.tick_seconds),
            daily_window: chrono::Duration::hours(self.daily_window_hours),
            weekly_window: chrono::Duration::days(self.weekly_window_days),
            max_concurrent_checks: self.max_concurrent_checks,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct LoggingSection {
    pub level: LogLevel,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Error,
    #[default]
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl LookoutConfig {
    pub fn new(store_path: PathBuf, listings_path: PathBuf, outbox_path: Option<PathBuf>) -> Self {
        Self {
            store: StoreSection {
                path: store_path.to_string_lossy().to_string(),
            },
            index: IndexSection {
                listings: listings_path.to_string_lossy().to_string(),
            },
            notifications: NotificationsSection {
                outbox: outbox_path.map(|path| path.to_string_lossy().to_string()),
            },
            scheduler: SchedulerSection::default(),
            logging: LoggingSection::default(),
        }
    }
}

pub fn default_config_path() -> anyhow::Result<PathBuf> {
    Ok(xdg_config_dir()?.join("config.toml"))
}

pub fn default_store_path() -> anyhow::Result<PathBuf> {
    Ok(xdg_data_dir()?.join("lookout.db"))
}

pub fn default_listings_path() -> anyhow::Result<PathBuf> {
    Ok(xdg_data_dir()?.join("listings.json"))
}

pub fn read_config(path: &Path) -> anyhow::Result<LookoutConfig> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read config {}: {}", path.display(), e))?;
    toml::from_str(&contents)
        .map_err(|e| anyhow::anyhow!("Failed to parse config {}: {}", path.display(), e))
}

pub fn write_config(path: &Path, config: &LookoutConfig) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            anyhow::anyhow!(
                "Failed to create config directory {}: {}",
                parent.display(),
                e
            )
        })?;
    }
    let contents =
        toml::to_string_pretty(config).map_err(|e| anyhow::anyhow!("TOML error: {}", e))?;
    std::fs::write(path, contents)
        .map_err(|e| anyhow::anyhow!("Failed to write config {}: {}", path.display(), e))?;
    Ok(())
}

pub fn xdg_config_dir() -> anyhow::Result<PathBuf> {
    if let Ok(value) = std::env::var("XDG_CONFIG_HOME") {
        if !value.trim().is_empty() {
            return Ok(PathBuf::from(value).join("lookout"));
        }
    }
    Ok(home_dir()?.join(".config").join("lookout"))
}

pub fn xdg_data_dir() -> anyhow::Result<PathBuf> {
    if let Ok(value) = std::env::var("XDG_DATA_HOME") {
        if !value.trim().is_empty() {
            return Ok(PathBuf::from(value).join("lookout"));
        }
    }
    Ok(home_dir()?.join(".local").join("share").join("lookout"))
}

fn home_dir() -> anyhow::Result<PathBuf> {
    let home = std::env::var("HOME")
        .map_err(|_| anyhow::anyhow!("HOME is not set; cannot resolve default paths"))?;
    Ok(PathBuf::from(home))
}
