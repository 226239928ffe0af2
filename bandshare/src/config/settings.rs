//! Settings structs for all configuration sections.
//!
//! Each struct represents one `[section]` of the INI config file.
//! These are pure data types with no parsing or serialization logic.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use super::coordination::CoordinationConfig;
use crate::model::StorageConfig;

/// Complete configuration loaded from config.ini.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    /// Remote storage location
    pub storage: StorageSettings,
    /// Barrier and leader deadlines, poll jitter and download concurrency
    pub coordination: CoordinationSettings,
    /// Local download settings
    pub download: DownloadSettings,
    /// Logging settings
    pub logging: LoggingSettings,
}

/// `[storage]` section.
#[derive(Debug, Clone)]
pub struct StorageSettings {
    /// Storage endpoint URL, or a `file://` directory
    pub endpoint: String,
    /// Bucket holding the products
    pub bucket: String,
}

/// `[coordination]` section.
#[derive(Debug, Clone)]
pub struct CoordinationSettings {
    pub barrier_timeout_secs: u64,
    pub leader_timeout_secs: u64,
    pub poll_min_ms: u64,
    pub poll_max_ms: u64,
    /// Per-phase download limit; `None` downloads every object at once
    pub max_concurrent_downloads: Option<usize>,
}

/// `[download]` section.
#[derive(Debug, Clone)]
pub struct DownloadSettings {
    /// Directory objects are written under, keyed by their remote key
    pub directory: PathBuf,
}

/// Where log output goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogHandler {
    Console,
    File,
}

impl FromStr for LogHandler {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "console" => Ok(Self::Console),
            "file" => Ok(Self::File),
            other => Err(format!("unknown log handler '{}'", other)),
        }
    }
}

impl fmt::Display for LogHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Console => write!(f, "console"),
            Self::File => write!(f, "file"),
        }
    }
}

/// `[logging]` section.
#[derive(Debug, Clone)]
pub struct LoggingSettings {
    /// Default filter directive when RUST_LOG is unset (e.g. "info", "bandshare=debug")
    pub level: String,
    pub handler: LogHandler,
    /// Log directory (file handler only)
    pub directory: PathBuf,
    /// Log file name (file handler only)
    pub file: String,
}

impl ConfigFile {
    /// Storage location as used by fetchers.
    pub fn storage_config(&self) -> StorageConfig {
        StorageConfig::new(&self.storage.endpoint, &self.storage.bucket)
    }

    /// Runtime coordination settings.
    pub fn coordination_config(&self) -> CoordinationConfig {
        let coordination = &self.coordination;
        let config = CoordinationConfig::new()
            .with_barrier_timeout(Duration::from_secs(coordination.barrier_timeout_secs))
            .with_leader_timeout(Duration::from_secs(coordination.leader_timeout_secs))
            .with_poll_interval(
                Duration::from_millis(coordination.poll_min_ms),
                Duration::from_millis(coordination.poll_max_ms),
            )
            .with_download_root(self.download.directory.clone());
        match coordination.max_concurrent_downloads {
            Some(limit) => config.with_max_concurrent_downloads(limit),
            None => config,
        }
    }
}
