//! Default values and constants for all configuration settings.
//!
//! Contains all `DEFAULT_*` constants and the `ConfigFile::default()`
//! implementation.

use std::path::PathBuf;

use super::settings::*;

// =============================================================================
// Storage
// =============================================================================

/// Default storage endpoint (empty: must be configured).
pub const DEFAULT_STORAGE_ENDPOINT: &str = "";

/// Default bucket name.
pub const DEFAULT_STORAGE_BUCKET: &str = "";

// =============================================================================
// Coordination
// =============================================================================

/// Default barrier deadline: 90 minutes.
///
/// Must not be shorter than the leader deadline: the barrier restarts its
/// clock when the leader starts, and only a leader stalled past its own
/// deadline should time out its waiters.
pub const DEFAULT_BARRIER_TIMEOUT_SECS: u64 = 90 * 60;

/// Default deadline for a whole download manager run: 60 minutes.
pub const DEFAULT_LEADER_TIMEOUT_SECS: u64 = 60 * 60;

/// Lower bound of the jittered barrier poll interval.
pub const DEFAULT_POLL_MIN_MS: u64 = 50;

/// Upper bound of the jittered barrier poll interval.
pub const DEFAULT_POLL_MAX_MS: u64 = 250;

// =============================================================================
// Download
// =============================================================================

/// Objects are written below the working directory by default.
pub const DEFAULT_DOWNLOAD_DIR: &str = ".";

// =============================================================================
// Logging
// =============================================================================

pub const DEFAULT_LOG_LEVEL: &str = "info";
pub const DEFAULT_LOG_DIR: &str = "logs";
pub const DEFAULT_LOG_FILE: &str = "bandshare.log";

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            storage: StorageSettings {
                endpoint: DEFAULT_STORAGE_ENDPOINT.to_string(),
                bucket: DEFAULT_STORAGE_BUCKET.to_string(),
            },
            coordination: CoordinationSettings {
                barrier_timeout_secs: DEFAULT_BARRIER_TIMEOUT_SECS,
                leader_timeout_secs: DEFAULT_LEADER_TIMEOUT_SECS,
                poll_min_ms: DEFAULT_POLL_MIN_MS,
                poll_max_ms: DEFAULT_POLL_MAX_MS,
                max_concurrent_downloads: None,
            },
            download: DownloadSettings {
                directory: PathBuf::from(DEFAULT_DOWNLOAD_DIR),
            },
            logging: LoggingSettings {
                level: DEFAULT_LOG_LEVEL.to_string(),
                handler: LogHandler::Console,
                directory: PathBuf::from(DEFAULT_LOG_DIR),
                file: DEFAULT_LOG_FILE.to_string(),
            },
        }
    }
}
