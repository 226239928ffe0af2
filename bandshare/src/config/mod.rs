//! Configuration for coordination runs.
//!
//! Two layers:
//!
//! - [`CoordinationConfig`]: the runtime value handed to workers and the
//!   download manager (timeouts, poll jitter, download concurrency and
//!   download directory).
//! - [`ConfigFile`]: the INI file at `~/.bandshare/config.ini` carrying
//!   storage location, coordination, download and logging settings.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use bandshare::config::CoordinationConfig;
//!
//! let config = CoordinationConfig::new()
//!     .with_barrier_timeout(Duration::from_secs(7200))
//!     .with_max_concurrent_downloads(8);
//! assert_eq!(config.max_concurrent_downloads(), Some(8));
//! assert!(config.validate().is_ok());
//! ```

mod coordination;
mod defaults;
mod file;
mod parser;
mod settings;
mod writer;

pub use coordination::CoordinationConfig;
pub use defaults::*;
pub use file::{config_directory, config_file_path, ConfigFileError};
pub use settings::{
    ConfigFile, CoordinationSettings, DownloadSettings, LogHandler, LoggingSettings,
    StorageSettings,
};
