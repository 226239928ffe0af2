//! INI serialization logic for converting `ConfigFile` → INI string.
//!
//! Produces the commented INI representation written to `config.ini`.

use std::path::Path;

use super::settings::ConfigFile;

/// Convert a `ConfigFile` to a commented INI string for saving.
pub(super) fn to_config_string(config: &ConfigFile) -> String {
    let max_concurrent_downloads = config
        .coordination
        .max_concurrent_downloads
        .map(|n| n.to_string())
        .unwrap_or_default();

    format!(
        r#"[storage]
; Object storage endpoint. Use file:///path/to/mirror for a local directory tree.
endpoint = {}
; Bucket holding the products
bucket = {}

[coordination]
; Maximum time a worker waits for its bands before failing (default: 5400).
; Counted from the leader's start; must be at least leader_timeout_secs
barrier_timeout_secs = {}
; Maximum time for the elected leader's download run (default: 3600)
leader_timeout_secs = {}
; Workers are woken on every readiness change; these bound the fallback
; re-check interval, jittered between min and max (default: 50 / 250)
poll_min_ms = {}
poll_max_ms = {}
; Limit concurrent object downloads per phase. Empty = one download per object.
max_concurrent_downloads = {}

[download]
; Directory products are downloaded into. Objects keep their remote key as
; their path below this directory.
directory = {}

[logging]
; Default log level when RUST_LOG is not set (trace, debug, info, warn, error)
level = {}
; Log output: console or file
handler = {}
; Directory and file name used by the file handler
directory = {}
file = {}
"#,
        config.storage.endpoint,
        config.storage.bucket,
        config.coordination.barrier_timeout_secs,
        config.coordination.leader_timeout_secs,
        config.coordination.poll_min_ms,
        config.coordination.poll_max_ms,
        max_concurrent_downloads,
        path_to_string(&config.download.directory),
        config.logging.level,
        config.logging.handler,
        path_to_string(&config.logging.directory),
        config.logging.file,
    )
}

fn path_to_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
