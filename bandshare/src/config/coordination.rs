//! Runtime coordination configuration.

use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::CoordinationError;

use super::defaults::{
    DEFAULT_BARRIER_TIMEOUT_SECS, DEFAULT_DOWNLOAD_DIR, DEFAULT_LEADER_TIMEOUT_SECS,
    DEFAULT_POLL_MAX_MS, DEFAULT_POLL_MIN_MS,
};

/// Configuration for workers, barriers and the download manager.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use bandshare::config::CoordinationConfig;
///
/// // Using defaults
/// let config = CoordinationConfig::default();
/// assert_eq!(config.barrier_timeout(), Duration::from_secs(5400));
/// assert_eq!(config.max_concurrent_downloads(), None);
///
/// // Custom configuration
/// let config = CoordinationConfig::new()
///     .with_poll_interval(Duration::from_millis(10), Duration::from_millis(20))
///     .with_download_root("/data/products");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinationConfig {
    /// Maximum time a worker waits at the barrier
    barrier_timeout: Duration,
    /// Maximum time for one download manager run
    leader_timeout: Duration,
    /// Fallback poll interval bounds (jittered between them)
    poll_interval_min: Duration,
    poll_interval_max: Duration,
    /// Per-phase download concurrency; `None` means one download per object
    max_concurrent_downloads: Option<usize>,
    /// Local directory objects are written under
    download_root: PathBuf,
}

impl CoordinationConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the barrier deadline.
    ///
    /// A worker whose bands are not all ready by then fails with a barrier
    /// timeout. The clock restarts when the product's leader starts.
    /// Default: 90 minutes.
    pub fn with_barrier_timeout(mut self, timeout: Duration) -> Self {
        self.barrier_timeout = timeout;
        self
    }

    /// Set the deadline for the download manager run. Default: 60 minutes.
    pub fn with_leader_timeout(mut self, timeout: Duration) -> Self {
        self.leader_timeout = timeout;
        self
    }

    /// Set the bounds of the jittered fallback poll interval.
    ///
    /// Bounds given in the wrong order are swapped. Default: 50-250 ms.
    pub fn with_poll_interval(mut self, min: Duration, max: Duration) -> Self {
        let (min, max) = if min <= max { (min, max) } else { (max, min) };
        self.poll_interval_min = min;
        self.poll_interval_max = max;
        self
    }

    /// Limit concurrent object downloads within each download phase.
    ///
    /// A limit of zero is treated as one.
    pub fn with_max_concurrent_downloads(mut self, limit: usize) -> Self {
        self.max_concurrent_downloads = Some(limit.max(1));
        self
    }

    /// Set the directory downloaded objects are written under.
    pub fn with_download_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.download_root = root.into();
        self
    }

    pub fn barrier_timeout(&self) -> Duration {
        self.barrier_timeout
    }

    pub fn leader_timeout(&self) -> Duration {
        self.leader_timeout
    }

    /// Range the fallback poll interval is drawn from, in milliseconds.
    pub fn poll_interval_ms(&self) -> RangeInclusive<u64> {
        let min = self.poll_interval_min.as_millis() as u64;
        let max = self.poll_interval_max.as_millis() as u64;
        min..=max
    }

    pub fn max_concurrent_downloads(&self) -> Option<usize> {
        self.max_concurrent_downloads
    }

    pub fn download_root(&self) -> &Path {
        &self.download_root
    }

    /// Checks that the barrier deadline covers the leader deadline.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` if `barrier_timeout < leader_timeout`.
    pub fn validate(&self) -> Result<(), CoordinationError> {
        if self.barrier_timeout < self.leader_timeout {
            return Err(CoordinationError::InvalidConfig {
                reason: format!(
                    "barrier timeout ({}s) is shorter than leader timeout ({}s)",
                    self.barrier_timeout.as_secs_f64(),
                    self.leader_timeout.as_secs_f64()
                ),
            });
        }
        Ok(())
    }
}

impl Default for CoordinationConfig {
    fn default() -> Self {
        Self {
            barrier_timeout: Duration::from_secs(DEFAULT_BARRIER_TIMEOUT_SECS),
            leader_timeout: Duration::from_secs(DEFAULT_LEADER_TIMEOUT_SECS),
            poll_interval_min: Duration::from_millis(DEFAULT_POLL_MIN_MS),
            poll_interval_max: Duration::from_millis(DEFAULT_POLL_MAX_MS),
            max_concurrent_downloads: None,
            download_root: PathBuf::from(DEFAULT_DOWNLOAD_DIR),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CoordinationConfig::default();
        assert_eq!(config.barrier_timeout(), Duration::from_secs(DEFAULT_BARRIER_TIMEOUT_SECS));
        assert_eq!(config.leader_timeout(), Duration::from_secs(DEFAULT_LEADER_TIMEOUT_SECS));
        assert_eq!(config.poll_interval_ms(), DEFAULT_POLL_MIN_MS..=DEFAULT_POLL_MAX_MS);
        assert_eq!(config.max_concurrent_downloads(), None);
        assert_eq!(config.download_root(), Path::new("."));
    }

    #[test]
    fn test_new_equals_default() {
        assert_eq!(CoordinationConfig::new(), CoordinationConfig::default());
    }

    #[test]
    fn test_with_poll_interval_orders_bounds() {
        let config = CoordinationConfig::new()
            .with_poll_interval(Duration::from_millis(300), Duration::from_millis(20));
        assert_eq!(config.poll_interval_ms(), 20..=300);
    }

    #[test]
    fn test_with_max_concurrent_downloads_floor() {
        let config = CoordinationConfig::new().with_max_concurrent_downloads(0);
        assert_eq!(config.max_concurrent_downloads(), Some(1));
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(CoordinationConfig::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_barrier_shorter_than_leader() {
        let config = CoordinationConfig::new()
            .with_barrier_timeout(Duration::from_millis(100))
            .with_leader_timeout(Duration::from_millis(200));
        assert!(matches!(
            config.validate(),
            Err(CoordinationError::InvalidConfig { .. })
        ));

        let equal = config.with_barrier_timeout(Duration::from_millis(200));
        assert!(equal.validate().is_ok());
    }

    #[test]
    fn test_builder_leaves_other_fields() {
        let config = CoordinationConfig::new().with_leader_timeout(Duration::from_secs(5));
        assert_eq!(config.leader_timeout(), Duration::from_secs(5));
        assert_eq!(config.barrier_timeout(), Duration::from_secs(DEFAULT_BARRIER_TIMEOUT_SECS));
    }
}
