//! In-memory object fetcher with call accounting.
//!
//! Serves objects from a map, records every download per key, and can be
//! told to fail or delay specific keys. Used for dry runs and tests of the
//! coordination protocol.

use std::path::Path;
use std::time::Duration;

use dashmap::DashMap;
use tokio::fs;

use super::traits::{FetchError, ObjectFetcher};
use crate::model::StorageConfig;

/// [`ObjectFetcher`] backed by an in-memory map.
#[derive(Debug, Default)]
pub struct MemoryObjectFetcher {
    objects: DashMap<String, Vec<u8>>,
    failures: DashMap<String, FetchError>,
    delays: DashMap<String, Duration>,
    default_delay: Duration,
    downloads: DashMap<String, usize>,
    memory_reads: DashMap<String, usize>,
}

impl MemoryObjectFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an object.
    pub fn with_object(self, key: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        self.objects.insert(key.into(), body.into());
        self
    }

    /// Makes every download of `key` fail with `error`.
    pub fn with_failure(self, key: impl Into<String>, error: FetchError) -> Self {
        self.failures.insert(key.into(), error);
        self
    }

    /// Delays downloads of `key`.
    pub fn with_key_delay(self, key: impl Into<String>, delay: Duration) -> Self {
        self.delays.insert(key.into(), delay);
        self
    }

    /// Delays every download without a key-specific delay.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.default_delay = delay;
        self
    }

    /// Number of `download` calls made for `key`.
    pub fn download_count(&self, key: &str) -> usize {
        self.downloads.get(key).map(|n| *n).unwrap_or(0)
    }

    /// Number of `download_to_memory` calls made for `key`.
    pub fn memory_read_count(&self, key: &str) -> usize {
        self.memory_reads.get(key).map(|n| *n).unwrap_or(0)
    }

    /// Total `download` calls across all keys.
    pub fn total_downloads(&self) -> usize {
        self.downloads.iter().map(|entry| *entry.value()).sum()
    }

    /// Keys that were downloaded at least once, sorted.
    pub fn downloaded_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.downloads.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        keys
    }

    async fn simulate(&self, key: &str) -> Result<Vec<u8>, FetchError> {
        let delay = self
            .delays
            .get(key)
            .map(|d| *d)
            .unwrap_or(self.default_delay);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if let Some(error) = self.failures.get(key) {
            return Err(error.clone());
        }
        self.objects
            .get(key)
            .map(|body| body.value().clone())
            .ok_or_else(|| FetchError::NotFound(key.to_string()))
    }
}

impl ObjectFetcher for MemoryObjectFetcher {
    async fn list(&self, _storage: &StorageConfig, prefix: &str) -> Result<Vec<String>, FetchError> {
        let mut keys: Vec<String> = self
            .objects
            .iter()
            .filter(|entry| entry.key().starts_with(prefix))
            .map(|entry| entry.key().clone())
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn download(
        &self,
        _storage: &StorageConfig,
        key: &str,
        local_path: &Path,
    ) -> Result<u64, FetchError> {
        *self.downloads.entry(key.to_string()).or_insert(0) += 1;
        let body = self.simulate(key).await?;
        if let Some(parent) = local_path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(local_path, &body).await?;
        Ok(body.len() as u64)
    }

    async fn download_to_memory(
        &self,
        _storage: &StorageConfig,
        key: &str,
    ) -> Result<Vec<u8>, FetchError> {
        *self.memory_reads.entry(key.to_string()).or_insert(0) += 1;
        self.simulate(key).await
    }
}
