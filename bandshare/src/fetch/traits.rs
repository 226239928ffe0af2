//! Trait definitions for storage and metadata collaborators.

use std::future::Future;
use std::path::Path;

use thiserror::Error;

use crate::error::CoordinationError;
use crate::model::{BandMap, ProductId, StorageConfig};

/// Error reported by an [`ObjectFetcher`].
///
/// Carries messages rather than source errors so it can be cloned into the
/// failure broadcast to every waiting worker.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// The object does not exist in the bucket.
    #[error("Object not found: {0}")]
    NotFound(String),

    /// The key cannot be mapped to a local path.
    #[error("Invalid object key '{key}': {reason}")]
    InvalidKey { key: String, reason: String },

    /// Local filesystem error while writing or reading the object.
    #[error("I/O error: {0}")]
    Io(String),

    /// Error reported by the storage backend.
    #[error("Storage backend error: {0}")]
    Backend(String),
}

impl From<std::io::Error> for FetchError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

/// Access to objects in remote storage.
///
/// Implementations must be safe to call concurrently; the download manager
/// issues one call per object in parallel.
pub trait ObjectFetcher: Send + Sync + 'static {
    /// Lists every object key under `prefix`.
    ///
    /// # Arguments
    ///
    /// * `storage` - Endpoint and bucket to list
    /// * `prefix` - Key prefix, usually `<product>/`
    fn list(
        &self,
        storage: &StorageConfig,
        prefix: &str,
    ) -> impl Future<Output = Result<Vec<String>, FetchError>> + Send;

    /// Downloads one object to `local_path`, creating parent directories.
    ///
    /// # Returns
    ///
    /// The number of bytes written.
    fn download(
        &self,
        storage: &StorageConfig,
        key: &str,
        local_path: &Path,
    ) -> impl Future<Output = Result<u64, FetchError>> + Send;

    /// Reads one object fully into memory.
    fn download_to_memory(
        &self,
        storage: &StorageConfig,
        key: &str,
    ) -> impl Future<Output = Result<Vec<u8>, FetchError>> + Send;
}

/// Product naming and metadata interpretation.
///
/// Both operations are pure; the download manager performs the I/O.
pub trait MetadataResolver: Send + Sync + 'static {
    /// Returns the object key of the product's metadata document.
    fn locate(&self, product: &ProductId) -> Result<String, CoordinationError>;

    /// Extracts the band map from a fetched metadata document.
    ///
    /// # Arguments
    ///
    /// * `product` - Product the document belongs to
    /// * `document` - Raw metadata document bytes
    /// * `listing` - Every object key under the product prefix
    fn band_map(
        &self,
        product: &ProductId,
        document: &[u8],
        listing: &[String],
    ) -> Result<BandMap, CoordinationError>;
}
