//! Filesystem-backed object fetcher.
//!
//! Objects live at `<endpoint>/<bucket>/<key>`, where the endpoint is a
//! directory path optionally written as a `file://` URL. Useful for local
//! mirrors of a bucket and for tests.

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use tokio::fs;
use tracing::{debug, trace};

use super::traits::{FetchError, ObjectFetcher};
use crate::model::StorageConfig;

/// Maps an object key to a path below `root`, one directory per `/` segment.
///
/// Keys with absolute, parent or empty segments are rejected so an object can
/// never be written outside `root`.
pub fn object_path(root: &Path, key: &str) -> Result<PathBuf, FetchError> {
    if key.is_empty() {
        return Err(invalid_key(key, "empty key"));
    }
    let mut path = root.to_path_buf();
    for segment in key.split('/') {
        let mut components = Path::new(segment).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(part)), None) => path.push(part),
            _ => return Err(invalid_key(key, "keys must be relative '/'-separated names")),
        }
    }
    Ok(path)
}

fn invalid_key(key: &str, reason: &str) -> FetchError {
    FetchError::InvalidKey {
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

/// [`ObjectFetcher`] reading objects from a local directory tree.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalObjectFetcher;

impl LocalObjectFetcher {
    pub fn new() -> Self {
        Self
    }

    fn bucket_root(storage: &StorageConfig) -> PathBuf {
        let endpoint = storage.endpoint();
        let endpoint = endpoint.strip_prefix("file://").unwrap_or(endpoint);
        Path::new(endpoint).join(storage.bucket())
    }

    fn source_path(storage: &StorageConfig, key: &str) -> Result<PathBuf, FetchError> {
        object_path(&Self::bucket_root(storage), key)
    }
}

fn map_io(key: &str, e: std::io::Error) -> FetchError {
    match e.kind() {
        ErrorKind::NotFound => FetchError::NotFound(key.to_string()),
        _ => FetchError::Io(format!("{}: {}", key, e)),
    }
}

impl ObjectFetcher for LocalObjectFetcher {
    async fn list(&self, storage: &StorageConfig, prefix: &str) -> Result<Vec<String>, FetchError> {
        let root = Self::bucket_root(storage);

        // Start the walk at the deepest directory named by the prefix.
        let (dir_part, start) = match prefix.rfind('/') {
            Some(idx) => (&prefix[..idx], object_path(&root, &prefix[..idx])?),
            None => ("", root.clone()),
        };
        trace!(root = %root.display(), prefix = prefix, "Listing local objects");

        let mut keys = Vec::new();
        let mut pending = vec![(start, dir_part.to_string())];
        while let Some((dir, key_prefix)) = pending.pop() {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(FetchError::Io(format!("{}: {}", dir.display(), e))),
            };
            while let Some(entry) = entries.next_entry().await? {
                let name = entry.file_name().to_string_lossy().into_owned();
                let key = if key_prefix.is_empty() {
                    name
                } else {
                    format!("{}/{}", key_prefix, name)
                };
                if entry.file_type().await?.is_dir() {
                    pending.push((entry.path(), key));
                } else if key.starts_with(prefix) {
                    keys.push(key);
                }
            }
        }

        keys.sort();
        debug!(prefix = prefix, count = keys.len(), "Listed local objects");
        Ok(keys)
    }

    async fn download(
        &self,
        storage: &StorageConfig,
        key: &str,
        local_path: &Path,
    ) -> Result<u64, FetchError> {
        let source = Self::source_path(storage, key)?;
        if let Some(parent) = local_path.parent() {
            // create_dir_all tolerates a sibling download creating the same parent
            fs::create_dir_all(parent)
                .await
                .map_err(|e| FetchError::Io(format!("{}: {}", parent.display(), e)))?;
        }
        fs::copy(&source, local_path)
            .await
            .map_err(|e| map_io(key, e))
    }

    async fn download_to_memory(
        &self,
        storage: &StorageConfig,
        key: &str,
    ) -> Result<Vec<u8>, FetchError> {
        let source = Self::source_path(storage, key)?;
        fs::read(&source).await.map_err(|e| map_io(key, e))
    }
}
