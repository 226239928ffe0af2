//! Remote storage location settings.

/// Endpoint and bucket of the object store holding products.
///
/// Immutable once built and cheap to clone; every component that talks to
/// remote storage receives its own copy.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StorageConfig {
    endpoint: String,
    bucket: String,
}

impl StorageConfig {
    /// Creates a storage configuration.
    pub fn new(endpoint: impl Into<String>, bucket: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            bucket: bucket.into(),
        }
    }

    /// Storage endpoint (URL or `file://` root).
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Bucket or container name.
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Human-readable location of an object, used in error reports.
    pub fn location_of(&self, key: &str) -> String {
        format!(
            "{}/{}/{}",
            self.endpoint.trim_end_matches('/'),
            self.bucket,
            key
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_of() {
        let storage = StorageConfig::new("https://storage.example.org/", "sentinel-s2");
        assert_eq!(
            storage.location_of("P/MTD_MSIL1C.xml"),
            "https://storage.example.org/sentinel-s2/P/MTD_MSIL1C.xml"
        );
    }
}
