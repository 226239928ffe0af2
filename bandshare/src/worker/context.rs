//! Shared context for the workers of one product.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::CoordinationConfig;
use crate::download::DownloadManager;
use crate::fetch::{MetadataResolver, ObjectFetcher};
use crate::model::StorageConfig;
use crate::registry::SharedRegistry;
use crate::telemetry::{NullTelemetrySink, TelemetrySink};

/// Everything a worker needs besides its own task.
///
/// One context is shared (behind an `Arc`) by all workers of a submission.
pub struct WorkerContext<F, R> {
    registry: Arc<SharedRegistry>,
    fetcher: Arc<F>,
    resolver: Arc<R>,
    storage: StorageConfig,
    config: CoordinationConfig,
    telemetry: Arc<dyn TelemetrySink>,
    cancel: CancellationToken,
}

impl<F, R> WorkerContext<F, R>
where
    F: ObjectFetcher,
    R: MetadataResolver,
{
    /// Creates a context with default configuration, no telemetry and a
    /// fresh cancellation token.
    pub fn new(
        registry: Arc<SharedRegistry>,
        fetcher: Arc<F>,
        resolver: Arc<R>,
        storage: StorageConfig,
    ) -> Self {
        Self {
            registry,
            fetcher,
            resolver,
            storage,
            config: CoordinationConfig::default(),
            telemetry: Arc::new(NullTelemetrySink),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_config(mut self, config: CoordinationConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_telemetry(mut self, telemetry: Arc<dyn TelemetrySink>) -> Self {
        self.telemetry = telemetry;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn registry(&self) -> &Arc<SharedRegistry> {
        &self.registry
    }

    pub fn storage(&self) -> &StorageConfig {
        &self.storage
    }

    pub fn config(&self) -> &CoordinationConfig {
        &self.config
    }

    pub fn telemetry(&self) -> &Arc<dyn TelemetrySink> {
        &self.telemetry
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Builds the download manager a leader runs.
    pub fn download_manager(&self) -> DownloadManager<F, R> {
        DownloadManager::new(
            Arc::clone(&self.registry),
            Arc::clone(&self.fetcher),
            Arc::clone(&self.resolver),
            self.config.clone(),
        )
        .with_telemetry(Arc::clone(&self.telemetry))
    }
}
