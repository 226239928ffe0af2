//! Download manager implementation.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::plan::DownloadPlan;
use crate::config::CoordinationConfig;
use crate::error::CoordinationError;
use crate::fetch::{object_path, FetchError, MetadataResolver, ObjectFetcher};
use crate::model::{BandId, ProductId, StorageConfig};
use crate::registry::{RegistryKey, RegistryValue, SharedRegistry};
use crate::telemetry::{CoordinationEvent, NullTelemetrySink, TelemetrySink};

/// What a successful download run fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadSummary {
    /// Metadata-adjacent objects downloaded.
    pub metadata_objects: usize,
    /// Band objects downloaded.
    pub bands: usize,
    /// Bytes written to disk across both phases.
    pub bytes: u64,
    pub duration: Duration,
}

/// One object of a download phase.
struct FetchItem {
    key: String,
    band: Option<BandId>,
}

type FetchOutcome = (FetchItem, Result<(u64, Duration), FetchError>);

/// Resolves, plans and fetches every object a product's workers need.
///
/// The manager publishes readiness into the [`SharedRegistry`] as objects
/// land: each band flag the moment that band is on disk, the metadata flag
/// once the whole metadata phase has finished.
///
/// # Failure
///
/// Any single object failure fails the run with
/// [`CoordinationError::ObjectFetchFailure`]. The remaining downloads of
/// the current phase are still drained (and bands still published) so that
/// workers whose bands did arrive are not held back by a sibling's failure.
pub struct DownloadManager<F, R> {
    registry: Arc<SharedRegistry>,
    fetcher: Arc<F>,
    resolver: Arc<R>,
    config: CoordinationConfig,
    telemetry: Arc<dyn TelemetrySink>,
}

impl<F, R> DownloadManager<F, R>
where
    F: ObjectFetcher,
    R: MetadataResolver,
{
    pub fn new(
        registry: Arc<SharedRegistry>,
        fetcher: Arc<F>,
        resolver: Arc<R>,
        config: CoordinationConfig,
    ) -> Self {
        Self {
            registry,
            fetcher,
            resolver,
            config,
            telemetry: Arc::new(NullTelemetrySink),
        }
    }

    pub fn with_telemetry(mut self, telemetry: Arc<dyn TelemetrySink>) -> Self {
        self.telemetry = telemetry;
        self
    }

    /// Runs the download for one product.
    ///
    /// # Arguments
    ///
    /// * `product` - Product to download
    /// * `storage` - Where the product lives
    /// * `cancel` - Aborts in-flight work and returns `Cancelled`
    pub async fn run(
        &self,
        product: &ProductId,
        storage: &StorageConfig,
        cancel: &CancellationToken,
    ) -> Result<DownloadSummary, CoordinationError> {
        // Dropping the run drops its JoinSet, which aborts in-flight downloads.
        tokio::select! {
            _ = cancel.cancelled() => {
                warn!(product = %product, "Download manager cancelled");
                Err(CoordinationError::Cancelled { product: product.clone() })
            }
            result = self.execute(product, storage) => result,
        }
    }

    async fn execute(
        &self,
        product: &ProductId,
        storage: &StorageConfig,
    ) -> Result<DownloadSummary, CoordinationError> {
        let started = Instant::now();

        let metadata_key = self.resolver.locate(product)?;
        let prefix = product.prefix();
        info!(product = %product, metadata = %metadata_key, "Download manager starting");

        let listing = self
            .fetcher
            .list(storage, &prefix)
            .await
            .map_err(|cause| fetch_failure(storage, &prefix, cause))?;

        // The band map decides what to fetch, so it is resolved before any download.
        let document = self
            .fetcher
            .download_to_memory(storage, &metadata_key)
            .await
            .map_err(|cause| fetch_failure(storage, &metadata_key, cause))?;
        let band_map = self.resolver.band_map(product, &document, &listing)?;

        let requested = self.registry.bands_for(product);
        let plan = DownloadPlan::build(&listing, &band_map, &requested);
        debug!(
            product = %product,
            metadata_objects = plan.metadata.len(),
            bands = plan.bands.len(),
            unknown = plan.unknown.len(),
            "Download plan built"
        );
        if !plan.unknown.is_empty() {
            warn!(
                product = %product,
                unknown = ?plan.unknown,
                "Requested bands are not listed in the product metadata"
            );
        }

        // Metadata phase
        let phase_started = Instant::now();
        let metadata_items = plan
            .metadata
            .iter()
            .map(|key| FetchItem {
                key: key.clone(),
                band: None,
            })
            .collect();
        let metadata_bytes = self
            .fetch_phase(product, storage, metadata_items)
            .await?;
        self.registry
            .set(&RegistryKey::Meta(product.clone()), RegistryValue::Flag(true))?;
        self.telemetry.emit(CoordinationEvent::MetadataReady {
            product: product.clone(),
            objects: plan.metadata.len(),
            duration: phase_started.elapsed(),
        });

        // Band phase
        let band_items = plan
            .bands
            .iter()
            .map(|(band, key)| FetchItem {
                key: key.clone(),
                band: Some(band.clone()),
            })
            .collect();
        let band_bytes = self
            .fetch_phase(product, storage, band_items)
            .await?;

        if !plan.unknown.is_empty() {
            let unknown: Vec<&str> = plan.unknown.iter().map(BandId::as_str).collect();
            return Err(CoordinationError::MetadataResolutionFailure {
                product: product.clone(),
                reason: format!("bands not listed in metadata: {}", unknown.join(", ")),
            });
        }

        let summary = DownloadSummary {
            metadata_objects: plan.metadata.len(),
            bands: plan.bands.len(),
            bytes: metadata_bytes + band_bytes,
            duration: started.elapsed(),
        };
        self.telemetry.emit(CoordinationEvent::DownloadCompleted {
            product: product.clone(),
            bands: summary.bands,
            duration: summary.duration,
        });
        Ok(summary)
    }

    /// Downloads every item concurrently and publishes band readiness as
    /// each one completes.
    ///
    /// Returns the bytes written, or the first failure once every download
    /// of the phase has finished.
    async fn fetch_phase(
        &self,
        product: &ProductId,
        storage: &StorageConfig,
        items: Vec<FetchItem>,
    ) -> Result<u64, CoordinationError> {
        let limiter = self
            .config
            .max_concurrent_downloads()
            .map(|limit| Arc::new(Semaphore::new(limit)));
        let mut downloads: JoinSet<FetchOutcome> = JoinSet::new();

        for item in items {
            let local_path = match object_path(self.config.download_root(), &item.key) {
                Ok(path) => path,
                Err(cause) => {
                    downloads.abort_all();
                    return Err(fetch_failure(storage, &item.key, cause));
                }
            };
            let fetcher = Arc::clone(&self.fetcher);
            let storage = storage.clone();
            let limiter = limiter.clone();

            downloads.spawn(async move {
                let result = fetch_one(fetcher, storage, &item.key, local_path, limiter).await;
                (item, result)
            });
        }

        let mut bytes = 0u64;
        let mut first_error: Option<CoordinationError> = None;
        while let Some(joined) = downloads.join_next().await {
            match joined {
                Ok((item, Ok((written, elapsed)))) => {
                    bytes += written;
                    debug!(
                        product = %product,
                        key = %item.key,
                        bytes = written,
                        duration_ms = elapsed.as_millis(),
                        "Object downloaded"
                    );
                    self.telemetry.emit(CoordinationEvent::ObjectFetched {
                        product: product.clone(),
                        key: item.key.clone(),
                        bytes: written,
                        duration: elapsed,
                    });
                    if let Some(band) = item.band {
                        if let Err(e) = self.publish_band(product, band) {
                            first_error.get_or_insert(e);
                        }
                    }
                }
                Ok((item, Err(cause))) => {
                    warn!(product = %product, key = %item.key, error = %cause, "Object download failed");
                    first_error.get_or_insert(fetch_failure(storage, &item.key, cause));
                }
                Err(join_err) => {
                    warn!(product = %product, error = %join_err, "Download task panicked");
                    first_error.get_or_insert(fetch_failure(
                        storage,
                        product.as_str(),
                        FetchError::Backend(format!("download task aborted: {}", join_err)),
                    ));
                }
            }
        }

        match first_error {
            Some(error) => Err(error),
            None => Ok(bytes),
        }
    }

    fn publish_band(&self, product: &ProductId, band: BandId) -> Result<(), CoordinationError> {
        self.registry
            .set(&RegistryKey::band(product, &band), RegistryValue::Flag(true))?;
        self.telemetry.emit(CoordinationEvent::BandReady {
            product: product.clone(),
            band,
        });
        Ok(())
    }
}

async fn fetch_one<F: ObjectFetcher>(
    fetcher: Arc<F>,
    storage: StorageConfig,
    key: &str,
    local_path: PathBuf,
    limiter: Option<Arc<Semaphore>>,
) -> Result<(u64, Duration), FetchError> {
    let _permit = match limiter {
        Some(limiter) => Some(
            limiter
                .acquire_owned()
                .await
                .map_err(|_| FetchError::Backend("download limiter closed".to_string()))?,
        ),
        None => None,
    };
    let started = Instant::now();
    let written = fetcher.download(&storage, key, &local_path).await?;
    Ok((written, started.elapsed()))
}

fn fetch_failure(storage: &StorageConfig, key: &str, cause: FetchError) -> CoordinationError {
    CoordinationError::ObjectFetchFailure {
        key: key.to_string(),
        location: storage.location_of(key),
        cause,
    }
}
