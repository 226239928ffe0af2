//! Telemetry for coordination observability.
//!
//! Workers and the download manager emit [`CoordinationEvent`]s through a
//! [`TelemetrySink`]. The core does not know how events are consumed; sinks
//! decide whether to log, count or forward them.
//!
//! # Example
//!
//! ```ignore
//! use bandshare::telemetry::{CoordinationEvent, TelemetrySink};
//!
//! struct LeaderCounter(std::sync::atomic::AtomicUsize);
//!
//! impl TelemetrySink for LeaderCounter {
//!     fn emit(&self, event: CoordinationEvent) {
//!         if let CoordinationEvent::LeaderElected { .. } = event {
//!             self.0.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
//!         }
//!     }
//! }
//! ```

use std::sync::Arc;
use std::time::Duration;

use crate::model::{BandId, ProductId};

// =============================================================================
// Coordination Events
// =============================================================================

/// Events emitted while coordinating a product.
#[derive(Clone, Debug)]
pub enum CoordinationEvent {
    // -------------------------------------------------------------------------
    // Worker Lifecycle
    // -------------------------------------------------------------------------
    /// A worker registered its bands and decremented the countdown.
    WorkerRegistered {
        product: ProductId,
        index: String,
        bands: usize,
        remaining: usize,
    },

    /// A worker observed the countdown reach zero and became leader.
    LeaderElected { product: ProductId, index: String },

    /// A worker's barrier released because all its bands are ready.
    BarrierReleased {
        product: ProductId,
        index: String,
        waited: Duration,
    },

    /// A worker's barrier ended in failure (leader failure, timeout or cancel).
    BarrierFailed {
        product: ProductId,
        index: String,
        error: String,
    },

    /// The processing callback for a task returned.
    TaskProcessed {
        product: ProductId,
        index: String,
        succeeded: bool,
        duration: Duration,
    },

    // -------------------------------------------------------------------------
    // Download Manager
    // -------------------------------------------------------------------------
    /// One object finished downloading.
    ObjectFetched {
        product: ProductId,
        key: String,
        bytes: u64,
        duration: Duration,
    },

    /// All metadata-adjacent objects are on disk.
    MetadataReady {
        product: ProductId,
        objects: usize,
        duration: Duration,
    },

    /// A band's readiness flag was published.
    BandReady { product: ProductId, band: BandId },

    /// The download manager finished successfully.
    DownloadCompleted {
        product: ProductId,
        bands: usize,
        duration: Duration,
    },

    /// The download manager failed; the failure was broadcast.
    DownloadFailed { product: ProductId, error: String },
}

impl CoordinationEvent {
    /// Product this event concerns.
    pub fn product(&self) -> &ProductId {
        match self {
            Self::WorkerRegistered { product, .. }
            | Self::LeaderElected { product, .. }
            | Self::BarrierReleased { product, .. }
            | Self::BarrierFailed { product, .. }
            | Self::TaskProcessed { product, .. }
            | Self::ObjectFetched { product, .. }
            | Self::MetadataReady { product, .. }
            | Self::BandReady { product, .. }
            | Self::DownloadCompleted { product, .. }
            | Self::DownloadFailed { product, .. } => product,
        }
    }

    /// Returns a short name for this event type.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::WorkerRegistered { .. } => "worker_registered",
            Self::LeaderElected { .. } => "leader_elected",
            Self::BarrierReleased { .. } => "barrier_released",
            Self::BarrierFailed { .. } => "barrier_failed",
            Self::TaskProcessed { .. } => "task_processed",
            Self::ObjectFetched { .. } => "object_fetched",
            Self::MetadataReady { .. } => "metadata_ready",
            Self::BandReady { .. } => "band_ready",
            Self::DownloadCompleted { .. } => "download_completed",
            Self::DownloadFailed { .. } => "download_failed",
        }
    }
}

// =============================================================================
// Telemetry Sink Trait
// =============================================================================

/// Sink for coordination events.
///
/// Events are emitted from many tasks at once, so implementations must be
/// `Send + Sync` and should return quickly.
pub trait TelemetrySink: Send + Sync {
    fn emit(&self, event: CoordinationEvent);
}

// =============================================================================
// Built-in Sink Implementations
// =============================================================================

/// No-op sink for when telemetry is disabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullTelemetrySink;

impl TelemetrySink for NullTelemetrySink {
    fn emit(&self, _event: CoordinationEvent) {}
}

/// Sink that logs events using the `tracing` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingTelemetrySink;

impl TelemetrySink for TracingTelemetrySink {
    fn emit(&self, event: CoordinationEvent) {
        match &event {
            CoordinationEvent::WorkerRegistered {
                product,
                index,
                bands,
                remaining,
            } => {
                tracing::debug!(
                    product = %product,
                    index = %index,
                    bands = bands,
                    remaining = remaining,
                    "Worker registered"
                );
            }
            CoordinationEvent::LeaderElected { product, index } => {
                tracing::info!(product = %product, index = %index, "Leader elected");
            }
            CoordinationEvent::BarrierReleased {
                product,
                index,
                waited,
            } => {
                tracing::debug!(
                    product = %product,
                    index = %index,
                    waited_ms = waited.as_millis(),
                    "Barrier released"
                );
            }
            CoordinationEvent::BarrierFailed {
                product,
                index,
                error,
            } => {
                tracing::warn!(
                    product = %product,
                    index = %index,
                    error = %error,
                    "Barrier failed"
                );
            }
            CoordinationEvent::TaskProcessed {
                product,
                index,
                succeeded,
                duration,
            } => {
                tracing::info!(
                    product = %product,
                    index = %index,
                    succeeded = succeeded,
                    duration_ms = duration.as_millis(),
                    "Task processed"
                );
            }
            CoordinationEvent::ObjectFetched {
                product,
                key,
                bytes,
                duration,
            } => {
                tracing::debug!(
                    product = %product,
                    key = %key,
                    bytes = bytes,
                    duration_ms = duration.as_millis(),
                    "Object fetched"
                );
            }
            CoordinationEvent::MetadataReady {
                product,
                objects,
                duration,
            } => {
                tracing::info!(
                    product = %product,
                    objects = objects,
                    duration_ms = duration.as_millis(),
                    "Metadata downloaded"
                );
            }
            CoordinationEvent::BandReady { product, band } => {
                tracing::info!(product = %product, band = %band, "Band downloaded");
            }
            CoordinationEvent::DownloadCompleted {
                product,
                bands,
                duration,
            } => {
                tracing::info!(
                    product = %product,
                    bands = bands,
                    duration_ms = duration.as_millis(),
                    "Download manager finished"
                );
            }
            CoordinationEvent::DownloadFailed { product, error } => {
                tracing::error!(product = %product, error = %error, "Download manager failed");
            }
        }
    }
}

/// Sink that forwards events to multiple sinks.
pub struct MultiplexTelemetrySink {
    sinks: Vec<Arc<dyn TelemetrySink>>,
}

impl MultiplexTelemetrySink {
    pub fn new(sinks: Vec<Arc<dyn TelemetrySink>>) -> Self {
        Self { sinks }
    }

    pub fn add_sink(&mut self, sink: Arc<dyn TelemetrySink>) {
        self.sinks.push(sink);
    }
}

impl TelemetrySink for MultiplexTelemetrySink {
    fn emit(&self, event: CoordinationEvent) {
        for sink in &self.sinks {
            sink.emit(event.clone());
        }
    }
}

impl std::fmt::Debug for MultiplexTelemetrySink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MultiplexTelemetrySink")
            .field("sink_count", &self.sinks.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        events: Mutex<Vec<&'static str>>,
    }

    impl TelemetrySink for RecordingSink {
        fn emit(&self, event: CoordinationEvent) {
            self.events.lock().unwrap().push(event.event_type());
        }
    }

    #[test]
    fn test_event_accessors() {
        let event = CoordinationEvent::BandReady {
            product: ProductId::from("P"),
            band: BandId::from("B04"),
        };
        assert_eq!(event.product().as_str(), "P");
        assert_eq!(event.event_type(), "band_ready");
    }

    #[test]
    fn test_multiplex_forwards_to_all() {
        let a = Arc::new(RecordingSink::default());
        let b = Arc::new(RecordingSink::default());
        let mut sink = MultiplexTelemetrySink::new(vec![a.clone() as Arc<dyn TelemetrySink>]);
        sink.add_sink(b.clone());

        sink.emit(CoordinationEvent::LeaderElected {
            product: ProductId::from("P"),
            index: "ndvi".to_string(),
        });

        assert_eq!(*a.events.lock().unwrap(), vec!["leader_elected"]);
        assert_eq!(*b.events.lock().unwrap(), vec!["leader_elected"]);
        assert!(format!("{:?}", sink).contains("sink_count: 2"));
    }

    #[test]
    fn test_builtin_sinks_accept_events() {
        let event = CoordinationEvent::DownloadFailed {
            product: ProductId::from("P"),
            error: "boom".to_string(),
        };
        NullTelemetrySink.emit(event.clone());
        TracingTelemetrySink.emit(event);
    }
}
