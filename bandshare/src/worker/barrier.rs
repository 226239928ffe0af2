//! Readiness barrier.

use std::ops::RangeInclusive;
use std::time::{Duration, Instant};

use rand::Rng;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::error::CoordinationError;
use crate::model::{BandId, ProductId};
use crate::registry::{ProductPhase, SharedRegistry};

/// Blocks a worker until its bands (and the product metadata) are ready.
///
/// The barrier wakes on every change to the product's registry board. A
/// jittered re-check interval backs this up, and the wait ends early on
/// deadline, cancellation, or a failure broadcast by the download manager.
///
/// Bands that are all ready release the barrier even if the download
/// manager later failed on some other band.
///
/// The metadata flag is always part of the condition, so a task with no
/// bands is released once the metadata phase is done. Metadata is published
/// before any band, so this never delays a task that does name bands.
///
/// # Deadline
///
/// While workers are still registering, the deadline runs from the start of
/// the wait. Once the product enters the leading phase the deadline restarts
/// from that moment. With a barrier timeout no shorter than the leader
/// timeout, a download that finishes within its own deadline always
/// releases its waiters; only a leader that stalls past that is reported as
/// `BarrierTimeout`.
#[derive(Debug, Clone)]
pub struct Barrier {
    product: ProductId,
    required: Vec<BandId>,
    timeout: Duration,
    poll_ms: RangeInclusive<u64>,
}

impl Barrier {
    pub fn new<I>(product: ProductId, required: I, timeout: Duration, poll_ms: RangeInclusive<u64>) -> Self
    where
        I: IntoIterator<Item = BandId>,
    {
        Self {
            product,
            required: required.into_iter().collect(),
            timeout,
            poll_ms,
        }
    }

    pub fn required(&self) -> &[BandId] {
        &self.required
    }

    /// Waits until every required band and the metadata are ready.
    ///
    /// # Returns
    ///
    /// Time spent waiting.
    ///
    /// # Errors
    ///
    /// - the download manager's broadcast failure (a `LeaderFailure`)
    /// - `BarrierTimeout` naming the bands still missing at the deadline
    /// - `Cancelled` if `cancel` fires first
    pub async fn wait(
        &self,
        registry: &SharedRegistry,
        cancel: &CancellationToken,
    ) -> Result<Duration, CoordinationError> {
        let started = Instant::now();
        let mut deadline = tokio::time::Instant::now() + self.timeout;
        let mut leading_seen = false;
        let mut board = registry.subscribe(&self.product);

        loop {
            let leading = {
                let snapshot = board.borrow_and_update();
                if snapshot.is_meta_ready() && snapshot.all_ready(&self.required) {
                    return Ok(started.elapsed());
                }
                if let Some(failure) = snapshot.failure() {
                    return Err(failure.clone());
                }
                matches!(snapshot.phase(), Some(ProductPhase::Leading))
            };

            if leading && !leading_seen {
                leading_seen = true;
                deadline = tokio::time::Instant::now() + self.timeout;
                trace!(product = %self.product, "Leader running, barrier deadline restarted");
            }

            if tokio::time::Instant::now() >= deadline {
                let missing = board.borrow().missing(&self.required);
                return Err(CoordinationError::BarrierTimeout {
                    product: self.product.clone(),
                    waited: started.elapsed(),
                    missing,
                });
            }

            let pause = jittered(&self.poll_ms);
            tokio::select! {
                _ = cancel.cancelled() => {
                    return Err(CoordinationError::Cancelled { product: self.product.clone() });
                }
                changed = board.changed() => {
                    if changed.is_err() {
                        // Registry cell gone; fall back to plain polling.
                        tokio::time::sleep(pause).await;
                    }
                }
                _ = tokio::time::sleep(pause) => {
                    trace!(product = %self.product, "Barrier poll");
                }
                _ = tokio::time::sleep_until(deadline) => {}
            }
        }
    }
}

fn jittered(range: &RangeInclusive<u64>) -> Duration {
    Duration::from_millis(rand::thread_rng().gen_range(range.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{RegistryKey, RegistryValue};
    use std::sync::Arc;

    fn product() -> ProductId {
        ProductId::from("P")
    }

    fn barrier(bands: &[&str], timeout: Duration) -> Barrier {
        Barrier::new(
            product(),
            bands.iter().map(|b| BandId::from(*b)),
            timeout,
            10..=30,
        )
    }

    fn leading_registry() -> Arc<SharedRegistry> {
        let registry = Arc::new(SharedRegistry::new());
        let workers = RegistryKey::Workers(product());
        registry.init_if_absent(&workers, RegistryValue::Counter(1)).unwrap();
        registry.compare_and_decrement(&workers).unwrap();
        registry
    }

    fn mark(registry: &SharedRegistry, band: &str) {
        registry
            .set(&RegistryKey::band(&product(), &BandId::from(band)), RegistryValue::Flag(true))
            .unwrap();
    }

    fn mark_meta(registry: &SharedRegistry) {
        registry
            .set(&RegistryKey::Meta(product()), RegistryValue::Flag(true))
            .unwrap();
    }

    #[test]
    fn test_jitter_within_bounds() {
        for _ in 0..100 {
            let pause = jittered(&(10..=30));
            assert!(pause >= Duration::from_millis(10) && pause <= Duration::from_millis(30));
        }
        assert_eq!(jittered(&(5..=5)), Duration::from_millis(5));
    }

    #[tokio::test]
    async fn test_releases_when_already_ready() {
        let registry = leading_registry();
        mark_meta(&registry);
        mark(&registry, "B04");

        let waited = barrier(&["B04"], Duration::from_secs(1))
            .wait(&registry, &CancellationToken::new())
            .await
            .unwrap();
        assert!(waited < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_releases_on_broadcast() {
        let registry = leading_registry();
        let writer = Arc::clone(&registry);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            mark_meta(&writer);
            mark(&writer, "B04");
            tokio::time::sleep(Duration::from_millis(20)).await;
            mark(&writer, "B07");
        });

        let result = barrier(&["B04", "B07"], Duration::from_secs(5))
            .wait(&registry, &CancellationToken::new())
            .await;
        assert!(result.is_ok());
    }

    /// Marks bands after `delay` and returns the instant just before the last write.
    fn mark_later(
        registry: &Arc<SharedRegistry>,
        bands: &'static [&'static str],
        delay: Duration,
    ) -> tokio::task::JoinHandle<Instant> {
        let writer = Arc::clone(registry);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            mark_meta(&writer);
            let (last, rest) = bands.split_last().unwrap();
            for band in rest {
                mark(&writer, band);
            }
            let marked = Instant::now();
            mark(&writer, last);
            marked
        })
    }

    #[tokio::test]
    async fn test_release_within_poll_interval_of_last_flag() {
        let registry = leading_registry();
        let writer = mark_later(&registry, &["B04", "B07"], Duration::from_millis(40));

        let barrier = Barrier::new(
            product(),
            [BandId::from("B04"), BandId::from("B07")],
            Duration::from_secs(5),
            50..=250,
        );
        barrier.wait(&registry, &CancellationToken::new()).await.unwrap();
        let released = Instant::now();

        let marked = writer.await.unwrap();
        assert!(released.duration_since(marked) <= Duration::from_millis(250));
    }

    #[tokio::test]
    async fn test_release_does_not_wait_for_poll() {
        let registry = leading_registry();
        let writer = mark_later(&registry, &["B04", "B07"], Duration::from_millis(40));

        // Fallback polling alone could not release within a second.
        let barrier = Barrier::new(
            product(),
            [BandId::from("B04"), BandId::from("B07")],
            Duration::from_secs(10),
            1000..=2000,
        );
        let waited = barrier.wait(&registry, &CancellationToken::new()).await.unwrap();
        let released = Instant::now();

        let marked = writer.await.unwrap();
        assert!(released.duration_since(marked) < Duration::from_millis(500));
        assert!(waited < Duration::from_millis(900));
    }

    #[tokio::test]
    async fn test_deadline_restarts_when_leader_starts() {
        let registry = Arc::new(SharedRegistry::new());
        let workers = RegistryKey::Workers(product());
        registry.init_if_absent(&workers, RegistryValue::Counter(2)).unwrap();
        registry.compare_and_decrement(&workers).unwrap();

        let writer = Arc::clone(&registry);
        tokio::spawn(async move {
            // Last worker registers late, then the download takes a while.
            tokio::time::sleep(Duration::from_millis(150)).await;
            writer.compare_and_decrement(&RegistryKey::Workers(product())).unwrap();
            tokio::time::sleep(Duration::from_millis(150)).await;
            mark_meta(&writer);
            mark(&writer, "B07");
        });

        let result = barrier(&["B07"], Duration::from_millis(200))
            .wait(&registry, &CancellationToken::new())
            .await;
        assert!(result.is_ok(), "got {:?}", result);
    }

    #[tokio::test]
    async fn test_timeout_while_registration_incomplete() {
        let registry = Arc::new(SharedRegistry::new());
        let workers = RegistryKey::Workers(product());
        registry.init_if_absent(&workers, RegistryValue::Counter(2)).unwrap();
        registry.compare_and_decrement(&workers).unwrap();

        let result = barrier(&["B04"], Duration::from_millis(50))
            .wait(&registry, &CancellationToken::new())
            .await;
        assert!(matches!(result, Err(CoordinationError::BarrierTimeout { .. })));
    }

    #[tokio::test]
    async fn test_empty_band_set_waits_only_for_metadata() {
        let registry = leading_registry();
        let empty = barrier(&[], Duration::from_millis(50));

        let result = empty.wait(&registry, &CancellationToken::new()).await;
        assert!(matches!(result, Err(CoordinationError::BarrierTimeout { .. })));

        mark_meta(&registry);
        assert!(empty.wait(&registry, &CancellationToken::new()).await.is_ok());
    }

    #[tokio::test]
    async fn test_timeout_names_missing_bands() {
        let registry = leading_registry();
        mark_meta(&registry);
        mark(&registry, "B04");

        let result = barrier(&["B04", "B07"], Duration::from_millis(50))
            .wait(&registry, &CancellationToken::new())
            .await;

        match result {
            Err(CoordinationError::BarrierTimeout { missing, .. }) => {
                assert_eq!(missing, vec![BandId::from("B07")]);
            }
            other => panic!("expected timeout, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_failure_broadcast_unblocks() {
        let registry = leading_registry();
        let writer = Arc::clone(&registry);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            let cause = CoordinationError::Cancelled { product: product() };
            writer.fail(&product(), cause.into_leader_failure(&product())).unwrap();
        });

        let result = barrier(&["B04"], Duration::from_secs(30))
            .wait(&registry, &CancellationToken::new())
            .await;
        assert!(matches!(result, Err(CoordinationError::LeaderFailure { .. })));
    }

    #[tokio::test]
    async fn test_ready_bands_win_over_failure() {
        let registry = leading_registry();
        mark_meta(&registry);
        mark(&registry, "B05");
        let cause = CoordinationError::Cancelled { product: product() };
        registry.fail(&product(), cause.into_leader_failure(&product())).unwrap();

        let result = barrier(&["B05"], Duration::from_secs(1))
            .wait(&registry, &CancellationToken::new())
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_cancellation() {
        let registry = leading_registry();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = barrier(&["B04"], Duration::from_secs(30)).wait(&registry, &cancel).await;
        assert!(matches!(result, Err(CoordinationError::Cancelled { .. })));
    }
}
