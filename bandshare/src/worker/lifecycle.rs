//! Worker state machine.

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::barrier::Barrier;
use super::context::WorkerContext;
use super::invocation::BoundInvocation;
use super::state::{Election, WorkerState};
use crate::error::CoordinationError;
use crate::fetch::{MetadataResolver, ObjectFetcher};
use crate::model::Task;
use crate::registry::{RegistryKey, RegistryValue};
use crate::telemetry::CoordinationEvent;

/// Drives one task from registration to a bound invocation.
///
/// The product's worker countdown must already be initialized (the
/// [`JobCoordinator`](crate::coordinator::JobCoordinator) does this before
/// spawning workers).
pub struct Worker<F, R> {
    task: Task,
    ctx: Arc<WorkerContext<F, R>>,
    state: WorkerState,
}

impl<F, R> Worker<F, R>
where
    F: ObjectFetcher,
    R: MetadataResolver,
{
    pub fn new(task: Task, ctx: Arc<WorkerContext<F, R>>) -> Self {
        Self {
            task,
            ctx,
            state: WorkerState::Registering,
        }
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    pub fn task(&self) -> &Task {
        &self.task
    }

    /// Runs the worker to completion.
    ///
    /// # Errors
    ///
    /// Registration conflicts, a broadcast leader failure that left this
    /// worker's bands missing, barrier timeout or cancellation.
    pub async fn run(mut self) -> Result<BoundInvocation, CoordinationError> {
        match self.drive().await {
            Ok(invocation) => {
                self.transition(WorkerState::Done);
                Ok(invocation)
            }
            Err(e) => {
                self.transition(WorkerState::Failed);
                Err(e)
            }
        }
    }

    async fn drive(&mut self) -> Result<BoundInvocation, CoordinationError> {
        let election = self.register()?;

        self.transition(WorkerState::ElectingOrWaiting);
        if election.is_leader() {
            self.lead().await;
        }

        self.transition(WorkerState::Barrier);
        self.wait_for_bands().await?;

        Ok(BoundInvocation::from_task(&self.task))
    }

    /// Registers the task's bands and takes its turn on the countdown.
    fn register(&self) -> Result<Election, CoordinationError> {
        let registry = self.ctx.registry();
        let product = self.task.product();

        for band in self.task.bands() {
            registry.init_if_absent(&RegistryKey::band(product, band), RegistryValue::Flag(false))?;
        }
        let remaining = registry.compare_and_decrement(&RegistryKey::Workers(product.clone()))?;

        self.ctx.telemetry().emit(CoordinationEvent::WorkerRegistered {
            product: product.clone(),
            index: self.task.index().to_string(),
            bands: self.task.bands().len(),
            remaining,
        });
        Ok(Election::from_remaining(remaining))
    }

    /// Runs the download manager and records its outcome in the registry.
    ///
    /// Failure is not returned here: it is broadcast, and this worker learns
    /// about it at the barrier like everyone else.
    async fn lead(&self) {
        let product = self.task.product();
        let registry = self.ctx.registry();
        let telemetry = self.ctx.telemetry();
        let limit = self.ctx.config().leader_timeout();

        telemetry.emit(CoordinationEvent::LeaderElected {
            product: product.clone(),
            index: self.task.index().to_string(),
        });

        let manager = self.ctx.download_manager();
        let run = manager.run(product, self.ctx.storage(), self.ctx.cancellation());
        let result = match tokio::time::timeout(limit, run).await {
            Ok(result) => result,
            Err(_) => Err(CoordinationError::DownloadTimeout {
                product: product.clone(),
                waited: limit,
            }),
        };

        let recorded = match result {
            Ok(_) => registry.complete(product),
            Err(e) => {
                let failure = e.into_leader_failure(product);
                telemetry.emit(CoordinationEvent::DownloadFailed {
                    product: product.clone(),
                    error: failure.to_string(),
                });
                registry.fail(product, failure)
            }
        };
        if let Err(e) = recorded {
            warn!(product = %product, error = %e, "Could not record download outcome");
        }
    }

    async fn wait_for_bands(&self) -> Result<(), CoordinationError> {
        let product = self.task.product();
        let config = self.ctx.config();
        let barrier = Barrier::new(
            product.clone(),
            self.task.bands().iter().cloned(),
            config.barrier_timeout(),
            config.poll_interval_ms(),
        );

        match barrier.wait(self.ctx.registry(), self.ctx.cancellation()).await {
            Ok(waited) => {
                self.ctx.telemetry().emit(CoordinationEvent::BarrierReleased {
                    product: product.clone(),
                    index: self.task.index().to_string(),
                    waited,
                });
                Ok(())
            }
            Err(e) => {
                self.ctx.telemetry().emit(CoordinationEvent::BarrierFailed {
                    product: product.clone(),
                    index: self.task.index().to_string(),
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }

    fn transition(&mut self, next: WorkerState) {
        debug!(
            product = %self.task.product(),
            index = %self.task.index(),
            from = %self.state,
            to = %next,
            "Worker state change"
        );
        if next == WorkerState::Done {
            info!(product = %self.task.product(), index = %self.task.index(), "Worker ready to process");
        }
        self.state = next;
    }
}
