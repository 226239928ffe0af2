//! Job coordinator.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::processor::Processor;
use super::report::{JobReport, TaskOutcome};
use crate::config::CoordinationConfig;
use crate::error::{CoordinationError, TaskFailure};
use crate::fetch::{MetadataResolver, ObjectFetcher};
use crate::model::{Job, StorageConfig, Task};
use crate::registry::{RegistryKey, RegistryValue, SharedRegistry};
use crate::telemetry::{CoordinationEvent, NullTelemetrySink, TelemetrySink};
use crate::worker::{BoundInvocation, Worker, WorkerContext};

/// Runs jobs against a shared registry.
///
/// Every task of a job gets its own worker task; the pool is exactly as
/// large as the job, since the countdown only reaches zero once every
/// worker has registered.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use bandshare::coordinator::{FnProcessor, JobCoordinator, ProcessRequest};
/// use bandshare::error::ProcessError;
/// use bandshare::fetch::{LocalObjectFetcher, Sentinel2Resolver};
/// use bandshare::model::{Job, StorageConfig, TaskRequest};
/// use bandshare::registry::SharedRegistry;
///
/// # async fn example() {
/// let coordinator = JobCoordinator::new(
///     Arc::new(SharedRegistry::new()),
///     Arc::new(LocalObjectFetcher::new()),
///     Arc::new(Sentinel2Resolver::new()),
/// );
/// let job = Job::new("S2A_MSIL1C_20170202T090201_N0204_R007_T35SNA_20170202T090155.SAFE")
///     .with_task(TaskRequest::new(["B04", "B07"], "ndvi"))
///     .with_expression("ndvi", "(B7 - B4) / (B7 + B4)");
/// let processor = FnProcessor::new(|request: ProcessRequest| async move {
///     Ok::<_, ProcessError>(request.endpoint)
/// });
///
/// let report = coordinator
///     .submit(job, StorageConfig::new("file:///mnt/archive", "sentinel"), Arc::new(processor))
///     .await;
/// println!("{} of {} tasks succeeded", report.success_count(), report.total_count());
/// # }
/// ```
pub struct JobCoordinator<F, R> {
    registry: Arc<SharedRegistry>,
    fetcher: Arc<F>,
    resolver: Arc<R>,
    config: CoordinationConfig,
    telemetry: Arc<dyn TelemetrySink>,
    cancel: CancellationToken,
}

impl<F, R> JobCoordinator<F, R>
where
    F: ObjectFetcher,
    R: MetadataResolver,
{
    pub fn new(registry: Arc<SharedRegistry>, fetcher: Arc<F>, resolver: Arc<R>) -> Self {
        Self {
            registry,
            fetcher,
            resolver,
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

    /// Cancelling this token stops every worker and download of every job.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn registry(&self) -> &Arc<SharedRegistry> {
        &self.registry
    }

    /// Runs every task of `job` and collects their outcomes in task order.
    ///
    /// Each worker's bound invocation goes to `processor` as soon as that
    /// worker clears its barrier. A task that fails (registration, download,
    /// barrier or processing) never affects the outcome of its siblings
    /// beyond the bands they share.
    ///
    /// Submitting a product that already has a worker countdown fails every
    /// task with `RegistrationConflict`.
    ///
    /// A config whose barrier timeout is shorter than its leader timeout
    /// fails every task with `InvalidConfig` before anything is registered.
    pub async fn submit<P>(
        &self,
        job: Job,
        storage: StorageConfig,
        processor: Arc<P>,
    ) -> JobReport<P::Output>
    where
        P: Processor,
    {
        let product = job.product().clone();
        let mut slots: Vec<Option<Result<P::Output, TaskFailure>>> = Vec::with_capacity(job.len());
        let mut tasks = Vec::new();
        for (position, resolved) in job.resolve_tasks().into_iter().enumerate() {
            match resolved {
                Ok(task) => {
                    tasks.push((position, task));
                    slots.push(None);
                }
                Err(e) => {
                    warn!(product = %product, error = %e, "Task skipped");
                    slots.push(Some(Err(e.into())));
                }
            }
        }

        if !tasks.is_empty() {
            let started = self
                .config
                .validate()
                .and_then(|()| self.start_countdown(&job, tasks.len()));
            match started {
                Ok(()) => {
                    info!(product = %product, workers = tasks.len(), "Job submitted");
                    self.run_workers(&job, storage, processor, tasks, &mut slots).await;
                }
                Err(e) => {
                    error!(product = %product, error = %e, "Job rejected");
                    for (position, _) in tasks {
                        slots[position] = Some(Err(e.clone().into()));
                    }
                }
            }
        }

        let outcomes = job
            .requests()
            .iter()
            .zip(slots)
            .map(|(request, slot)| TaskOutcome {
                index: request.index().to_string(),
                result: slot.unwrap_or_else(|| {
                    Err(TaskFailure::Aborted {
                        index: request.index().to_string(),
                        reason: "worker produced no result".to_string(),
                    })
                }),
            })
            .collect();
        JobReport::new(product, outcomes)
    }

    fn start_countdown(&self, job: &Job, workers: usize) -> Result<(), CoordinationError> {
        let key = RegistryKey::Workers(job.product().clone());
        let (_, created) = self
            .registry
            .init_if_absent(&key, RegistryValue::Counter(workers))?;
        if created {
            Ok(())
        } else {
            Err(CoordinationError::RegistrationConflict {
                key: key.to_string(),
                reason: "product was already submitted".to_string(),
            })
        }
    }

    async fn run_workers<P>(
        &self,
        job: &Job,
        storage: StorageConfig,
        processor: Arc<P>,
        tasks: Vec<(usize, Task)>,
        slots: &mut [Option<Result<P::Output, TaskFailure>>],
    ) where
        P: Processor,
    {
        let ctx = Arc::new(
            WorkerContext::new(
                Arc::clone(&self.registry),
                Arc::clone(&self.fetcher),
                Arc::clone(&self.resolver),
                storage,
            )
            .with_config(self.config.clone())
            .with_telemetry(Arc::clone(&self.telemetry))
            .with_cancellation(self.cancel.clone()),
        );
        let endpoint = self
            .resolver
            .locate(job.product())
            .map(|key| self.config.download_root().join(key));

        let mut workers = JoinSet::new();
        for (position, task) in tasks {
            let worker = Worker::new(task, Arc::clone(&ctx));
            let processor = Arc::clone(&processor);
            let telemetry = Arc::clone(&self.telemetry);
            let endpoint = endpoint.clone();
            workers.spawn(async move {
                let result = match worker.run().await {
                    Ok(invocation) => {
                        process(invocation, endpoint, processor.as_ref(), telemetry.as_ref()).await
                    }
                    Err(e) => Err(TaskFailure::from(e)),
                };
                (position, result)
            });
        }

        let mut aborted = Vec::new();
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok((position, result)) => slots[position] = Some(result),
                Err(e) => {
                    let reason = if e.is_panic() {
                        "worker panicked".to_string()
                    } else {
                        e.to_string()
                    };
                    error!(product = %job.product(), reason = %reason, "Worker aborted");
                    aborted.push(reason);
                }
            }
        }

        // A join error does not say which task it was; fill the empty slots in order.
        let mut aborted = aborted.into_iter();
        for (request, slot) in job.requests().iter().zip(slots.iter_mut()) {
            if slot.is_none() {
                if let Some(reason) = aborted.next() {
                    *slot = Some(Err(TaskFailure::Aborted {
                        index: request.index().to_string(),
                        reason,
                    }));
                }
            }
        }
    }
}

async fn process<P>(
    invocation: BoundInvocation,
    endpoint: Result<PathBuf, CoordinationError>,
    processor: &P,
    telemetry: &dyn TelemetrySink,
) -> Result<P::Output, TaskFailure>
where
    P: Processor,
{
    let endpoint = endpoint?;
    let started = Instant::now();
    let result = processor.process(invocation.request(&endpoint)).await;

    telemetry.emit(CoordinationEvent::TaskProcessed {
        product: invocation.product().clone(),
        index: invocation.index().to_string(),
        succeeded: result.is_ok(),
        duration: started.elapsed(),
    });
    result.map_err(|source| TaskFailure::Process {
        index: invocation.index().to_string(),
        source,
    })
}

impl<F, R> std::fmt::Debug for JobCoordinator<F, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobCoordinator")
            .field("registry", &self.registry)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
