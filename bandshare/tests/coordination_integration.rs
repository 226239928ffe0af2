//! Integration tests for job coordination.
//!
//! These tests drive complete jobs through the coordinator:
//! - One leader per product, one download per object
//! - Band failures isolated to the tasks that need the band
//! - Barrier and leader deadlines, cancellation
//! - Processing callback failures
//! - Submission conflicts and missing expressions
//! - End-to-end run against a local directory archive

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bandshare::config::CoordinationConfig;
use bandshare::coordinator::{FnProcessor, JobCoordinator, ProcessRequest, Processor};
use bandshare::error::{CoordinationError, ProcessError, TaskFailure};
use bandshare::fetch::{FetchError, LocalObjectFetcher, MemoryObjectFetcher, Sentinel2Resolver};
use bandshare::model::{BandId, Job, ProductId, StorageConfig, TaskRequest};
use bandshare::registry::{ProductPhase, RegistryKey, SharedRegistry};
use bandshare::telemetry::{CoordinationEvent, TelemetrySink};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

// =============================================================================
// Test Helpers
// =============================================================================

const PRODUCT: &str = "S2A_MSIL1C_20170202T090201_N0204_R007_T35SNA_20170202T090155.SAFE";
const GRANULE: &str = "GRANULE/L1C_T35SNA_A008421_20170202T090155/IMG_DATA";
const ALL_BANDS: [&str; 5] = ["B03", "B04", "B05", "B07", "B08"];

fn band_key(band: &str) -> String {
    format!("{}/{}/T35SNA_20170202T090201_{}.jp2", PRODUCT, GRANULE, band)
}

fn metadata_key() -> String {
    format!("{}/MTD_MSIL1C.xml", PRODUCT)
}

fn metadata_doc() -> String {
    let entries: String = ALL_BANDS
        .iter()
        .map(|b| format!("<IMAGE_FILE>{}/T35SNA_20170202T090201_{}</IMAGE_FILE>\n", GRANULE, b))
        .collect();
    format!(
        "<n1:Level-1C_User_Product><Granule_List><Granule>\n{}</Granule></Granule_List></n1:Level-1C_User_Product>",
        entries
    )
}

fn archive() -> MemoryObjectFetcher {
    let mut fetcher = MemoryObjectFetcher::new()
        .with_object(metadata_key(), metadata_doc())
        .with_object(format!("{}/manifest.safe", PRODUCT), "<manifest/>");
    for band in ALL_BANDS {
        fetcher = fetcher.with_object(band_key(band), format!("pixels of {}", band));
    }
    fetcher
}

fn storage() -> StorageConfig {
    StorageConfig::new("memory://", "sentinel")
}

fn ndvi_ndi45_job() -> Job {
    Job::new(PRODUCT)
        .with_task(TaskRequest::new(["B04", "B07"], "ndvi"))
        .with_task(TaskRequest::new(["B04", "B05"], "ndi45"))
        .with_expression("ndvi", "(B7 + B4) != 0 ? (B7 - B4) / (B7 + B4) : -2")
        .with_expression("ndi45", "(B5 + B4) != 0 ? (B5 - B4) / (B5 + B4) : -2")
}

/// Telemetry sink that keeps every event.
#[derive(Default)]
struct RecordingSink {
    events: Mutex<Vec<CoordinationEvent>>,
}

impl RecordingSink {
    fn count(&self, event_type: &str) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.event_type() == event_type)
            .count()
    }
}

impl TelemetrySink for RecordingSink {
    fn emit(&self, event: CoordinationEvent) {
        self.events.lock().unwrap().push(event);
    }
}

struct Harness {
    coordinator: JobCoordinator<MemoryObjectFetcher, Sentinel2Resolver>,
    fetcher: Arc<MemoryObjectFetcher>,
    sink: Arc<RecordingSink>,
    _root: TempDir,
}

fn harness(fetcher: MemoryObjectFetcher, config: CoordinationConfig) -> Harness {
    let root = TempDir::new().unwrap();
    let fetcher = Arc::new(fetcher);
    let sink = Arc::new(RecordingSink::default());
    let coordinator = JobCoordinator::new(
        Arc::new(SharedRegistry::new()),
        Arc::clone(&fetcher),
        Arc::new(Sentinel2Resolver::new()),
    )
    .with_config(config.with_download_root(root.path()))
    .with_telemetry(sink.clone());
    Harness {
        coordinator,
        fetcher,
        sink,
        _root: root,
    }
}

/// Processor that returns the index name it was called with.
struct EchoIndex;

impl Processor for EchoIndex {
    type Output = String;

    async fn process(&self, request: ProcessRequest) -> Result<String, ProcessError> {
        Ok(request.index)
    }
}

fn echo_index() -> Arc<EchoIndex> {
    Arc::new(EchoIndex)
}

// =============================================================================
// Shared download
// =============================================================================

#[tokio::test]
async fn test_overlapping_tasks_share_one_download() {
    let h = harness(archive(), CoordinationConfig::new());

    let report = h
        .coordinator
        .submit(ndvi_ndi45_job(), storage(), echo_index())
        .await;

    assert!(report.is_complete(), "failures: {:?}", report.failures().collect::<Vec<_>>());
    assert_eq!(report.outcomes()[0].result.as_ref().unwrap(), "ndvi");
    assert_eq!(report.outcomes()[1].result.as_ref().unwrap(), "ndi45");

    for band in ["B04", "B05", "B07"] {
        assert_eq!(h.fetcher.download_count(&band_key(band)), 1, "band {}", band);
    }
    for band in ["B03", "B08"] {
        assert_eq!(h.fetcher.download_count(&band_key(band)), 0, "band {}", band);
    }
    assert_eq!(h.fetcher.memory_read_count(&metadata_key()), 1);
    assert_eq!(h.fetcher.download_count(&metadata_key()), 1);
    assert_eq!(h.sink.count("leader_elected"), 1);
    assert_eq!(h.sink.count("task_processed"), 2);
}

#[tokio::test]
async fn test_exactly_one_leader_among_many_workers() {
    let h = harness(archive().with_delay(Duration::from_millis(5)), CoordinationConfig::new());

    let mut job = Job::new(PRODUCT);
    for i in 0..16 {
        let bands = [ALL_BANDS[i % 5], ALL_BANDS[(i * 3 + 1) % 5]];
        let index = format!("index{}", i);
        job = job
            .with_task(TaskRequest::new(bands, index.clone()))
            .with_expression(index, "B4");
    }

    let report = h.coordinator.submit(job, storage(), echo_index()).await;

    assert_eq!(report.success_count(), 16);
    assert_eq!(h.sink.count("leader_elected"), 1);
    assert_eq!(h.sink.count("worker_registered"), 16);

    for key in h.fetcher.downloaded_keys() {
        assert_eq!(h.fetcher.download_count(&key), 1, "{} downloaded twice", key);
    }
    assert_eq!(h.fetcher.total_downloads(), ALL_BANDS.len() + 2);
}

// =============================================================================
// Failures
// =============================================================================

#[tokio::test]
async fn test_band_failure_only_fails_tasks_needing_it() {
    let fetcher = archive().with_failure(band_key("B07"), FetchError::Backend("503 Slow Down".into()));
    let h = harness(fetcher, CoordinationConfig::new());

    let job = ndvi_ndi45_job()
        .with_task(TaskRequest::new(["B05"], "b5only"))
        .with_expression("b5only", "B5");
    let report = h.coordinator.submit(job, storage(), echo_index()).await;

    let ndvi = report.get("ndvi").unwrap();
    match &ndvi.result {
        Err(TaskFailure::Coordination(err)) => {
            assert!(err.is_leader_failure());
            assert_eq!(err.failed_key(), Some(band_key("B07").as_str()));
        }
        other => panic!("expected leader failure, got {:?}", other),
    }
    assert!(report.get("ndi45").unwrap().is_success());
    assert!(report.get("b5only").unwrap().is_success());
    assert_eq!(h.sink.count("download_failed"), 1);
}

#[tokio::test]
async fn test_metadata_failure_fails_every_task() {
    let fetcher = archive().with_failure(
        format!("{}/manifest.safe", PRODUCT),
        FetchError::Io("connection reset".into()),
    );
    let h = harness(fetcher, CoordinationConfig::new());

    let report = h.coordinator.submit(ndvi_ndi45_job(), storage(), echo_index()).await;

    assert_eq!(report.failure_count(), 2);
    assert_eq!(h.fetcher.download_count(&band_key("B04")), 0);
}

#[tokio::test]
async fn test_followers_wait_for_leader_within_its_deadline() {
    let fetcher = archive().with_key_delay(band_key("B07"), Duration::from_millis(150));
    let config = CoordinationConfig::new()
        .with_barrier_timeout(Duration::from_millis(200))
        .with_leader_timeout(Duration::from_millis(200))
        .with_poll_interval(Duration::from_millis(10), Duration::from_millis(20));
    let h = harness(fetcher, config);

    let job = Job::new(PRODUCT)
        .with_task(TaskRequest::new(["B04", "B07"], "ndvi"))
        .with_task(TaskRequest::new(["B04", "B07"], "ndvi2"))
        .with_expression("ndvi", "B7 - B4")
        .with_expression("ndvi2", "B7 - B4");
    let report = h.coordinator.submit(job, storage(), echo_index()).await;

    assert!(report.is_complete(), "failures: {:?}", report.failures().collect::<Vec<_>>());
    assert!(matches!(
        h.coordinator.registry().phase(&ProductId::from(PRODUCT)),
        Some(ProductPhase::Ready)
    ));
}

#[tokio::test]
async fn test_stalled_leader_fails_every_waiter() {
    let fetcher = archive().with_key_delay(band_key("B07"), Duration::from_secs(5));
    let config = CoordinationConfig::new()
        .with_barrier_timeout(Duration::from_millis(150))
        .with_leader_timeout(Duration::from_millis(100))
        .with_poll_interval(Duration::from_millis(10), Duration::from_millis(20));
    let h = harness(fetcher, config);

    let mut job = Job::new(PRODUCT);
    for i in 0..3 {
        let index = format!("b7_{}", i);
        job = job
            .with_task(TaskRequest::new(["B07"], index.clone()))
            .with_expression(index, "B7");
    }
    let started = std::time::Instant::now();
    let report = h.coordinator.submit(job, storage(), echo_index()).await;

    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(report.failure_count(), 3);
    for (_, failure) in report.failures() {
        let err = failure.coordination().expect("coordination failure");
        assert!(err.is_timeout(), "expected a timeout, got {:?}", err);
    }
}

#[tokio::test]
async fn test_barrier_shorter_than_leader_is_rejected() {
    let config = CoordinationConfig::new()
        .with_barrier_timeout(Duration::from_millis(100))
        .with_leader_timeout(Duration::from_millis(200));
    let h = harness(archive(), config);

    let report = h.coordinator.submit(ndvi_ndi45_job(), storage(), echo_index()).await;

    assert_eq!(report.failure_count(), 2);
    assert!(report.failures().all(|(_, f)| matches!(
        f.coordination(),
        Some(CoordinationError::InvalidConfig { .. })
    )));
    assert_eq!(h.fetcher.total_downloads(), 0);
    assert!(h.coordinator.registry().phase(&ProductId::from(PRODUCT)).is_none());
}

#[tokio::test]
async fn test_cancellation_stops_every_worker() {
    let cancel = CancellationToken::new();
    let fetcher = archive().with_delay(Duration::from_secs(5));
    let h = harness(fetcher, CoordinationConfig::new());
    let coordinator = h.coordinator.with_cancellation(cancel.clone());

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let started = std::time::Instant::now();
    let report = coordinator.submit(ndvi_ndi45_job(), storage(), echo_index()).await;

    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(report.failure_count(), 2);
}

#[tokio::test]
async fn test_processing_failure_is_isolated() {
    let h = harness(archive(), CoordinationConfig::new());
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let processor = FnProcessor::new(move |request: ProcessRequest| {
        counter.fetch_add(1, Ordering::SeqCst);
        async move {
            if request.index == "ndi45" {
                Err(ProcessError::new("expression evaluation failed"))
            } else {
                Ok(request.expression)
            }
        }
    });

    let report = h
        .coordinator
        .submit(ndvi_ndi45_job(), storage(), Arc::new(processor))
        .await;

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert!(report.get("ndvi").unwrap().is_success());
    assert!(matches!(
        report.get("ndi45").unwrap().result,
        Err(TaskFailure::Process { .. })
    ));
}

// =============================================================================
// Submission
// =============================================================================

#[tokio::test]
async fn test_resubmitting_product_is_conflict() {
    let h = harness(archive(), CoordinationConfig::new());

    let first = h.coordinator.submit(ndvi_ndi45_job(), storage(), echo_index()).await;
    assert!(first.is_complete());

    let second = h.coordinator.submit(ndvi_ndi45_job(), storage(), echo_index()).await;
    assert_eq!(second.failure_count(), 2);
    assert!(second.failures().all(|(_, f)| matches!(
        f.coordination(),
        Some(CoordinationError::RegistrationConflict { .. })
    )));
    assert_eq!(h.fetcher.download_count(&band_key("B04")), 1);
}

#[tokio::test]
async fn test_missing_expression_skips_only_that_task() {
    let h = harness(archive(), CoordinationConfig::new());
    let job = ndvi_ndi45_job().with_task(TaskRequest::new(["B08"], "evi"));

    let report = h.coordinator.submit(job, storage(), echo_index()).await;

    assert_eq!(report.total_count(), 3);
    assert_eq!(report.success_count(), 2);
    assert!(matches!(
        report.get("evi").unwrap().result,
        Err(TaskFailure::Coordination(CoordinationError::MissingExpression { .. }))
    ));
    // The skipped task never registered, so its band was not fetched.
    assert_eq!(h.fetcher.download_count(&band_key("B08")), 0);
    assert!(h
        .coordinator
        .registry()
        .get(&RegistryKey::band(&ProductId::from(PRODUCT), &BandId::from("B08")))
        .is_none());
}

#[tokio::test]
async fn test_empty_job() {
    let h = harness(archive(), CoordinationConfig::new());
    let report = h.coordinator.submit(Job::new(PRODUCT), storage(), echo_index()).await;
    assert_eq!(report.total_count(), 0);
    assert_eq!(h.fetcher.total_downloads(), 0);
}

// =============================================================================
// Local archive
// =============================================================================

#[tokio::test]
async fn test_end_to_end_local_archive() {
    let archive_dir = TempDir::new().unwrap();
    let bucket = archive_dir.path().join("sentinel");
    let write = |key: &str, body: &str| {
        let path = bucket.join(key);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, body).unwrap();
    };
    write(&metadata_key(), &metadata_doc());
    write(&format!("{}/manifest.safe", PRODUCT), "<manifest/>");
    for band in ALL_BANDS {
        write(&band_key(band), band);
    }

    let output = TempDir::new().unwrap();
    let coordinator = JobCoordinator::new(
        Arc::new(SharedRegistry::new()),
        Arc::new(LocalObjectFetcher::new()),
        Arc::new(Sentinel2Resolver::new()),
    )
    .with_config(CoordinationConfig::new().with_download_root(output.path()));

    let processor = FnProcessor::new(|request: ProcessRequest| async move {
        let document = tokio::fs::read_to_string(&request.endpoint).await?;
        Ok::<_, ProcessError>((request.index, document.len()))
    });
    let storage = StorageConfig::new(format!("file://{}", archive_dir.path().display()), "sentinel");

    let report = coordinator
        .submit(ndvi_ndi45_job(), storage, Arc::new(processor))
        .await;

    assert!(report.is_complete(), "failures: {:?}", report.failures().collect::<Vec<_>>());
    for outcome in report.outcomes() {
        let (_, len) = outcome.result.as_ref().unwrap();
        assert_eq!(*len, metadata_doc().len());
    }
    for band in ["B04", "B05", "B07"] {
        assert!(output.path().join(band_key(band)).exists(), "band {}", band);
    }
    assert!(!output.path().join(band_key("B03")).exists());
}
