//! Bandshare - shared band downloads for satellite index processing
//!
//! Many processing tasks over one satellite product usually need
//! overlapping sets of spectral bands. Bandshare runs one worker per task,
//! elects exactly one of them to download the union of the requested bands
//! (plus the product metadata) once, and releases each worker as soon as
//! its own bands are on disk.
//!
//! # High-Level API
//!
//! [`coordinator::JobCoordinator`] is the entry point:
//!
//! ```ignore
//! use bandshare::coordinator::{FnProcessor, JobCoordinator};
//! use bandshare::model::{Job, TaskRequest};
//!
//! let job = Job::new(product)
//!     .with_task(TaskRequest::new(["B04", "B07"], "ndvi"))
//!     .with_task(TaskRequest::new(["B04", "B05"], "ndi45"))
//!     .with_expressions(expressions);
//!
//! let report = coordinator.submit(job, storage, Arc::new(processor)).await;
//! ```
//!
//! Lower layers can be used directly: [`registry::SharedRegistry`] for the
//! atomic readiness store, [`worker::Worker`] for a single task's lifecycle
//! and [`download::DownloadManager`] for the leader's download run.

pub mod config;
pub mod coordinator;
pub mod download;
pub mod error;
pub mod fetch;
pub mod logging;
pub mod model;
pub mod registry;
pub mod telemetry;
pub mod worker;

/// Version of the bandshare library.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
