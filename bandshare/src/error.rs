//! Error types for product coordination.
//!
//! [`CoordinationError`] covers every way a worker can fail to obtain its
//! bands. It is `Clone` because a single download failure is broadcast to
//! every worker waiting on the product; nested causes are shared through
//! `Arc`.
//!
//! [`TaskFailure`] is what a job report carries per task: either the
//! coordination failure that kept the worker from finishing, or the
//! processing callback's own error.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::fetch::FetchError;
use crate::model::{BandId, ProductId};

/// Failures of the registration, election, download and barrier protocol.
#[derive(Debug, Clone, Error)]
pub enum CoordinationError {
    /// The registry refused an operation that the protocol should never issue.
    ///
    /// Seeing this means a caller bypassed the atomic primitives or a product
    /// was submitted twice.
    #[error("Registration conflict on '{key}': {reason}")]
    RegistrationConflict { key: String, reason: String },

    /// The metadata document could not be located or interpreted.
    #[error("Failed to resolve metadata for {product}: {reason}")]
    MetadataResolutionFailure { product: ProductId, reason: String },

    /// A single object could not be fetched.
    #[error("Failed to download {key} from {location}: {cause}")]
    ObjectFetchFailure {
        key: String,
        location: String,
        #[source]
        cause: FetchError,
    },

    /// Required bands did not become ready before the barrier deadline.
    #[error(
        "Timed out after {}ms waiting on {product} for bands [{}]",
        .waited.as_millis(),
        join_bands(.missing)
    )]
    BarrierTimeout {
        product: ProductId,
        waited: Duration,
        missing: Vec<BandId>,
    },

    /// The download manager did not finish within the leader deadline.
    #[error("Download manager for {product} exceeded {}s", .waited.as_secs())]
    DownloadTimeout { product: ProductId, waited: Duration },

    /// The download manager failed while running under the elected leader.
    #[error("Download manager failed for {product}: {cause}")]
    LeaderFailure {
        product: ProductId,
        #[source]
        cause: Arc<CoordinationError>,
    },

    /// The worker or download run was cancelled before completing.
    #[error("Coordination for {product} was cancelled")]
    Cancelled { product: ProductId },

    /// A task named an index with no expression in the job.
    #[error("No expression registered for index '{index}'")]
    MissingExpression { index: String },

    /// The coordination settings cannot guarantee a sound run.
    #[error("Invalid coordination config: {reason}")]
    InvalidConfig { reason: String },
}

impl CoordinationError {
    /// Wraps a download manager failure for broadcast to waiting workers.
    ///
    /// An error that is already a `LeaderFailure` is returned unchanged.
    pub fn into_leader_failure(self, product: &ProductId) -> Self {
        match self {
            Self::LeaderFailure { .. } => self,
            other => Self::LeaderFailure {
                product: product.clone(),
                cause: Arc::new(other),
            },
        }
    }

    /// Returns the object key of the innermost fetch failure, if any.
    pub fn failed_key(&self) -> Option<&str> {
        match self {
            Self::ObjectFetchFailure { key, .. } => Some(key),
            Self::LeaderFailure { cause, .. } => cause.failed_key(),
            _ => None,
        }
    }

    /// Returns true for barrier and download deadline failures.
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::BarrierTimeout { .. } | Self::DownloadTimeout { .. } => true,
            Self::LeaderFailure { cause, .. } => cause.is_timeout(),
            _ => false,
        }
    }

    pub fn is_leader_failure(&self) -> bool {
        matches!(self, Self::LeaderFailure { .. })
    }
}

fn join_bands(bands: &[BandId]) -> String {
    bands
        .iter()
        .map(BandId::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Error returned by a processing callback.
///
/// The core treats processing results as opaque, so this only carries a
/// message.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ProcessError {
    message: String,
}

impl ProcessError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<std::io::Error> for ProcessError {
    fn from(e: std::io::Error) -> Self {
        Self::new(e.to_string())
    }
}

/// Per-task failure reported by a job submission.
#[derive(Debug, Clone, Error)]
pub enum TaskFailure {
    /// The worker never reached its processing step.
    #[error(transparent)]
    Coordination(#[from] CoordinationError),

    /// The processing callback failed.
    #[error("Processing '{index}' failed: {source}")]
    Process { index: String, source: ProcessError },

    /// The worker task stopped unexpectedly (panic or abort).
    #[error("Worker for '{index}' aborted: {reason}")]
    Aborted { index: String, reason: String },
}

impl TaskFailure {
    /// Returns the coordination error, if that is what failed the task.
    pub fn coordination(&self) -> Option<&CoordinationError> {
        match self {
            Self::Coordination(e) => Some(e),
            _ => None,
        }
    }
}
