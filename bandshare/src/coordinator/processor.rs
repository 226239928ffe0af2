//! Per-task processing callback.

use std::collections::BTreeSet;
use std::future::Future;
use std::path::PathBuf;

use crate::error::ProcessError;
use crate::model::{BandId, ProductId};

/// Everything the processing step of one task needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessRequest {
    pub product: ProductId,
    pub bands: BTreeSet<BandId>,
    /// Index name, e.g. `ndvi`.
    pub index: String,
    /// Band-math expression for the index.
    pub expression: String,
    /// Local path of the product's metadata document.
    pub endpoint: PathBuf,
}

/// Processing step run once a worker's bands are on disk.
///
/// Called concurrently from every worker task, each time with a different
/// request.
pub trait Processor: Send + Sync + 'static {
    type Output: Send + 'static;

    fn process(
        &self,
        request: ProcessRequest,
    ) -> impl Future<Output = Result<Self::Output, ProcessError>> + Send;
}

/// Adapts an async closure into a [`Processor`].
///
/// # Example
///
/// ```
/// use bandshare::coordinator::{FnProcessor, ProcessRequest};
/// use bandshare::error::ProcessError;
///
/// let processor = FnProcessor::new(|request: ProcessRequest| async move {
///     Ok::<_, ProcessError>(format!("{}.tif", request.index))
/// });
/// # let _ = processor;
/// ```
pub struct FnProcessor<Func> {
    func: Func,
}

impl<Func> FnProcessor<Func> {
    pub fn new(func: Func) -> Self {
        Self { func }
    }
}

impl<Func, Fut, T> Processor for FnProcessor<Func>
where
    Func: Fn(ProcessRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, ProcessError>> + Send,
    T: Send + 'static,
{
    type Output = T;

    fn process(&self, request: ProcessRequest) -> impl Future<Output = Result<T, ProcessError>> + Send {
        (self.func)(request)
    }
}

impl<Func> std::fmt::Debug for FnProcessor<Func> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnProcessor").finish_non_exhaustive()
    }
}
