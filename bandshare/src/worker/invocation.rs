//! Bound processing invocation handed back by a finished worker.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::coordinator::ProcessRequest;
use crate::model::{BandId, ProductId, Task};

/// A task's processing parameters, ready to be invoked once the product
/// endpoint is known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundInvocation {
    product: ProductId,
    bands: BTreeSet<BandId>,
    index: String,
    expression: String,
}

impl BoundInvocation {
    pub(crate) fn from_task(task: &Task) -> Self {
        Self {
            product: task.product().clone(),
            bands: task.bands().clone(),
            index: task.index().to_string(),
            expression: task.expression().to_string(),
        }
    }

    pub fn product(&self) -> &ProductId {
        &self.product
    }

    pub fn index(&self) -> &str {
        &self.index
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    pub fn bands(&self) -> &BTreeSet<BandId> {
        &self.bands
    }

    /// Completes the invocation with the resolved product endpoint.
    pub fn request(&self, endpoint: &Path) -> ProcessRequest {
        ProcessRequest {
            product: self.product.clone(),
            bands: self.bands.clone(),
            index: self.index.clone(),
            expression: self.expression.clone(),
            endpoint: PathBuf::from(endpoint),
        }
    }
}
