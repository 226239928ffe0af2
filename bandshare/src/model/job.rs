//! Job submissions and the per-worker tasks derived from them.

use std::collections::{BTreeSet, HashMap};

use super::ids::{BandId, ProductId};
use crate::error::CoordinationError;

/// Map from index name (e.g. `ndvi`) to its band-math expression text.
pub type IndexExpressions = HashMap<String, String>;

/// A caller's request for one worker: the bands it needs and the index to compute.
///
/// The expression text is not part of the request; it is looked up in the
/// job's [`IndexExpressions`] when the job is resolved into [`Task`]s.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskRequest {
    bands: BTreeSet<BandId>,
    index: String,
}

impl TaskRequest {
    /// Creates a request for the given bands and index name.
    ///
    /// Duplicate band identifiers collapse into one.
    pub fn new<I, B>(bands: I, index: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = B>,
        B: Into<BandId>,
    {
        Self {
            bands: bands.into_iter().map(Into::into).collect(),
            index: index.into(),
        }
    }

    pub fn bands(&self) -> &BTreeSet<BandId> {
        &self.bands
    }

    pub fn index(&self) -> &str {
        &self.index
    }
}

/// Everything one worker needs: product, required bands, index name and expression.
///
/// Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    product: ProductId,
    bands: BTreeSet<BandId>,
    index: String,
    expression: String,
}

impl Task {
    /// Creates a task directly.
    pub fn new<I, B>(
        product: ProductId,
        bands: I,
        index: impl Into<String>,
        expression: impl Into<String>,
    ) -> Self
    where
        I: IntoIterator<Item = B>,
        B: Into<BandId>,
    {
        Self {
            product,
            bands: bands.into_iter().map(Into::into).collect(),
            index: index.into(),
            expression: expression.into(),
        }
    }

    pub fn product(&self) -> &ProductId {
        &self.product
    }

    pub fn bands(&self) -> &BTreeSet<BandId> {
        &self.bands
    }

    pub fn index(&self) -> &str {
        &self.index
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }
}

/// A job submission: one product, an ordered list of task requests and a
/// shared index-to-expression map.
///
/// # Example
///
/// ```
/// use bandshare::model::{Job, TaskRequest};
///
/// let job = Job::new("P")
///     .with_task(TaskRequest::new(["B04", "B07"], "ndvi"))
///     .with_task(TaskRequest::new(["B04", "B05"], "ndi45"))
///     .with_expression("ndvi", "(B7 + B4) != 0 ? (B7 - B4) / (B7 + B4) : -2")
///     .with_expression("ndi45", "(B5 + B4) != 0 ? (B5 - B4) / (B5 + B4) : -2");
///
/// assert_eq!(job.len(), 2);
/// assert!(job.resolve_tasks().iter().all(|t| t.is_ok()));
/// ```
#[derive(Debug, Clone)]
pub struct Job {
    product: ProductId,
    requests: Vec<TaskRequest>,
    expressions: IndexExpressions,
}

impl Job {
    /// Creates an empty job for a product.
    pub fn new(product: impl Into<ProductId>) -> Self {
        Self {
            product: product.into(),
            requests: Vec::new(),
            expressions: IndexExpressions::new(),
        }
    }

    /// Appends a task request. Order is preserved in the job report.
    pub fn with_task(mut self, request: TaskRequest) -> Self {
        self.requests.push(request);
        self
    }

    /// Registers the expression text for an index name.
    pub fn with_expression(mut self, index: impl Into<String>, expression: impl Into<String>) -> Self {
        self.expressions.insert(index.into(), expression.into());
        self
    }

    /// Replaces the whole index-to-expression map.
    pub fn with_expressions(mut self, expressions: IndexExpressions) -> Self {
        self.expressions = expressions;
        self
    }

    pub fn product(&self) -> &ProductId {
        &self.product
    }

    pub fn requests(&self) -> &[TaskRequest] {
        &self.requests
    }

    pub fn expressions(&self) -> &IndexExpressions {
        &self.expressions
    }

    /// Number of task requests.
    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    /// Binds every request to its expression, in submission order.
    ///
    /// A request whose index has no expression yields
    /// [`CoordinationError::MissingExpression`] in its slot.
    pub fn resolve_tasks(&self) -> Vec<Result<Task, CoordinationError>> {
        self.requests
            .iter()
            .map(|request| match self.expressions.get(request.index()) {
                Some(expression) => Ok(Task {
                    product: self.product.clone(),
                    bands: request.bands.clone(),
                    index: request.index.clone(),
                    expression: expression.clone(),
                }),
                None => Err(CoordinationError::MissingExpression {
                    index: request.index.clone(),
                }),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_deduplicates_bands() {
        let request = TaskRequest::new(["B04", "B04", "B07"], "ndvi");
        assert_eq!(request.bands().len(), 2);
    }

    #[test]
    fn test_resolve_tasks_binds_expressions() {
        let job = Job::new("P")
            .with_task(TaskRequest::new(["B04", "B07"], "ndvi"))
            .with_expression("ndvi", "B7 - B4");

        let tasks = job.resolve_tasks();
        let task = tasks[0].as_ref().unwrap();
        assert_eq!(task.product().as_str(), "P");
        assert_eq!(task.index(), "ndvi");
        assert_eq!(task.expression(), "B7 - B4");
        assert!(task.bands().contains(&BandId::from("B07")));
    }

    #[test]
    fn test_resolve_tasks_missing_expression() {
        let job = Job::new("P")
            .with_task(TaskRequest::new(["B03"], "gndvi"))
            .with_task(TaskRequest::new(["B04"], "ndvi"))
            .with_expression("ndvi", "B4");

        let tasks = job.resolve_tasks();
        assert!(matches!(
            &tasks[0],
            Err(CoordinationError::MissingExpression { index }) if index == "gndvi"
        ));
        assert!(tasks[1].is_ok());
    }
}
