//! Aggregated job results.

use crate::error::TaskFailure;
use crate::model::ProductId;

/// Result of one task.
#[derive(Debug)]
pub struct TaskOutcome<T> {
    pub index: String,
    pub result: Result<T, TaskFailure>,
}

impl<T> TaskOutcome<T> {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Results of every task of a job, in submission order.
#[derive(Debug)]
pub struct JobReport<T> {
    product: ProductId,
    outcomes: Vec<TaskOutcome<T>>,
}

impl<T> JobReport<T> {
    pub fn new(product: ProductId, outcomes: Vec<TaskOutcome<T>>) -> Self {
        Self { product, outcomes }
    }

    pub fn product(&self) -> &ProductId {
        &self.product
    }

    pub fn outcomes(&self) -> &[TaskOutcome<T>] {
        &self.outcomes
    }

    pub fn into_outcomes(self) -> Vec<TaskOutcome<T>> {
        self.outcomes
    }

    /// First outcome for `index`.
    pub fn get(&self, index: &str) -> Option<&TaskOutcome<T>> {
        self.outcomes.iter().find(|o| o.index == index)
    }

    pub fn failures(&self) -> impl Iterator<Item = (&str, &TaskFailure)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().err().map(|e| (o.index.as_str(), e)))
    }

    #[inline]
    pub fn success_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    #[inline]
    pub fn failure_count(&self) -> usize {
        self.outcomes.len() - self.success_count()
    }

    #[inline]
    pub fn total_count(&self) -> usize {
        self.outcomes.len()
    }

    /// Returns true if every task succeeded.
    pub fn is_complete(&self) -> bool {
        self.outcomes.iter().all(TaskOutcome::is_success)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoordinationError;

    fn report() -> JobReport<u32> {
        JobReport::new(
            ProductId::from("P"),
            vec![
                TaskOutcome {
                    index: "ndvi".to_string(),
                    result: Ok(1),
                },
                TaskOutcome {
                    index: "ndwi".to_string(),
                    result: Err(TaskFailure::from(CoordinationError::MissingExpression {
                        index: "ndwi".to_string(),
                    })),
                },
            ],
        )
    }

    #[test]
    fn test_counts() {
        let report = report();
        assert_eq!(report.total_count(), 2);
        assert_eq!(report.success_count(), 1);
        assert_eq!(report.failure_count(), 1);
        assert!(!report.is_complete());
    }

    #[test]
    fn test_lookup_and_failures() {
        let report = report();
        assert!(report.get("ndvi").unwrap().is_success());
        assert!(report.get("evi").is_none());

        let failures: Vec<_> = report.failures().collect();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0, "ndwi");
    }

    #[test]
    fn test_empty_report_is_complete() {
        let report: JobReport<()> = JobReport::new(ProductId::from("P"), Vec::new());
        assert!(report.is_complete());
        assert_eq!(report.total_count(), 0);
    }
}
