//! Job submission and result aggregation.
//!
//! [`JobCoordinator::submit`] turns a [`Job`](crate::model::Job) into one
//! [`Worker`](crate::worker::Worker) per task, all running concurrently, and
//! feeds each finished worker's invocation to a [`Processor`]. The outcomes
//! come back as a [`JobReport`] in task order.

mod processor;
mod report;
mod submit;

pub use processor::{FnProcessor, ProcessRequest, Processor};
pub use report::{JobReport, TaskOutcome};
pub use submit::JobCoordinator;
