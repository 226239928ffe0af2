//! Core data types shared by every coordination component.
//!
//! These are plain value types: identifiers, task descriptions, the
//! band-to-object map resolved from product metadata, and storage
//! location settings. None of them perform I/O.

mod band_map;
mod ids;
mod job;
mod storage;

pub use band_map::{BandMap, BandSelection};
pub use ids::{BandId, ProductId};
pub use job::{IndexExpressions, Job, Task, TaskRequest};
pub use storage::StorageConfig;
