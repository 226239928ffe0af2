//! Collaborator interfaces for remote storage and product metadata.
//!
//! The coordination core never talks to storage directly. It consumes two
//! seams:
//!
//! - [`ObjectFetcher`]: list, download-to-disk and download-to-memory of
//!   named objects.
//! - [`MetadataResolver`]: maps a product name to its metadata document and
//!   extracts the band map from that document.
//!
//! [`LocalObjectFetcher`] serves objects from a directory tree,
//! [`MemoryObjectFetcher`] from an in-memory map with call accounting, and
//! [`Sentinel2Resolver`] understands Sentinel-2 SAFE product naming.

mod local;
mod memory;
mod resolver;
mod traits;

pub use local::{object_path, LocalObjectFetcher};
pub use memory::MemoryObjectFetcher;
pub use resolver::Sentinel2Resolver;
pub use traits::{FetchError, MetadataResolver, ObjectFetcher};
