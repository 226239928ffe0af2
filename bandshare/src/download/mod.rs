//! The per-product download manager.
//!
//! Run exactly once per product, by the worker elected leader:
//!
//! ```text
//!   locate metadata ──► list product/ ──► fetch metadata doc ──► BandMap
//!                                                                  │
//!            registry.bands_for(product) ──────────────────────► plan
//!                                                                  │
//!        ┌─────────────────────────────────────────────────────────┘
//!        ▼
//!   metadata phase (parallel) ──► meta = true
//!        ▼
//!   band phase (parallel) ──► <product>:<band> = true as each lands
//! ```

mod manager;
mod plan;

pub use manager::{DownloadManager, DownloadSummary};
pub use plan::DownloadPlan;
