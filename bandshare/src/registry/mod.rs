//! Shared readiness registry.
//!
//! The registry is the only mutable state shared between workers of a job.
//! It holds, per product:
//!
//! ```text
//!   ProductBoard
//!   ├── phase:  Pending(n) → Leading → Ready
//!   │                              └──→ Failed(err)
//!   ├── bands:  B04=false, B05=true, B07=false ...   (monotone flags)
//!   └── meta:   false → true                         (monotone flag)
//! ```
//!
//! Each board sits behind a `tokio::sync::watch` channel. Every mutation is a
//! single closure run under the channel's lock, which makes the countdown's
//! decrement-and-compare linearizable, and every readiness change wakes the
//! workers parked on the product's barrier.
//!
//! The string-keyed contract (`get`, `set`, `compare_and_decrement`,
//! `init_if_absent`) is expressed over the structured [`RegistryKey`], whose
//! display form is the familiar `<product>:<band>`, `<product>:nbproc`,
//! `<product>:init` and `<product>:meta`.

mod board;
mod key;
mod shared;

pub use board::{ProductBoard, ProductPhase};
pub use key::{RegistryKey, RegistryValue};
pub use shared::SharedRegistry;
