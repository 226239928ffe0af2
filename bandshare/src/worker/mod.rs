//! Per-task workers: registration, leader election, barrier.
//!
//! Every task of a job runs one [`Worker`] through this state machine:
//!
//! ```text
//!   Registering ──► ElectingOrWaiting ──► Barrier ──► Done
//!        │                 │                 │
//!        │      countdown hit zero?          └─► Failed (leader failure,
//!        │        yes: run DownloadManager          timeout, cancel)
//!        │        no:  go straight to Barrier
//!        ▼
//!   init band flags (first writer wins), decrement countdown
//! ```
//!
//! The worker that observes the countdown reach zero is the only one that
//! runs the [`DownloadManager`](crate::download::DownloadManager) for the
//! product. Everyone, leader included, then waits at the [`Barrier`] until
//! its bands are published.

mod barrier;
mod context;
mod invocation;
mod lifecycle;
mod state;

pub use barrier::Barrier;
pub use context::WorkerContext;
pub use invocation::BoundInvocation;
pub use lifecycle::Worker;
pub use state::{Election, WorkerState};
