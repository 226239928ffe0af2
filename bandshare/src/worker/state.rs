//! Worker states and election outcome.

use std::fmt;

/// Position of a worker in its state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Registering,
    ElectingOrWaiting,
    Barrier,
    Done,
    Failed,
}

impl WorkerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Registering => "registering",
            Self::ElectingOrWaiting => "electing_or_waiting",
            Self::Barrier => "barrier",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome of a worker's registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Election {
    /// This worker brought the countdown to zero.
    Leader,
    /// Other workers are still to register (or the leader is already running).
    Follower { remaining: usize },
}

impl Election {
    pub(super) fn from_remaining(remaining: usize) -> Self {
        if remaining == 0 {
            Self::Leader
        } else {
            Self::Follower { remaining }
        }
    }

    pub fn is_leader(&self) -> bool {
        matches!(self, Self::Leader)
    }
}
