//! Per-product coordination state.

use std::collections::BTreeMap;
use std::fmt;

use crate::error::CoordinationError;
use crate::model::BandId;

/// Election and download phase of a product.
///
/// Replaces a separate worker counter and init flag with one variant that
/// changes in a single step.
#[derive(Debug, Clone)]
pub enum ProductPhase {
    /// Waiting for `remaining` workers to register.
    Pending { remaining: usize },
    /// The last registering worker is running the download manager.
    Leading,
    /// The download manager finished successfully.
    Ready,
    /// The download manager failed; waiting workers must fail with this error.
    Failed(CoordinationError),
}

impl ProductPhase {
    /// Returns true once the countdown has reached zero.
    pub fn is_elected(&self) -> bool {
        !matches!(self, Self::Pending { .. })
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Ready | Self::Failed(_))
    }
}

impl fmt::Display for ProductPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending { remaining } => write!(f, "pending({})", remaining),
            Self::Leading => write!(f, "leading"),
            Self::Ready => write!(f, "ready"),
            Self::Failed(_) => write!(f, "failed"),
        }
    }
}

/// Snapshot of everything the registry knows about one product.
///
/// Waiters receive this through a `watch` receiver and re-check their
/// condition against it on every change.
#[derive(Debug, Clone, Default)]
pub struct ProductBoard {
    pub(super) phase: Option<ProductPhase>,
    pub(super) bands: BTreeMap<BandId, bool>,
    pub(super) meta: Option<bool>,
}

impl ProductBoard {
    /// Current phase, or `None` before the worker countdown is initialized.
    pub fn phase(&self) -> Option<&ProductPhase> {
        self.phase.as_ref()
    }

    /// Readiness of a band; unregistered bands read as not ready.
    pub fn is_band_ready(&self, band: &BandId) -> bool {
        self.bands.get(band).copied().unwrap_or(false)
    }

    pub fn is_meta_ready(&self) -> bool {
        self.meta.unwrap_or(false)
    }

    /// Bands from `required` that are not yet ready, in iteration order.
    pub fn missing<'a, I>(&self, required: I) -> Vec<BandId>
    where
        I: IntoIterator<Item = &'a BandId>,
    {
        required
            .into_iter()
            .filter(|band| !self.is_band_ready(band))
            .cloned()
            .collect()
    }

    /// Returns true when every band in `required` is ready.
    pub fn all_ready<'a, I>(&self, required: I) -> bool
    where
        I: IntoIterator<Item = &'a BandId>,
    {
        required.into_iter().all(|band| self.is_band_ready(band))
    }

    /// The failure broadcast by the download manager, if any.
    pub fn failure(&self) -> Option<&CoordinationError> {
        match &self.phase {
            Some(ProductPhase::Failed(e)) => Some(e),
            _ => None,
        }
    }

    /// Registered band identifiers.
    pub fn bands(&self) -> impl Iterator<Item = &BandId> {
        self.bands.keys()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_band_is_not_ready() {
        let board = ProductBoard::default();
        assert!(!board.is_band_ready(&BandId::from("B04")));
        assert!(!board.is_meta_ready());
        assert!(board.phase().is_none());
    }

    #[test]
    fn test_missing_and_all_ready() {
        let mut board = ProductBoard::default();
        board.bands.insert(BandId::from("B04"), true);
        board.bands.insert(BandId::from("B07"), false);

        let required = [BandId::from("B04"), BandId::from("B07")];
        assert!(!board.all_ready(&required));
        assert_eq!(board.missing(&required), vec![BandId::from("B07")]);

        board.bands.insert(BandId::from("B07"), true);
        assert!(board.all_ready(&required));
    }

    #[test]
    fn test_phase_predicates() {
        assert!(!ProductPhase::Pending { remaining: 1 }.is_elected());
        assert!(ProductPhase::Leading.is_elected());
        assert!(!ProductPhase::Leading.is_terminal());
        assert!(ProductPhase::Ready.is_terminal());
        assert_eq!(ProductPhase::Pending { remaining: 2 }.to_string(), "pending(2)");
    }
}
