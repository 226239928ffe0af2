//! Selection of the objects a download run fetches.

use std::collections::BTreeSet;

use crate::model::{BandId, BandMap};

/// Objects to fetch for one product, split into the two download phases.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownloadPlan {
    /// Every listed object that is not a band file.
    pub metadata: Vec<String>,
    /// Requested bands known to the band map, with their object keys.
    pub bands: Vec<(BandId, String)>,
    /// Requested bands missing from the band map.
    pub unknown: BTreeSet<BandId>,
}

impl DownloadPlan {
    /// Builds the plan from the product listing, its band map and the union
    /// of bands registered by all workers.
    ///
    /// Band files nobody requested are left out of both phases.
    pub fn build(listing: &[String], band_map: &BandMap, requested: &BTreeSet<BandId>) -> Self {
        let selection = band_map.select(requested);
        let metadata = listing
            .iter()
            .filter(|key| !band_map.is_band_object(key))
            .cloned()
            .collect();

        Self {
            metadata,
            bands: selection.selected,
            unknown: selection.unknown,
        }
    }

    /// Total number of objects the plan fetches.
    pub fn object_count(&self) -> usize {
        self.metadata.len() + self.bands.len()
    }
}
