//! Band identifier to remote object key mapping.

use std::collections::{BTreeMap, BTreeSet};

use super::ids::BandId;

/// Mapping from band identifier to the remote object key holding that band.
///
/// Resolved once per product from its metadata document and owned by the
/// download run that resolved it; it is never stored in the shared registry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BandMap {
    entries: BTreeMap<BandId, String>,
}

/// Outcome of intersecting a [`BandMap`] with a set of requested bands.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BandSelection {
    /// Requested bands present in the map, with their object keys.
    pub selected: Vec<(BandId, String)>,
    /// Requested bands the map does not know about.
    pub unknown: BTreeSet<BandId>,
}

impl BandMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the object key of a band, replacing any earlier entry.
    pub fn insert(&mut self, band: impl Into<BandId>, key: impl Into<String>) {
        self.entries.insert(band.into(), key.into());
    }

    /// Returns the object key of a band.
    pub fn get(&self, band: &BandId) -> Option<&str> {
        self.entries.get(band).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over `(band, key)` pairs in band order.
    pub fn iter(&self) -> impl Iterator<Item = (&BandId, &str)> {
        self.entries.iter().map(|(band, key)| (band, key.as_str()))
    }

    /// Returns true if `key` is the object of any band in the map.
    pub fn is_band_object(&self, key: &str) -> bool {
        self.entries.values().any(|k| k == key)
    }

    /// Intersects the map with a set of requested bands.
    pub fn select<'a, I>(&self, requested: I) -> BandSelection
    where
        I: IntoIterator<Item = &'a BandId>,
    {
        let mut selection = BandSelection::default();
        for band in requested {
            match self.entries.get(band) {
                Some(key) => selection.selected.push((band.clone(), key.clone())),
                None => {
                    selection.unknown.insert(band.clone());
                }
            }
        }
        selection
    }
}

impl<B: Into<BandId>, K: Into<String>> FromIterator<(B, K)> for BandMap {
    fn from_iter<T: IntoIterator<Item = (B, K)>>(iter: T) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(band, key)| (band.into(), key.into()))
                .collect(),
        }
    }
}
