//! Sentinel-2 SAFE product metadata resolution.
//!
//! Product names look like
//! `S2A_MSIL1C_20170202T090201_N0204_R007_T35SNA_20170202T090155.SAFE`. The
//! metadata document sits at `<product>/MTD_<level>.xml`, where `<level>` is
//! the second underscore-separated field (`MSIL1C`). Products using the older
//! `S2A_OPER_PRD_...` naming carry a document named after the product with
//! `PRD` replaced by `MTD` and `MSIL1C` by `SAFL1C`.
//!
//! Band files are listed in the document as `<IMAGE_FILE>` entries without
//! extension, e.g. `GRANULE/L1C_T35SNA_.../IMG_DATA/T35SNA_20170202T090201_B04`.
//! The band id is the text after the last `_`, and the band's object is the
//! listed key containing the entry text.
//!
//! Level-2A documents list `<IMAGE_FILE_2A>` entries once per resolution,
//! ending in a resolution suffix (`..._B04_10m`, `..._B04_20m`). The suffix is
//! not part of the band id, and the first (finest) resolution listed for a
//! band is the one fetched.

use std::sync::OnceLock;

use regex::Regex;
use tracing::{debug, trace, warn};

use super::traits::MetadataResolver;
use crate::error::CoordinationError;
use crate::model::{BandId, BandMap, ProductId};

/// Metadata resolver for Sentinel-2 SAFE products.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sentinel2Resolver;

impl Sentinel2Resolver {
    pub fn new() -> Self {
        Self
    }
}

/// Matches `<IMAGE_FILE>` (L1C) and `<IMAGE_FILE_2A>` (L2A) entries.
///
/// Group 1: the entry text without surrounding whitespace.
fn image_file_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"<IMAGE_FILE(?:_2A)?>\s*([^<]+?)\s*</IMAGE_FILE(?:_2A)?>")
            .expect("valid image file pattern")
    })
}

/// Band id of an image entry: the last `_` field, skipping an L2A
/// resolution suffix such as `10m`.
fn band_of(entry: &str) -> Option<&str> {
    let mut fields = entry.rsplit('_');
    let last = fields.next()?;
    let is_resolution = last.len() > 1
        && last.ends_with('m')
        && last[..last.len() - 1].chars().all(|c| c.is_ascii_digit());
    let band = if is_resolution { fields.next()? } else { last };
    // An entry without any `_` has no band field at all.
    if band.is_empty() || band.len() == entry.len() {
        None
    } else {
        Some(band)
    }
}

fn resolution_failure(product: &ProductId, reason: impl Into<String>) -> CoordinationError {
    CoordinationError::MetadataResolutionFailure {
        product: product.clone(),
        reason: reason.into(),
    }
}

impl MetadataResolver for Sentinel2Resolver {
    fn locate(&self, product: &ProductId) -> Result<String, CoordinationError> {
        let name = product.as_str().trim_end_matches('/');
        let fields: Vec<&str> = name.split('_').collect();
        if fields.len() < 2 || fields[1].is_empty() {
            return Err(resolution_failure(
                product,
                "product name has no processing level field",
            ));
        }

        if fields[1] == "OPER" && fields.get(2) == Some(&"PRD") {
            let document = name
                .trim_end_matches(".SAFE")
                .replacen("_PRD_", "_MTD_", 1)
                .replacen("MSIL1C", "SAFL1C", 1);
            return Ok(format!("{}/{}.xml", name, document));
        }

        Ok(format!("{}/MTD_{}.xml", name, fields[1]))
    }

    fn band_map(
        &self,
        product: &ProductId,
        document: &[u8],
        listing: &[String],
    ) -> Result<BandMap, CoordinationError> {
        let text = std::str::from_utf8(document)
            .map_err(|e| resolution_failure(product, format!("metadata is not UTF-8: {}", e)))?;

        let mut map = BandMap::new();
        let mut entries = 0usize;
        for capture in image_file_pattern().captures_iter(text) {
            entries += 1;
            let entry = &capture[1];
            let band = match band_of(entry) {
                Some(band) => BandId::from(band),
                None => {
                    warn!(product = %product, entry = entry, "Image entry has no band suffix");
                    continue;
                }
            };
            if map.get(&band).is_some() {
                trace!(product = %product, entry = entry, "Coarser resolution of a mapped band");
                continue;
            }
            match listing.iter().find(|key| key.contains(entry)) {
                Some(key) => map.insert(band, key.clone()),
                None => warn!(product = %product, entry = entry, "No object matches image entry"),
            }
        }

        if entries == 0 {
            return Err(resolution_failure(product, "metadata lists no image files"));
        }
        debug!(product = %product, bands = map.len(), "Resolved band map");
        Ok(map)
    }
}
