//! Aperio SVS support.
//!
//! # SVS File Structure
//!
//! SVS files are TIFF files whose pages appear in a fixed order:
//!
//! ```text
//! page 0        full-resolution level (tiled)
//! page 1        thumbnail (stripped)
//! page 2..n     further pyramid levels (tiled)
//! page n+1..    label and macro images (stripped)
//! ```
//!
//! Tiles are abbreviated JPEG streams sharing the page's `JPEGTables`, and
//! are stored as RGB without an Adobe marker.
//!
//! # Metadata
//!
//! The first ImageDescription is a header line followed by pipe-separated
//! `key = value` pairs, including microns per pixel (`MPP`) and the
//! objective magnification (`AppMag`).

use std::collections::HashMap;

use crate::slide::Series;
use crate::tile::SizeMm;

use super::tiff::PageDescriptor;

// =============================================================================
// SVS Metadata
// =============================================================================

/// Parsed metadata from an SVS ImageDescription.
#[derive(Debug, Clone, Default)]
pub struct SvsMetadata {
    /// Microns per pixel at full resolution
    pub mpp: Option<f64>,

    /// Objective magnification (e.g., 20, 40)
    pub magnification: Option<f64>,

    /// Every key-value pair of the description
    pub properties: HashMap<String, String>,
}

impl SvsMetadata {
    /// Parse metadata from an ImageDescription string.
    ///
    /// ```text
    /// Aperio Image Library vXX.X.X
    /// width x height (tile size) JPEG/RGB Q=70|AppMag = 20|MPP = 0.5|...
    /// ```
    pub fn parse(description: &str) -> Self {
        let mut metadata = SvsMetadata::default();

        for part in description.split('|') {
            let Some((key, value)) = part.split_once('=') else {
                continue;
            };
            let (key, value) = (key.trim(), value.trim());

            match key {
                "MPP" => metadata.mpp = value.parse::<f64>().ok(),
                "AppMag" => metadata.magnification = value.parse::<f64>().ok(),
                _ => {}
            }
            metadata
                .properties
                .insert(key.to_string(), value.to_string());
        }

        metadata
    }

    /// Full-resolution pixel spacing in millimetres, when MPP is present.
    pub fn pixel_spacing(&self) -> Option<SizeMm> {
        self.mpp
            .filter(|mpp| *mpp > 0.0)
            .map(|mpp| SizeMm::new(mpp / 1000.0, mpp / 1000.0))
    }
}

// =============================================================================
// Series Grouping
// =============================================================================

pub const BASELINE_SERIES: &str = "Baseline";
pub const THUMBNAIL_SERIES: &str = "Thumbnail";
pub const LABEL_SERIES: &str = "Label";
pub const MACRO_SERIES: &str = "Macro";

/// Group SVS pages into series.
///
/// The baseline holds page 0 and every tiled page that follows it (skipping
/// an untiled thumbnail at page 1). The pages after the pyramid are named
/// from their description: `Label`, `Macro`, or their page index.
pub fn group_series(pages: &[PageDescriptor]) -> Vec<Series> {
    if pages.is_empty() {
        return Vec::new();
    }

    let mut levels = vec![vec![0]];
    let mut thumbnail = None;
    let mut next = 1;

    if pages.get(1).is_some_and(|page| !page.is_tiled()) {
        thumbnail = Some(Series::single(THUMBNAIL_SERIES, 1));
        next = 2;
    }
    while pages.get(next).is_some_and(|page| page.is_tiled()) {
        levels.push(vec![next]);
        next += 1;
    }

    let mut series = vec![Series::new(BASELINE_SERIES, levels)];
    series.extend(thumbnail);

    for page in &pages[next.min(pages.len())..] {
        let description = page.description().to_lowercase();
        let name = if description.contains("label") {
            LABEL_SERIES.to_string()
        } else if description.contains("macro") {
            MACRO_SERIES.to_string()
        } else {
            page.index.to_string()
        };
        series.push(Series::single(name, page.index));
    }

    series
}

// =============================================================================
// Tests
// =============================================================================
