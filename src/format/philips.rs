//! Philips TIFF support.
//!
//! Philips scanners write a tiled pyramid whose first ImageDescription is an
//! XML document (`DataObject ObjectType="DPUfsImport"`) holding DICOM-style
//! attributes. Label and macro images follow as separate pages whose
//! description is simply `Label` or `Macro`.
//!
//! Tiles carry a JPEG header without tables; the page's `JPEGTables` are
//! spliced in before the start of scan.

use std::collections::HashMap;

use crate::error::FormatError;
use crate::slide::Series;
use crate::tile::SizeMm;

use super::tiff::PageDescriptor;

/// Markers that identify a Philips XML description.
pub const PHILIPS_MARKERS: [&str; 2] = ["DPUfsImport", "PIM_DP"];

pub const BASELINE_SERIES: &str = "Baseline";
pub const LABEL_SERIES: &str = "Label";
pub const MACRO_SERIES: &str = "Macro";

const PIXEL_SPACING_ATTRIBUTE: &str = "DICOM_PIXEL_SPACING";

/// Prefix of the spacing field in label and macro descriptions
const PIXEL_SIZE_FIELD: &str = "pixelsize=(";

// =============================================================================
// Metadata
// =============================================================================

/// Attributes of a Philips XML description.
#[derive(Debug, Clone, Default)]
pub struct PhilipsMetadata {
    /// Full-resolution pixel spacing in millimetres
    pub pixel_spacing: Option<SizeMm>,

    /// First text value of every `Attribute` element, by name
    pub attributes: HashMap<String, String>,
}

impl PhilipsMetadata {
    /// Parse the XML ImageDescription of the first page.
    ///
    /// Nested scanned-image objects repeat attribute names; the first
    /// occurrence in document order is kept.
    pub fn parse(xml: &str) -> Result<Self, FormatError> {
        let doc = roxmltree::Document::parse(xml).map_err(|e| FormatError::UnsupportedFormat {
            reason: format!("Philips description is not valid XML: {}", e),
        })?;

        let mut metadata = PhilipsMetadata::default();
        for node in doc.descendants() {
            if node.tag_name().name() != "Attribute" {
                continue;
            }
            let (Some(name), Some(text)) = (node.attribute("Name"), node.text()) else {
                continue;
            };
            let text = text.trim();
            if text.is_empty() || metadata.attributes.contains_key(name) {
                continue;
            }

            if name == PIXEL_SPACING_ATTRIBUTE {
                metadata.pixel_spacing = parse_pixel_spacing(text);
            }
            metadata
                .attributes
                .insert(name.to_string(), text.to_string());
        }

        Ok(metadata)
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }
}

/// Parse a `"row" "column"` spacing pair in millimetres.
///
/// Rows run along the image height, columns along its width. A single value
/// applies to both axes.
pub fn parse_pixel_spacing(text: &str) -> Option<SizeMm> {
    let values: Vec<f64> = text
        .replace('"', " ")
        .split_whitespace()
        .map(str::parse::<f64>)
        .collect::<Result<_, _>>()
        .ok()?;

    let spacing = match values.as_slice() {
        [both] => SizeMm::new(*both, *both),
        [row, column, ..] => SizeMm::new(*column, *row),
        [] => return None,
    };
    (spacing.width > 0.0 && spacing.height > 0.0).then_some(spacing)
}

/// Parse the `pixelsize=(x,y)` field of a label or macro description.
///
/// Values are micrometres per pixel, width first, optionally quoted.
pub fn parse_associated_pixel_spacing(description: &str) -> Option<SizeMm> {
    let start = description.find(PIXEL_SIZE_FIELD)? + PIXEL_SIZE_FIELD.len();
    let end = start + description[start..].find(')')?;

    let values: Vec<f64> = description[start..end]
        .replace('"', "")
        .split(',')
        .map(|v| v.trim().parse::<f64>())
        .collect::<Result<_, _>>()
        .ok()?;

    let [width, height] = values.as_slice() else {
        return None;
    };
    (*width > 0.0 && *height > 0.0).then(|| SizeMm::new(*width, *height).scale(1.0 / 1000.0))
}

// =============================================================================
// Series Grouping
// =============================================================================

fn associated_name(page: &PageDescriptor) -> Option<&'static str> {
    let description = page.description();
    if description.contains(LABEL_SERIES) {
        Some(LABEL_SERIES)
    } else if description.contains(MACRO_SERIES) {
        Some(MACRO_SERIES)
    } else {
        None
    }
}

/// Group Philips pages into series.
///
/// Page 0 and every other tiled page that is not a label or macro form the
/// baseline, one level per page from widest to narrowest. Every remaining
/// page is its own series, named `Label`, `Macro` or by its page index.
pub fn group_series(pages: &[PageDescriptor]) -> Vec<Series> {
    if pages.is_empty() {
        return Vec::new();
    }

    let (mut pyramid, rest): (Vec<&PageDescriptor>, Vec<&PageDescriptor>) = pages[1..]
        .iter()
        .partition(|page| page.is_tiled() && associated_name(page).is_none());
    pyramid.insert(0, &pages[0]);
    pyramid.sort_by(|a, b| b.image_size.width.cmp(&a.image_size.width));

    let levels = pyramid.iter().map(|page| vec![page.index]).collect();
    let mut series = vec![Series::new(BASELINE_SERIES, levels)];

    for page in rest {
        let name = associated_name(page)
            .map(str::to_string)
            .unwrap_or_else(|| page.index.to_string());
        series.push(Series::single(name, page.index));
    }

    series
}
