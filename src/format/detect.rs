//! Vendor detection for Whole Slide Image files.
//!
//! The vendor is identified from the first page's ImageDescription:
//!
//! - **Aperio SVS**: contains the string "Aperio"
//! - **Philips TIFF**: an XML document mentioning `DPUfsImport` or `PIM_DP`
//!
//! Anything else is rejected as an unsupported format.

use crate::error::FormatError;

use super::philips::PHILIPS_MARKERS;
use super::vendor::Vendor;

/// Marker string for Aperio SVS format.
const APERIO_MARKER: &str = "Aperio";

/// Detect the vendor from the first page's ImageDescription.
pub fn detect_vendor(description: &str) -> Result<Vendor, FormatError> {
    if description.contains(APERIO_MARKER) {
        return Ok(Vendor::Aperio);
    }

    if description.trim_start().starts_with('<')
        && PHILIPS_MARKERS
            .iter()
            .any(|marker| description.contains(marker))
    {
        return Ok(Vendor::Philips);
    }

    let preview: String = description.chars().take(40).collect();
    Err(FormatError::UnsupportedFormat {
        reason: if preview.is_empty() {
            "first page has no ImageDescription".to_string()
        } else {
            format!("unrecognized ImageDescription {:?}", preview)
        },
    })
}
