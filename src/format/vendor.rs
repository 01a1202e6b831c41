//! Scanner vendors.
//!
//! Everything that differs between vendors is dispatched from [`Vendor`]:
//! how tiles are patched into standalone JPEGs, how pages group into series,
//! which series is the label or overview, and where the base pixel spacing
//! is recorded.

use serde::Serialize;

use crate::error::FormatError;
use crate::slide::{Branch, Series};
use crate::tile::SizeMm;

use super::jpeg::HeaderPatch;
use super::philips::{self, PhilipsMetadata};
use super::svs::{self, SvsMetadata};
use super::tiff::PageDescriptor;

/// Supported scanner vendors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Vendor {
    /// Aperio SVS
    Aperio,

    /// Philips TIFF
    Philips,
}

impl Vendor {
    pub const fn name(&self) -> &'static str {
        match self {
            Vendor::Aperio => "Aperio SVS",
            Vendor::Philips => "Philips TIFF",
        }
    }

    /// How this vendor's abbreviated tiles become standalone JPEGs.
    pub const fn header_patch(&self) -> HeaderPatch {
        match self {
            Vendor::Aperio => HeaderPatch::ColorspaceFix,
            Vendor::Philips => HeaderPatch::TableInsertion,
        }
    }

    /// Group the container's pages into series.
    pub fn group_series(&self, pages: &[PageDescriptor]) -> Vec<Series> {
        match self {
            Vendor::Aperio => svs::group_series(pages),
            Vendor::Philips => philips::group_series(pages),
        }
    }

    /// Branch of a series, `None` for series with no role (thumbnails).
    ///
    /// Aperio series are recognized by name. Philips treats the baseline as
    /// the volume and recognizes associated images by the description of
    /// their first page.
    pub fn classify(&self, series: &Series, pages: &[PageDescriptor]) -> Option<Branch> {
        match self {
            Vendor::Aperio => match series.name.as_str() {
                svs::BASELINE_SERIES => Some(Branch::Volume),
                svs::LABEL_SERIES => Some(Branch::Label),
                svs::MACRO_SERIES => Some(Branch::Overview),
                _ => None,
            },
            Vendor::Philips => {
                if series.name == philips::BASELINE_SERIES {
                    return Some(Branch::Volume);
                }
                let description = series
                    .first_page()
                    .and_then(|index| pages.get(index))
                    .map(|page| page.description())
                    .unwrap_or("");
                if description.contains(philips::LABEL_SERIES) {
                    Some(Branch::Label)
                } else if description.contains(philips::MACRO_SERIES) {
                    Some(Branch::Overview)
                } else {
                    None
                }
            }
        }
    }

    /// Pixel spacing of the full-resolution level, in millimetres.
    pub fn base_pixel_spacing(&self, base_page: &PageDescriptor) -> Result<SizeMm, FormatError> {
        let description = base_page.description();
        let spacing = match self {
            Vendor::Aperio => SvsMetadata::parse(description).pixel_spacing(),
            Vendor::Philips => PhilipsMetadata::parse(description)?.pixel_spacing,
        };
        spacing.ok_or(FormatError::MissingPixelSpacing {
            vendor: self.name(),
        })
    }

    /// Pixel spacing recorded on a label or overview page, in millimetres.
    ///
    /// Only Philips records one, as `pixelsize=(x,y)` in the description.
    pub fn associated_pixel_spacing(&self, page: &PageDescriptor) -> Option<SizeMm> {
        match self {
            Vendor::Aperio => None,
            Vendor::Philips => philips::parse_associated_pixel_spacing(page.description()),
        }
    }
}
