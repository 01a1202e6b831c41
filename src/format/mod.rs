//! Container formats for Whole Slide Image files.
//!
//! - [`tiff`]: TIFF/BigTIFF directory reader producing page descriptors
//! - [`jpeg`]: header patches that make abbreviated tiles standalone
//! - [`svs`], [`philips`]: vendor metadata and series grouping
//! - [`Vendor`] / [`detect_vendor`]: dispatch over the supported vendors

pub mod detect;
pub mod jpeg;
pub mod philips;
pub mod svs;
pub mod tiff;
mod vendor;

pub use detect::detect_vendor;
pub use jpeg::{find_marker, HeaderPatch, ADOBE_COLORSPACE_FIX};
pub use philips::PhilipsMetadata;
pub use svs::SvsMetadata;
pub use vendor::Vendor;
