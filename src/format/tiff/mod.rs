//! TIFF directory reader for Whole Slide Images.
//!
//! Handles classic TIFF and BigTIFF in both byte orders, walks the IFD
//! chain and turns each directory into a [`PageDescriptor`]. Everything
//! downstream (tile geometry, header patching, sparse tiles) works from
//! descriptors only.

mod header;
mod ifd;
mod page;
mod tags;
mod values;

pub use header::{ByteOrder, TiffHeader, BIGTIFF_HEADER_SIZE, TIFF_HEADER_SIZE};
pub use ifd::{read_ifd_chain, Ifd, IfdEntry};
pub use page::{read_pages, PageDescriptor};
pub use tags::{FieldType, TiffTag, COMPRESSION_JPEG, COMPRESSION_NONE};
pub use values::{parse_u64_array, ValueReader};
