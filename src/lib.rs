//! # WSI Tiler
//!
//! Standalone JPEG tiles from Whole Slide Images.
//!
//! Scanners store each pyramid level of a slide as a grid of abbreviated
//! JPEG frames inside a TIFF container. This library locates a tile's frame
//! with range reads, patches its header so any decoder can open it, and
//! answers missing (sparse) frames with a blank tile of matching size.
//!
//! ## Features
//!
//! - **Range-based reads**: only the directory and the requested frames are
//!   fetched, from local files or S3
//! - **Vendor support**: Aperio SVS and Philips TIFF
//! - **Header patching**: JPEGTables insertion and the Adobe colorspace fix
//! - **Sparse tiles**: one blank tile per page, synthesized once on demand
//!
//! ## Architecture
//!
//! - [`io`] - Range readers for local files and S3
//! - [`mod@format`] - TIFF directory reader, vendor metadata, JPEG patches
//! - [`tile`] - Geometry, frame location, blank fill and [`TiledPage`]
//! - [`slide`] - Series grouping, branch selection and the [`Tiler`]
//! - [`config`] - CLI types
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use futures::StreamExt;
//! use wsi_tiler::{FileRangeReader, Tiler, WhiteFill};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let reader = Arc::new(FileRangeReader::open("slide.svs").await?);
//!     let tiler = Tiler::open(reader, Arc::new(WhiteFill::default())).await?;
//!
//!     let level = tiler.get_level(0, 0).await?;
//!     println!("{} tiles", level.tiled_size());
//!
//!     let mut tiles = std::pin::pin!(level.get_tiles([(0, 0), (1, 0)]));
//!     while let Some(tile) = tiles.next().await {
//!         println!("{} bytes", tile?.len());
//!     }
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod format;
pub mod io;
pub mod slide;
pub mod tile;

// Re-export commonly used types
pub use config::{BranchArg, Cli, Command, SlideLocation};
pub use error::{FormatError, IoError, TiffError, TileError};
pub use format::tiff::{read_pages, ByteOrder, PageDescriptor, TiffHeader, TiffTag};
pub use format::{detect_vendor, HeaderPatch, PhilipsMetadata, SvsMetadata, Vendor};
pub use io::{create_s3_client, parse_s3_uri, FileRangeReader, RangeReader, S3RangeReader};
pub use slide::{
    Branch, Branches, Series, SlideSummary, Tiler, DEFAULT_PAGE_CACHE_CAPACITY,
};
pub use tile::{
    BlankFill, FrameLocation, LevelReference, Size, SizeMm, TiledPage, WhiteFill,
    DEFAULT_FILL_QUALITY,
};
