//! Slide layer.
//!
//! Sits between the container formats and tile access:
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │                 Tiler                   │
//! │  (branch selection, page LRU cache)     │
//! └────────────────────┬────────────────────┘
//!                      │
//!          ┌───────────┴───────────┐
//!          ▼                       ▼
//! ┌─────────────────┐    ┌─────────────────────┐
//! │  Series/Branch  │    │     TiledPage       │
//! │ (vendor rules)  │    │ (patch, blank fill) │
//! └─────────────────┘    └─────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use wsi_tiler::io::FileRangeReader;
//! use wsi_tiler::slide::Tiler;
//! use wsi_tiler::tile::WhiteFill;
//!
//! let reader = Arc::new(FileRangeReader::open("slide.svs").await?);
//! let tiler = Tiler::open(reader, Arc::new(WhiteFill::default())).await?;
//!
//! // Top-left tile of the full-resolution level
//! let tile = tiler.get_level(0, 0).await?.get_tile(0, 0).await?;
//! ```

mod series;
mod summary;
mod tiler;

pub use series::{classify_series, Branch, Branches, Series};
pub use summary::{PageSummary, SeriesSummary, SlideSummary};
pub use tiler::{Tiler, DEFAULT_PAGE_CACHE_CAPACITY};
