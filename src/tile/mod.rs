//! Tile extraction core.
//!
//! Turns a page descriptor into standalone JPEG tiles:
//!
//! ```text
//! get_tile(x, y)
//!      │
//!      ▼
//! ┌──────────────┐   present   ┌──────────────┐
//! │   locator    │────────────▶│ read + patch │
//! └──────┬───────┘             └──────────────┘
//!        │ sparse
//!        ▼
//! ┌──────────────────────────────────────────┐
//! │ blank tile (once per page)               │
//! │ first present frame → patch → BlankFill  │
//! └──────────────────────────────────────────┘
//! ```
//!
//! - [`geometry`]: tile grid, pyramid index and pixel spacing
//! - [`locator`]: tile coordinate to frame byte range, or sparse
//! - [`fill`]: the [`BlankFill`] seam and its [`WhiteFill`] default
//! - [`TiledPage`]: one page, tile access and geometry accessors

pub mod fill;
pub mod geometry;
pub mod locator;
mod page;

pub use fill::{BlankFill, WhiteFill, DEFAULT_FILL_QUALITY, MAX_FILL_QUALITY, MIN_FILL_QUALITY};
pub use geometry::{pixel_spacing, pyramid_index, tile_grid, LevelReference, Size, SizeMm};
pub use locator::{frame_index, locate, FrameLocation};
pub use page::TiledPage;
