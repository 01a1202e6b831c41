//! Pyramid and tile grid geometry.
//!
//! Pure functions relating a page to the base level of its pyramid: how many
//! tiles it has, how many halvings separate it from the base, and the
//! physical size of one of its pixels.

use std::fmt;

use serde::Serialize;

use crate::error::TileError;

/// Width and height in pixels (or in tiles, for a tile grid).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub const ZERO: Size = Size::new(0, 0);

    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Number of cells, for a tile grid the number of frames it addresses.
    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Physical size of one pixel in millimetres.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct SizeMm {
    pub width: f64,
    pub height: f64,
}

impl SizeMm {
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Multiply both axes by `factor`.
    pub fn scale(&self, factor: f64) -> Self {
        Self::new(self.width * factor, self.height * factor)
    }

    /// The same spacing in micrometres per pixel.
    pub fn to_mpp(&self) -> Self {
        self.scale(1000.0)
    }
}

/// The level a page is measured against: usually the full-resolution
/// baseline, or the page itself for label and overview images.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LevelReference {
    pub size: Size,
    pub pixel_spacing: SizeMm,
}

impl LevelReference {
    pub fn new(size: Size, pixel_spacing: SizeMm) -> Self {
        Self {
            size,
            pixel_spacing,
        }
    }

    /// Reference for an image that is not part of the pyramid, with its
    /// spacing derived from its width relative to this reference.
    pub fn for_associated(&self, size: Size) -> Self {
        let factor = if size.width == 0 {
            1.0
        } else {
            self.size.width as f64 / size.width as f64
        };
        Self::new(size, self.pixel_spacing.scale(factor))
    }
}

/// Number of tile columns and rows needed to cover `image_size`.
///
/// A page without a tile size is a single frame, so its grid is `1x1`.
pub fn tile_grid(image_size: Size, tile_size: Size) -> Size {
    if tile_size.width == 0 || tile_size.height == 0 {
        return Size::new(1, 1);
    }
    Size::new(
        image_size.width.div_ceil(tile_size.width),
        image_size.height.div_ceil(tile_size.height),
    )
}

/// Number of halvings between the base width and `image_size.width`.
///
/// Scanners round odd widths when downsampling, so a level is accepted when
/// it lies within one pixel of `base_width / 2^k`. Anything else is not a
/// power-of-two pyramid level.
pub fn pyramid_index(base_size: Size, image_size: Size) -> Result<u32, TileError> {
    let error = TileError::Geometry {
        base_width: base_size.width,
        width: image_size.width,
    };
    if image_size.width == 0 || image_size.width > base_size.width {
        return Err(error);
    }

    let base = base_size.width as f64;
    let width = image_size.width as f64;
    let k = (base / width).log2().round();
    let expected = base / 2f64.powf(k);

    if (width - expected).abs() >= 1.0 {
        return Err(error);
    }
    Ok(k as u32)
}

/// Pixel spacing of the level `pyramid_index` halvings below the base.
pub fn pixel_spacing(base: SizeMm, pyramid_index: u32) -> SizeMm {
    base.scale(2f64.powi(pyramid_index as i32))
}
