//! Blank tile synthesis.
//!
//! Sparse tiles have no bytes in the file, so a stand-in is produced from a
//! tile that does exist: same dimensions, same color layout, uniform white.

use std::io::Cursor;

use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::{GrayImage, ImageFormat, ImageReader, Luma, Rgb, RgbImage};

use crate::error::TileError;

/// Default JPEG quality of synthesized tiles (1-100).
pub const DEFAULT_FILL_QUALITY: u8 = 80;

/// Minimum allowed JPEG quality.
pub const MIN_FILL_QUALITY: u8 = 1;

/// Maximum allowed JPEG quality.
pub const MAX_FILL_QUALITY: u8 = 100;

/// Produces a blank compressed tile shaped like a reference tile.
///
/// `reference` is a standalone JPEG (already header-patched). The result
/// must decode to the same dimensions. Implementations are called at most
/// once per page and should be free of side effects.
pub trait BlankFill: Send + Sync {
    fn fill(&self, reference: &[u8]) -> Result<Bytes, TileError>;
}

/// Fills with white, keeping grayscale references grayscale.
#[derive(Debug, Clone, Copy)]
pub struct WhiteFill {
    quality: u8,
}

impl WhiteFill {
    /// Quality is clamped to 1-100.
    pub fn new(quality: u8) -> Self {
        Self {
            quality: quality.clamp(MIN_FILL_QUALITY, MAX_FILL_QUALITY),
        }
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }
}

impl Default for WhiteFill {
    fn default() -> Self {
        Self::new(DEFAULT_FILL_QUALITY)
    }
}

impl BlankFill for WhiteFill {
    fn fill(&self, reference: &[u8]) -> Result<Bytes, TileError> {
        let reader = ImageReader::with_format(Cursor::new(reference), ImageFormat::Jpeg);
        let source = reader.decode().map_err(|e| TileError::Fill {
            message: format!("reference tile does not decode: {}", e),
        })?;

        let (width, height) = (source.width(), source.height());
        let mut output = Vec::new();
        {
            let mut encoder = JpegEncoder::new_with_quality(&mut output, self.quality);
            let encoded = if source.color().has_color() {
                encoder.encode_image(&RgbImage::from_pixel(width, height, Rgb([255, 255, 255])))
            } else {
                encoder.encode_image(&GrayImage::from_pixel(width, height, Luma([255])))
            };
            encoded.map_err(|e| TileError::Fill {
                message: e.to_string(),
            })?;
        }

        Ok(Bytes::from(output))
    }
}
