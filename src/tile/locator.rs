//! Tile coordinate to frame resolution.

use crate::error::TileError;

use super::geometry::Size;

/// Where the bytes of a tile live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameLocation {
    /// The frame was written: read `length` bytes at `offset`.
    Present { index: usize, offset: u64, length: u64 },

    /// The frame was never written (zero length or missing entry).
    Sparse { index: usize },
}

impl FrameLocation {
    pub fn index(&self) -> usize {
        match *self {
            FrameLocation::Present { index, .. } | FrameLocation::Sparse { index } => index,
        }
    }

    pub fn is_sparse(&self) -> bool {
        matches!(self, FrameLocation::Sparse { .. })
    }
}

/// Row-major frame index of tile `(x, y)` in `grid`.
pub fn frame_index(grid: Size, x: u32, y: u32) -> Result<usize, TileError> {
    if x >= grid.width || y >= grid.height {
        return Err(TileError::OutOfBounds {
            x,
            y,
            columns: grid.width,
            rows: grid.height,
        });
    }
    Ok(y as usize * grid.width as usize + x as usize)
}

/// Resolve tile `(x, y)` against a page's frame tables.
///
/// A zero length is the only sparse marker formats provide; an index past
/// the end of the tables is treated the same way.
pub fn locate(
    grid: Size,
    frame_offsets: &[u64],
    frame_lengths: &[u64],
    x: u32,
    y: u32,
) -> Result<FrameLocation, TileError> {
    let index = frame_index(grid, x, y)?;

    let (offset, length) = match (frame_offsets.get(index), frame_lengths.get(index)) {
        (Some(&offset), Some(&length)) => (offset, length),
        _ => return Ok(FrameLocation::Sparse { index }),
    };

    if length == 0 {
        return Ok(FrameLocation::Sparse { index });
    }
    Ok(FrameLocation::Present {
        index,
        offset,
        length,
    })
}
