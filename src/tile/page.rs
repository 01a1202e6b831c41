//! One page of a slide, served tile by tile.
//!
//! A [`TiledPage`] ties a [`PageDescriptor`] to the shared reader, the
//! vendor's [`HeaderPatch`] and a [`BlankFill`]. Every tile it returns is a
//! standalone JPEG: present frames are read and patched, sparse frames are
//! answered with one blank tile synthesized on first use and cached for the
//! life of the page.

use std::sync::Arc;

use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};
use tokio::sync::OnceCell;
use tracing::debug;

use crate::error::TileError;
use crate::format::jpeg::HeaderPatch;
use crate::format::tiff::PageDescriptor;
use crate::io::RangeReader;

use super::fill::BlankFill;
use super::geometry::{self, LevelReference, Size, SizeMm};
use super::locator::{frame_index, locate, FrameLocation};

/// Tile access to a single page (pyramid level, label or overview).
pub struct TiledPage<R: RangeReader> {
    page: Arc<PageDescriptor>,
    reader: Arc<R>,
    patch: HeaderPatch,
    fill: Arc<dyn BlankFill>,

    pyramid_index: u32,
    tiled_size: Size,
    pixel_spacing: SizeMm,

    /// Synthesized once, on the first sparse request
    blank_tile: OnceCell<Bytes>,
}

impl<R: RangeReader> std::fmt::Debug for TiledPage<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TiledPage")
            .field("page", &self.page)
            .field("pyramid_index", &self.pyramid_index)
            .field("tiled_size", &self.tiled_size)
            .field("pixel_spacing", &self.pixel_spacing)
            .finish_non_exhaustive()
    }
}

impl<R: RangeReader> TiledPage<R> {
    /// Build a page measured against `base`.
    ///
    /// Fails with [`TileError::Geometry`] when the page is not a power-of-two
    /// downsample of the base.
    pub fn new(
        page: Arc<PageDescriptor>,
        reader: Arc<R>,
        patch: HeaderPatch,
        fill: Arc<dyn BlankFill>,
        base: &LevelReference,
    ) -> Result<Self, TileError> {
        let pyramid_index = geometry::pyramid_index(base.size, page.image_size)?;
        let tiled_size = geometry::tile_grid(page.image_size, page.tile_size);
        let pixel_spacing = geometry::pixel_spacing(base.pixel_spacing, pyramid_index);

        Ok(Self {
            page,
            reader,
            patch,
            fill,
            pyramid_index,
            tiled_size,
            pixel_spacing,
            blank_tile: OnceCell::new(),
        })
    }

    // =========================================================================
    // Tile Access
    // =========================================================================

    /// Get the standalone JPEG for tile `(x, y)`.
    pub async fn get_tile(&self, x: u32, y: u32) -> Result<Bytes, TileError> {
        let location = locate(
            self.tiled_size,
            &self.page.frame_offsets,
            &self.page.frame_lengths,
            x,
            y,
        )?;

        match location {
            FrameLocation::Present { offset, length, .. } => {
                let frame = self.read_frame(offset, length).await?;
                self.patch.apply(&frame, &self.page.codec_tables)
            }
            FrameLocation::Sparse { index } => {
                debug!(
                    page = self.page.index,
                    frame = index,
                    "Sparse frame at ({}, {}), serving blank tile",
                    x,
                    y
                );
                self.blank_tile().await
            }
        }
    }

    /// Get several tiles, lazily and in the order given.
    ///
    /// Each element is resolved on its own when polled; an error in one does
    /// not end the stream. Calling this again starts over.
    pub fn get_tiles<'a, I>(
        &'a self,
        positions: I,
    ) -> impl Stream<Item = Result<Bytes, TileError>> + 'a
    where
        I: IntoIterator<Item = (u32, u32)>,
        I::IntoIter: 'a,
    {
        stream::iter(positions).then(move |(x, y)| self.get_tile(x, y))
    }

    /// The page's blank tile, synthesizing it if needed.
    ///
    /// Concurrent first callers share a single synthesis. A failed
    /// synthesis is not cached.
    pub async fn blank_tile(&self) -> Result<Bytes, TileError> {
        self.blank_tile
            .get_or_try_init(|| self.synthesize_blank_tile())
            .await
            .cloned()
    }

    async fn synthesize_blank_tile(&self) -> Result<Bytes, TileError> {
        let (index, (&offset, &length)) = self
            .page
            .frame_offsets
            .iter()
            .zip(self.page.frame_lengths.iter())
            .enumerate()
            .find(|(_, (_, length))| **length != 0)
            .ok_or(TileError::NoValidFrame {
                page: self.page.index,
            })?;

        debug!(
            page = self.page.index,
            frame = index,
            "Synthesizing blank tile from frame {}",
            index
        );

        let frame = self.read_frame(offset, length).await?;
        let reference = self.patch.apply(&frame, &self.page.codec_tables)?;
        self.fill.fill(&reference)
    }

    async fn read_frame(&self, offset: u64, length: u64) -> Result<Bytes, TileError> {
        let len = usize::try_from(length).map_err(|_| TileError::MalformedFrame {
            reason: format!("frame length {} does not fit in memory", length),
        })?;
        Ok(self.reader.read_exact_at(offset, len).await?)
    }

    // =========================================================================
    // Geometry
    // =========================================================================

    /// Number of halvings between this page and its base level.
    pub fn pyramid_index(&self) -> u32 {
        self.pyramid_index
    }

    /// Tile grid as columns x rows.
    pub fn tiled_size(&self) -> Size {
        self.tiled_size
    }

    /// Millimetres per pixel.
    pub fn pixel_spacing(&self) -> SizeMm {
        self.pixel_spacing
    }

    /// Micrometres per pixel.
    pub fn mpp(&self) -> SizeMm {
        self.pixel_spacing.to_mpp()
    }

    pub fn image_size(&self) -> Size {
        self.page.image_size
    }

    pub fn tile_size(&self) -> Size {
        self.page.tile_size
    }

    pub fn page(&self) -> &PageDescriptor {
        &self.page
    }

    pub fn header_patch(&self) -> HeaderPatch {
        self.patch
    }

    /// Whether `(x, y)` lies inside the tile grid.
    pub fn valid_tile(&self, x: u32, y: u32) -> bool {
        frame_index(self.tiled_size, x, y).is_ok()
    }
}

// =============================================================================
// Tests
// =============================================================================
