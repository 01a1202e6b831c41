//! Page descriptors.
//!
//! A [`PageDescriptor`] is everything the tile core needs to know about one
//! IFD: image and tile geometry, the byte range of every frame, and the
//! shared JPEG tables. Tiled pages list one frame per tile in row-major
//! order; stripped pages list their strips and report a `(0, 0)` tile size.

use bytes::Bytes;
use tracing::warn;

use crate::error::TiffError;
use crate::io::RangeReader;
use crate::tile::Size;

use super::header::{TiffHeader, BIGTIFF_HEADER_SIZE};
use super::ifd::{read_ifd_chain, Ifd};
use super::tags::{TiffTag, COMPRESSION_NONE};
use super::values::ValueReader;

/// Read-only description of one page of a TIFF container.
#[derive(Debug, Clone, PartialEq)]
pub struct PageDescriptor {
    /// Position of the page in the IFD chain
    pub index: usize,

    /// Image size in pixels
    pub image_size: Size,

    /// Tile size in pixels, `(0, 0)` for strip-organized pages
    pub tile_size: Size,

    /// Byte offset of each frame
    pub frame_offsets: Vec<u64>,

    /// Byte length of each frame; zero marks a frame that was never written
    pub frame_lengths: Vec<u64>,

    /// Contents of the JPEGTables tag, empty when absent
    pub codec_tables: Bytes,

    /// Contents of the ImageDescription tag
    pub description: Option<String>,

    /// Value of the Compression tag
    pub compression: u16,
}

impl PageDescriptor {
    /// Build a descriptor from a parsed IFD, reading array values from the file.
    pub async fn load<R: RangeReader>(
        reader: &R,
        header: &TiffHeader,
        ifd: &Ifd,
        index: usize,
    ) -> Result<Self, TiffError> {
        let values = ValueReader::new(reader, header);

        let width = required(ifd, TiffTag::ImageWidth)?;
        let height = required(ifd, TiffTag::ImageLength)?;
        let image_size = Size::new(
            to_u32(values.read_u64(width, TiffTag::ImageWidth).await?, TiffTag::ImageWidth)?,
            to_u32(values.read_u64(height, TiffTag::ImageLength).await?, TiffTag::ImageLength)?,
        );

        let compression = match ifd.entry(TiffTag::Compression) {
            Some(entry) => values.read_u64(entry, TiffTag::Compression).await? as u16,
            None => COMPRESSION_NONE,
        };

        let (tile_size, offsets_tag, lengths_tag) = if ifd.is_tiled() {
            let tile_width = required(ifd, TiffTag::TileWidth)?;
            let tile_length = required(ifd, TiffTag::TileLength)?;
            let tile_size = Size::new(
                to_u32(values.read_u64(tile_width, TiffTag::TileWidth).await?, TiffTag::TileWidth)?,
                to_u32(values.read_u64(tile_length, TiffTag::TileLength).await?, TiffTag::TileLength)?,
            );
            (tile_size, TiffTag::TileOffsets, TiffTag::TileByteCounts)
        } else {
            (Size::ZERO, TiffTag::StripOffsets, TiffTag::StripByteCounts)
        };

        let frame_offsets = values
            .read_u64_array(required(ifd, offsets_tag)?, offsets_tag)
            .await?;
        let frame_lengths = values
            .read_u64_array(required(ifd, lengths_tag)?, lengths_tag)
            .await?;

        if tile_size == Size::ZERO && frame_offsets.len() > 1 {
            warn!(
                "Page {} of {} has {} strips, only the first is served",
                index,
                reader.identifier(),
                frame_offsets.len()
            );
        }

        let codec_tables = match ifd.entry(TiffTag::JpegTables) {
            Some(entry) => values.read_bytes(entry).await?,
            None => Bytes::new(),
        };

        let description = match ifd.entry(TiffTag::ImageDescription) {
            Some(entry) => Some(values.read_string(entry).await?),
            None => None,
        };

        Ok(PageDescriptor {
            index,
            image_size,
            tile_size,
            frame_offsets,
            frame_lengths,
            codec_tables,
            description,
            compression,
        })
    }

    /// Whether the page is organized in tiles (as opposed to strips).
    pub fn is_tiled(&self) -> bool {
        self.tile_size.width != 0 && self.tile_size.height != 0
    }

    /// ImageDescription text, empty when the tag is absent.
    pub fn description(&self) -> &str {
        self.description.as_deref().unwrap_or("")
    }
}

/// Parse the header and every IFD of a TIFF file into page descriptors.
pub async fn read_pages<R: RangeReader>(reader: &R) -> Result<Vec<PageDescriptor>, TiffError> {
    let header_len = BIGTIFF_HEADER_SIZE.min(reader.size() as usize);
    let header_bytes = reader.read_exact_at(0, header_len).await?;
    let header = TiffHeader::parse(&header_bytes, reader.size())?;

    let ifds = read_ifd_chain(reader, &header).await?;

    let mut pages = Vec::with_capacity(ifds.len());
    for (index, ifd) in ifds.iter().enumerate() {
        pages.push(PageDescriptor::load(reader, &header, ifd, index).await?);
    }

    Ok(pages)
}

fn required(ifd: &Ifd, tag: TiffTag) -> Result<&super::ifd::IfdEntry, TiffError> {
    ifd.entry(tag).ok_or(TiffError::MissingTag(tag.name()))
}

fn to_u32(value: u64, tag: TiffTag) -> Result<u32, TiffError> {
    u32::try_from(value).map_err(|_| TiffError::InvalidTagValue {
        tag: tag.name(),
        message: format!("{} does not fit in 32 bits", value),
    })
}
