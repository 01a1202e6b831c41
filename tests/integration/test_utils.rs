//! Test utilities for integration tests.
//!
//! Provides a tracking mock reader, JPEG helpers that produce abbreviated
//! tiles the way scanners store them, and a builder for multi-page TIFF
//! files with per-tile data.

use async_trait::async_trait;
use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::{GrayImage, Luma, Rgb, RgbImage};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use wsi_tiler::error::IoError;
use wsi_tiler::io::RangeReader;

// =============================================================================
// Mock Range Reader with Request Tracking
// =============================================================================

/// A mock range reader that tracks all read requests.
pub struct TrackingMockReader {
    data: Bytes,
    identifier: String,
    request_count: Arc<AtomicUsize>,
    requests: Arc<RwLock<Vec<(u64, usize)>>>,
}

impl TrackingMockReader {
    pub fn new(data: Vec<u8>, identifier: impl Into<String>) -> Self {
        Self {
            data: Bytes::from(data),
            identifier: identifier.into(),
            request_count: Arc::new(AtomicUsize::new(0)),
            requests: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::SeqCst)
    }

    pub async fn get_requests(&self) -> Vec<(u64, usize)> {
        self.requests.read().await.clone()
    }

    pub async fn reset_tracking(&self) {
        self.request_count.store(0, Ordering::SeqCst);
        self.requests.write().await.clear();
    }
}

#[async_trait]
impl RangeReader for TrackingMockReader {
    async fn read_exact_at(&self, offset: u64, len: usize) -> Result<Bytes, IoError> {
        self.request_count.fetch_add(1, Ordering::SeqCst);
        self.requests.write().await.push((offset, len));

        let start = offset as usize;
        let end = start + len;
        if end > self.data.len() {
            return Err(IoError::RangeOutOfBounds {
                offset,
                requested: len as u64,
                size: self.data.len() as u64,
            });
        }
        Ok(self.data.slice(start..end))
    }

    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    fn identifier(&self) -> &str {
        &self.identifier
    }
}

// =============================================================================
// Test JPEG Creation
// =============================================================================

/// Create a test JPEG image with a simple gradient pattern.
pub fn create_test_jpeg(width: u32, height: u32, quality: u8) -> Vec<u8> {
    let img = GrayImage::from_fn(width, height, |x, y| {
        let val = ((x + y) % 256) as u8;
        Luma([val])
    });

    let mut buf = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut buf, quality);
    encoder.encode_image(&img).unwrap();
    buf
}

/// Create a test RGB JPEG image.
pub fn create_test_rgb_jpeg(width: u32, height: u32, quality: u8) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        let r = (x % 256) as u8;
        let g = (y % 256) as u8;
        let b = ((x + y) % 256) as u8;
        Rgb([r, g, b])
    });

    let mut buf = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut buf, quality);
    encoder.encode_image(&img).unwrap();
    buf
}

/// Split a complete JPEG into a `JPEGTables` stream and an abbreviated frame.
///
/// The tables stream is `SOI + DQT/DHT segments + EOI`. The frame keeps every
/// other segment, the scan data and the EOI, but none of the tables.
pub fn split_jpeg(jpeg: &[u8]) -> (Vec<u8>, Vec<u8>) {
    assert_eq!(&jpeg[..2], &[0xFF, 0xD8], "not a JPEG stream");

    let mut tables = vec![0xFF, 0xD8];
    let mut frame = vec![0xFF, 0xD8];
    let mut pos = 2;

    while pos + 4 <= jpeg.len() {
        assert_eq!(jpeg[pos], 0xFF, "expected a marker at {}", pos);
        let marker = jpeg[pos + 1];
        if marker == 0xDA {
            // Start of scan: the rest is entropy-coded data and EOI
            frame.extend_from_slice(&jpeg[pos..]);
            break;
        }

        let length = u16::from_be_bytes([jpeg[pos + 2], jpeg[pos + 3]]) as usize;
        let segment = &jpeg[pos..pos + 2 + length];
        if marker == 0xDB || marker == 0xC4 {
            tables.extend_from_slice(segment);
        } else {
            frame.extend_from_slice(segment);
        }
        pos += 2 + length;
    }

    tables.extend_from_slice(&[0xFF, 0xD9]);
    (tables, frame)
}

/// Decode a tile and return its dimensions.
pub fn decoded_dimensions(jpeg: &[u8]) -> (u32, u32) {
    let img = image::load_from_memory_with_format(jpeg, image::ImageFormat::Jpeg)
        .expect("tile should decode as a standalone JPEG");
    (img.width(), img.height())
}

// =============================================================================
// TIFF File Builder
// =============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ByteOrderType {
    LittleEndian,
    BigEndian,
}

/// One page of a test TIFF file.
#[derive(Clone, Debug)]
pub struct PageBuilder {
    width: u32,
    height: u32,
    tile_size: Option<(u32, u32)>,

    /// Frame data per tile (or strip), row-major; empty means never written
    frames: Vec<Vec<u8>>,

    jpeg_tables: Option<Vec<u8>>,
    description: Option<String>,
    compression: u16,
}

impl PageBuilder {
    /// A tiled JPEG page with no frames yet.
    pub fn tiled(width: u32, height: u32, tile_width: u32, tile_height: u32) -> Self {
        Self {
            width,
            height,
            tile_size: Some((tile_width, tile_height)),
            frames: Vec::new(),
            jpeg_tables: None,
            description: None,
            compression: 7,
        }
    }

    /// A strip-organized JPEG page holding a single strip.
    pub fn stripped(width: u32, height: u32, strip: Vec<u8>) -> Self {
        Self {
            width,
            height,
            tile_size: None,
            frames: vec![strip],
            jpeg_tables: None,
            description: None,
            compression: 7,
        }
    }

    /// Number of tiles in the grid.
    pub fn tile_count(&self) -> usize {
        match self.tile_size {
            Some((tw, th)) => (self.width.div_ceil(tw) * self.height.div_ceil(th)) as usize,
            None => 1,
        }
    }

    /// Use the same frame for every tile of the grid.
    pub fn with_uniform_frames(mut self, frame: Vec<u8>) -> Self {
        self.frames = vec![frame; self.tile_count()];
        self
    }

    pub fn with_frames(mut self, frames: Vec<Vec<u8>>) -> Self {
        self.frames = frames;
        self
    }

    /// Clear the frames at the given row-major indices.
    pub fn with_sparse(mut self, indices: &[usize]) -> Self {
        for &index in indices {
            self.frames[index].clear();
        }
        self
    }

    pub fn with_jpeg_tables(mut self, tables: Vec<u8>) -> Self {
        self.jpeg_tables = Some(tables);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_compression(mut self, compression: u16) -> Self {
        self.compression = compression;
        self
    }
}

/// Tag value payloads.
enum Value {
    Short(u16),
    Long(u32),
    Offsets(Vec<u64>),
    Ascii(Vec<u8>),
    Undefined(Vec<u8>),
}

/// Builder for multi-page test TIFF files.
pub struct TiffBuilder {
    byte_order: ByteOrderType,
    is_bigtiff: bool,
    pages: Vec<PageBuilder>,
}

impl TiffBuilder {
    pub fn new() -> Self {
        Self {
            byte_order: ByteOrderType::LittleEndian,
            is_bigtiff: false,
            pages: Vec::new(),
        }
    }

    pub fn with_byte_order(mut self, order: ByteOrderType) -> Self {
        self.byte_order = order;
        self
    }

    pub fn with_bigtiff(mut self, is_bigtiff: bool) -> Self {
        self.is_bigtiff = is_bigtiff;
        self
    }

    pub fn add_page(mut self, page: PageBuilder) -> Self {
        self.pages.push(page);
        self
    }

    /// Build the file: header, then for each page its IFD, its frame data
    /// and its out-of-line tag values.
    pub fn build(self) -> Vec<u8> {
        let mut data = Vec::new();
        match self.byte_order {
            ByteOrderType::LittleEndian => data.extend_from_slice(b"II"),
            ByteOrderType::BigEndian => data.extend_from_slice(b"MM"),
        }
        if self.is_bigtiff {
            self.put(&mut data, 43, 2);
            self.put(&mut data, 8, 2);
            self.put(&mut data, 0, 2);
        } else {
            self.put(&mut data, 42, 2);
        }

        let mut next_pointer = data.len();
        self.put(&mut data, 0, self.offset_size());

        for page in &self.pages {
            if data.len() % 2 == 1 {
                data.push(0);
            }
            let ifd_offset = data.len() as u64;
            self.patch(&mut data, next_pointer, ifd_offset, self.offset_size());

            let entries = self.entries_for(page);
            let count_size = if self.is_bigtiff { 8 } else { 2 };
            let entry_size = if self.is_bigtiff { 20 } else { 12 };
            let ifd_size = count_size + entries.len() * entry_size + self.offset_size();

            // Frame data goes right after the IFD
            let mut frame_offsets = Vec::new();
            let mut frame_lengths = Vec::new();
            let mut cursor = ifd_offset + ifd_size as u64;
            for frame in &page.frames {
                if frame.is_empty() {
                    frame_offsets.push(0);
                    frame_lengths.push(0);
                } else {
                    frame_offsets.push(cursor);
                    frame_lengths.push(frame.len() as u64);
                    cursor += frame.len() as u64;
                }
            }

            let mut encoded: Vec<(u16, u16, u64, Vec<u8>)> = entries
                .into_iter()
                .map(|(tag, value)| {
                    let value = match value {
                        Value::Offsets(_) if tag == 273 || tag == 324 => {
                            Value::Offsets(frame_offsets.clone())
                        }
                        Value::Offsets(_) => Value::Offsets(frame_lengths.clone()),
                        other => other,
                    };
                    self.encode(tag, value)
                })
                .collect();
            encoded.sort_by_key(|e| e.0);

            // Write the IFD, placing large values after the frames
            let mut external = Vec::new();
            let inline_size = self.offset_size();
            let external_start = cursor;
            self.put(&mut data, encoded.len() as u64, count_size);
            for (tag, field_type, count, bytes) in &encoded {
                self.put(&mut data, *tag as u64, 2);
                self.put(&mut data, *field_type as u64, 2);
                self.put(&mut data, *count, if self.is_bigtiff { 8 } else { 4 });
                if bytes.len() <= inline_size {
                    let mut field = bytes.clone();
                    field.resize(inline_size, 0);
                    data.extend_from_slice(&field);
                } else {
                    if external.len() % 2 == 1 {
                        external.push(0);
                    }
                    let offset = external_start + external.len() as u64;
                    self.put(&mut data, offset, inline_size);
                    external.extend_from_slice(bytes);
                }
            }
            next_pointer = data.len();
            self.put(&mut data, 0, self.offset_size());

            for frame in &page.frames {
                data.extend_from_slice(frame);
            }
            data.extend_from_slice(&external);
        }

        data
    }

    fn entries_for(&self, page: &PageBuilder) -> Vec<(u16, Value)> {
        let mut entries = vec![
            (256, Value::Long(page.width)),
            (257, Value::Long(page.height)),
            (258, Value::Short(8)),
            (259, Value::Short(page.compression)),
            (277, Value::Short(3)),
        ];

        match page.tile_size {
            Some((tw, th)) => {
                entries.push((322, Value::Short(tw as u16)));
                entries.push((323, Value::Short(th as u16)));
                entries.push((324, Value::Offsets(Vec::new())));
                entries.push((325, Value::Offsets(Vec::new())));
            }
            None => {
                entries.push((273, Value::Offsets(Vec::new())));
                entries.push((278, Value::Long(page.height)));
                entries.push((279, Value::Offsets(Vec::new())));
            }
        }

        if let Some(description) = &page.description {
            let mut bytes = description.as_bytes().to_vec();
            bytes.push(0);
            entries.push((270, Value::Ascii(bytes)));
        }
        if let Some(tables) = &page.jpeg_tables {
            entries.push((347, Value::Undefined(tables.clone())));
        }

        entries
    }

    /// Encode a value as (tag, field type, count, bytes).
    fn encode(&self, tag: u16, value: Value) -> (u16, u16, u64, Vec<u8>) {
        let mut bytes = Vec::new();
        match value {
            Value::Short(v) => {
                self.put(&mut bytes, v as u64, 2);
                (tag, 3, 1, bytes)
            }
            Value::Long(v) => {
                self.put(&mut bytes, v as u64, 4);
                (tag, 4, 1, bytes)
            }
            Value::Offsets(values) => {
                let (field_type, width) = if self.is_bigtiff { (16, 8) } else { (4, 4) };
                for v in &values {
                    self.put(&mut bytes, *v, width);
                }
                (tag, field_type, values.len() as u64, bytes)
            }
            Value::Ascii(v) => (tag, 2, v.len() as u64, v),
            Value::Undefined(v) => (tag, 7, v.len() as u64, v),
        }
    }

    fn offset_size(&self) -> usize {
        if self.is_bigtiff {
            8
        } else {
            4
        }
    }

    fn put(&self, data: &mut Vec<u8>, value: u64, size: usize) {
        let bytes = match self.byte_order {
            ByteOrderType::LittleEndian => value.to_le_bytes().to_vec(),
            ByteOrderType::BigEndian => value.to_be_bytes().to_vec(),
        };
        match self.byte_order {
            ByteOrderType::LittleEndian => data.extend_from_slice(&bytes[..size]),
            ByteOrderType::BigEndian => data.extend_from_slice(&bytes[8 - size..]),
        }
    }

    fn patch(&self, data: &mut [u8], at: usize, value: u64, size: usize) {
        let mut bytes = Vec::with_capacity(size);
        self.put(&mut bytes, value, size);
        data[at..at + size].copy_from_slice(&bytes);
    }
}

impl Default for TiffBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Vendor Slides
// =============================================================================

pub const APERIO_DESCRIPTION: &str =
    "Aperio Image Library v12.0.15\r\n1024x768 [0,0 1024x768] (256x256) JPEG/RGB Q=70|AppMag = 20|MPP = 0.4990";

pub fn philips_description(row_spacing: f64, column_spacing: f64) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" ?>
<DataObject ObjectType="DPUfsImport">
  <Attribute Name="DICOM_MANUFACTURER" Group="0x0008" Element="0x0070" PMSVR="IString">PHILIPS</Attribute>
  <Attribute Name="PIM_DP_SCANNED_IMAGES" Group="0x301D" Element="0x1003" PMSVR="IDataObjectArray">
    <Array>
      <DataObject ObjectType="DPScannedImage">
        <Attribute Name="DICOM_PIXEL_SPACING" Group="0x0028" Element="0x0030" PMSVR="IDoubleArray">&quot;{}&quot; &quot;{}&quot;</Attribute>
        <Attribute Name="PIM_DP_IMAGE_TYPE" Group="0x301D" Element="0x1004" PMSVR="IString">WSI</Attribute>
      </DataObject>
    </Array>
  </Attribute>
</DataObject>"#,
        row_spacing, column_spacing
    )
}

/// An Aperio slide: a 1024x768 base (4x3 tiles of 256), a thumbnail strip,
/// a 512x384 level (2x2 tiles), a label and a macro.
///
/// Tiles are abbreviated RGB frames sharing one `JPEGTables` per page. Frame
/// 5 of the base is sparse.
pub fn create_aperio_slide() -> Vec<u8> {
    let (tables, frame) = split_jpeg(&create_test_rgb_jpeg(256, 256, 80));

    TiffBuilder::new()
        .add_page(
            PageBuilder::tiled(1024, 768, 256, 256)
                .with_uniform_frames(frame.clone())
                .with_sparse(&[5])
                .with_jpeg_tables(tables.clone())
                .with_description(APERIO_DESCRIPTION),
        )
        .add_page(
            PageBuilder::stripped(128, 96, create_test_rgb_jpeg(128, 96, 80))
                .with_description("Aperio Image Library v12.0.15\r\n1024x768 -> 128x96 - |AppMag = 20"),
        )
        .add_page(
            PageBuilder::tiled(512, 384, 256, 256)
                .with_uniform_frames(frame)
                .with_jpeg_tables(tables)
                .with_description("Aperio Image Library v12.0.15\r\n1024x768 (256x256) -> 512x384 JPEG/RGB Q=70"),
        )
        .add_page(
            PageBuilder::stripped(200, 100, create_test_rgb_jpeg(200, 100, 80))
                .with_description("Aperio Image Library v12.0.15\r\nlabel 200x100"),
        )
        .add_page(
            PageBuilder::stripped(400, 200, create_test_rgb_jpeg(400, 200, 80))
                .with_description("Aperio Image Library v12.0.15\r\nmacro 400x200"),
        )
        .build()
}

/// A Philips slide: a 1024x1024 base (4x4 tiles of 256), levels at 512 and
/// 256, then a macro and a label.
///
/// Frames 0 and 7 of the base are sparse.
pub fn create_philips_slide(byte_order: ByteOrderType, bigtiff: bool) -> Vec<u8> {
    let (tables, frame) = split_jpeg(&create_test_jpeg(256, 256, 80));

    let level = |size: u32| {
        PageBuilder::tiled(size, size, 256, 256)
            .with_uniform_frames(frame.clone())
            .with_jpeg_tables(tables.clone())
            .with_description(format!("level={} mag=40 quality=80", 1024 / size / 2))
    };

    let (macro_tables, macro_frame) = split_jpeg(&create_test_jpeg(256, 128, 80));
    let (label_tables, label_frame) = split_jpeg(&create_test_jpeg(128, 128, 80));

    TiffBuilder::new()
        .with_byte_order(byte_order)
        .with_bigtiff(bigtiff)
        .add_page(
            level(1024)
                .with_sparse(&[0, 7])
                .with_description(philips_description(0.00025, 0.0005)),
        )
        .add_page(level(512))
        .add_page(level(256))
        .add_page(
            PageBuilder::tiled(256, 128, 256, 128)
                .with_frames(vec![macro_frame])
                .with_jpeg_tables(macro_tables)
                .with_description("Macro"),
        )
        .add_page(
            PageBuilder::tiled(128, 128, 128, 128)
                .with_frames(vec![label_frame])
                .with_jpeg_tables(label_tables)
                .with_description("Label pixelsize=(50.0,40.0)"),
        )
        .build()
}
