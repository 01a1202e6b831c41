use thiserror::Error;

use crate::slide::Branch;

/// I/O errors that can occur when reading from the slide's storage
#[derive(Debug, Clone, Error)]
pub enum IoError {
    /// Error from S3 or S3-compatible storage
    #[error("S3 error: {0}")]
    S3(String),

    /// Error from the local filesystem
    #[error("File error: {0}")]
    File(String),

    /// Requested range exceeds resource bounds
    #[error("Range out of bounds: requested {requested} bytes at offset {offset}, size is {size}")]
    RangeOutOfBounds {
        offset: u64,
        requested: u64,
        size: u64,
    },

    /// Network or connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Object not found
    #[error("Object not found: {0}")]
    NotFound(String),
}

impl From<std::io::Error> for IoError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => IoError::NotFound(err.to_string()),
            _ => IoError::File(err.to_string()),
        }
    }
}

/// Errors raised while opening a slide container
#[derive(Debug, Clone, Error)]
pub enum FormatError {
    /// I/O error while reading the file
    #[error("I/O error: {0}")]
    Io(#[from] IoError),

    /// TIFF parsing error
    #[error("TIFF error: {0}")]
    Tiff(#[from] TiffError),

    /// File is not a supported vendor format
    #[error("Unsupported format: {reason}")]
    UnsupportedFormat { reason: String },

    /// The container has no baseline pyramid
    #[error("No volume series found in {vendor} file")]
    MissingVolume { vendor: &'static str },

    /// Base pixel spacing could not be read from vendor metadata
    #[error("Pixel spacing missing from {vendor} metadata")]
    MissingPixelSpacing { vendor: &'static str },
}

/// Errors that can occur when parsing TIFF files
#[derive(Debug, Clone, Error)]
pub enum TiffError {
    /// I/O error while reading the file
    #[error("I/O error: {0}")]
    Io(#[from] IoError),

    /// Invalid TIFF magic bytes (not II or MM)
    #[error("Invalid TIFF magic bytes: expected 0x4949 (II) or 0x4D4D (MM), got 0x{0:04X}")]
    InvalidMagic(u16),

    /// Invalid TIFF version number
    #[error("Invalid TIFF version: expected 42 (TIFF) or 43 (BigTIFF), got {0}")]
    InvalidVersion(u16),

    /// Invalid BigTIFF offset byte size (must be 8)
    #[error("Invalid BigTIFF offset byte size: expected 8, got {0}")]
    InvalidBigTiffOffsetSize(u16),

    /// File is too small to contain a valid TIFF header
    #[error("File too small: need at least {required} bytes, got {actual}")]
    FileTooSmall { required: u64, actual: u64 },

    /// Invalid IFD offset (points outside file or to invalid location)
    #[error("Invalid IFD offset: {0}")]
    InvalidIfdOffset(u64),

    /// Required tag is missing from IFD
    #[error("Missing required tag: {0}")]
    MissingTag(&'static str),

    /// Tag has unexpected type or count
    #[error("Invalid tag value for {tag}: {message}")]
    InvalidTagValue { tag: &'static str, message: String },

    /// Unknown field type in IFD entry
    #[error("Unknown field type: {0}")]
    UnknownFieldType(u16),
}

/// Errors raised while resolving or producing a tile
#[derive(Debug, Clone, Error)]
pub enum TileError {
    /// Level is not a power-of-two downsample of the base level
    #[error("Level width {width} is not a power-of-two downsample of base width {base_width}")]
    Geometry { base_width: u32, width: u32 },

    /// Tile coordinate outside the page's tile grid
    #[error("Tile ({x}, {y}) outside tile grid of {columns}x{rows}")]
    OutOfBounds {
        x: u32,
        y: u32,
        columns: u32,
        rows: u32,
    },

    /// Frame bytes lack a marker required for header patching
    #[error("Malformed frame: {reason}")]
    MalformedFrame { reason: String },

    /// Every frame of the page is sparse, no blank tile can be derived
    #[error("Page {page} has no frame with data")]
    NoValidFrame { page: usize },

    /// No page at the requested series/level/page triple
    #[error("No page at series {series}, level {level}, page {page}")]
    PageNotFound {
        series: usize,
        level: usize,
        page: usize,
    },

    /// The container has no series for the requested branch
    #[error("Slide has no {0} image")]
    MissingBranch(Branch),

    /// The blank fill operation failed
    #[error("Fill failed: {message}")]
    Fill { message: String },

    /// I/O error while reading frame bytes
    #[error("I/O error: {0}")]
    Io(#[from] IoError),
}
