//! JPEG header patching.
//!
//! Tiles in WSI containers are "abbreviated" JPEG streams: the quantization
//! (DQT) and Huffman (DHT) tables are stored once per page in the TIFF
//! `JPEGTables` tag instead of in every tile. Before a tile can be handed to
//! a standard decoder the tables have to be put back in.
//!
//! Vendors disagree on how the result must look, so there are two patches:
//!
//! ```text
//! TableInsertion:  frame[..SOS] + tables[2..len-2] + frame[SOS..]
//! ColorspaceFix:   tables[..len-2] + APP14(Adobe, transform=0) + frame[2..]
//! ```
//!
//! Aperio encoders write RGB tiles without an Adobe marker, and decoders
//! then assume YCbCr. The APP14 segment with transform 0 tells the decoder
//! the components are stored untransformed.

use bytes::{Bytes, BytesMut};

use crate::error::TileError;

// =============================================================================
// JPEG Markers
// =============================================================================

/// Start Of Image marker
pub const SOI: [u8; 2] = [0xFF, 0xD8];

/// End Of Image marker
pub const EOI: [u8; 2] = [0xFF, 0xD9];

/// Define Huffman Table marker
pub const DHT: [u8; 2] = [0xFF, 0xC4];

/// Define Quantization Table marker
pub const DQT: [u8; 2] = [0xFF, 0xDB];

/// Start Of Scan marker
pub const SOS: [u8; 2] = [0xFF, 0xDA];

/// Application segment 14 (Adobe) marker
pub const APP14: [u8; 2] = [0xFF, 0xEE];

/// Complete APP14 "Adobe" segment declaring transform 0 (no color transform).
pub const ADOBE_COLORSPACE_FIX: [u8; 16] = [
    0xFF, 0xEE, // APP14
    0x00, 0x0E, // Length 14
    0x41, 0x64, 0x6F, 0x62, 0x65, // "Adobe"
    0x00, 0x64, // Version 100
    0x80, 0x00, // Flags0
    0x00, 0x00, // Flags1
    0x00, // Transform: unknown (RGB or CMYK)
];

// =============================================================================
// Marker Search
// =============================================================================

/// Find the byte position of the first occurrence of `marker`.
pub fn find_marker(data: &[u8], marker: [u8; 2]) -> Option<usize> {
    data.windows(2).position(|w| w == marker)
}

// =============================================================================
// Header Patches
// =============================================================================

/// Strategy for turning an abbreviated frame into a standalone JPEG.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderPatch {
    /// Splice the table segments in front of the start of scan.
    TableInsertion,

    /// Prefix the tables (which carry their own SOI) and an Adobe APP14
    /// segment to the frame.
    ColorspaceFix,
}

impl HeaderPatch {
    /// Produce a standalone JPEG from a raw frame and the page's tables.
    ///
    /// Pure and deterministic. A page without tables stores complete JPEG
    /// frames, which are returned as they are.
    pub fn apply(&self, frame: &[u8], tables: &[u8]) -> Result<Bytes, TileError> {
        if tables.is_empty() {
            return Ok(Bytes::copy_from_slice(frame));
        }
        if tables.len() < 4 {
            return Err(TileError::MalformedFrame {
                reason: format!("JPEG tables too short ({} bytes)", tables.len()),
            });
        }

        match self {
            HeaderPatch::TableInsertion => insert_tables(frame, tables),
            HeaderPatch::ColorspaceFix => prefix_tables_with_colorspace(frame, tables),
        }
    }
}

fn insert_tables(frame: &[u8], tables: &[u8]) -> Result<Bytes, TileError> {
    let sos = find_marker(frame, SOS).ok_or_else(|| TileError::MalformedFrame {
        reason: "start of scan marker not found".to_string(),
    })?;
    let segments = &tables[2..tables.len() - 2];

    let mut out = BytesMut::with_capacity(frame.len() + segments.len());
    out.extend_from_slice(&frame[..sos]);
    out.extend_from_slice(segments);
    out.extend_from_slice(&frame[sos..]);
    Ok(out.freeze())
}

fn prefix_tables_with_colorspace(frame: &[u8], tables: &[u8]) -> Result<Bytes, TileError> {
    if !frame.starts_with(&SOI) {
        return Err(TileError::MalformedFrame {
            reason: "frame does not start with a start of image marker".to_string(),
        });
    }
    let head = &tables[..tables.len() - 2];

    let mut out = BytesMut::with_capacity(head.len() + ADOBE_COLORSPACE_FIX.len() + frame.len());
    out.extend_from_slice(head);
    out.extend_from_slice(&ADOBE_COLORSPACE_FIX);
    out.extend_from_slice(&frame[2..]);
    Ok(out.freeze())
}

// =============================================================================
// Tests
// =============================================================================
