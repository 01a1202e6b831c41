//! Image File Directory parsing.
//!
//! Every page of a slide (pyramid level, label, macro, thumbnail) is one IFD.
//! Directories form a singly linked chain starting at the header's first IFD
//! offset; the chain is walked once when a slide is opened.

use std::collections::HashSet;

use tracing::warn;

use crate::error::TiffError;
use crate::io::RangeReader;

use super::header::TiffHeader;
use super::tags::{FieldType, TiffTag};

/// Upper bound on the number of directories walked in one file
const MAX_IFDS: usize = 1024;

/// A single IFD entry.
///
/// The value field is kept raw: it holds the value itself when it fits
/// inline, otherwise the file offset of the value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IfdEntry {
    pub tag: u16,

    /// Parsed field type, `None` for types we do not decode
    pub field_type: Option<FieldType>,

    pub field_type_raw: u16,

    /// Number of values (not bytes)
    pub count: u64,

    /// Raw value/offset field, 4 bytes classic or 8 bytes BigTIFF
    pub value_field: Vec<u8>,
}

impl IfdEntry {
    /// Total size of the value in bytes, `None` for unknown field types.
    pub fn value_byte_size(&self) -> Option<u64> {
        let field_type = self.field_type?;
        self.count.checked_mul(field_type.size_in_bytes() as u64)
    }

    /// Whether the value is stored in the entry itself.
    pub fn is_inline(&self) -> bool {
        self.value_byte_size()
            .map(|size| size <= self.value_field.len() as u64)
            .unwrap_or(false)
    }

    /// Interpret the value field as a file offset.
    pub fn value_offset(&self, header: &TiffHeader) -> u64 {
        header.read_offset(&self.value_field)
    }
}

/// A parsed Image File Directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ifd {
    /// Offset of this IFD in the file
    pub offset: u64,

    /// Entries in file order (sorted by tag in well-formed files)
    pub entries: Vec<IfdEntry>,

    /// Offset of the next IFD, 0 at the end of the chain
    pub next_ifd_offset: u64,
}

impl Ifd {
    /// Total byte size of an IFD with `entry_count` entries, `None` when
    /// it does not fit in `usize`.
    pub fn calculate_size(entry_count: u64, header: &TiffHeader) -> Option<usize> {
        usize::try_from(entry_count)
            .ok()?
            .checked_mul(header.ifd_entry_size())?
            .checked_add(header.ifd_count_size() + header.offset_size())
    }

    /// Parse an IFD from its raw bytes (count, entries and next offset).
    pub fn parse(bytes: &[u8], offset: u64, header: &TiffHeader) -> Result<Self, TiffError> {
        let byte_order = header.byte_order;
        let count_size = header.ifd_count_size();

        if bytes.len() < count_size {
            return Err(TiffError::InvalidIfdOffset(offset));
        }

        let entry_count = if header.is_bigtiff {
            byte_order.read_u64(bytes)
        } else {
            byte_order.read_u16(bytes) as u64
        };

        match Self::calculate_size(entry_count, header) {
            Some(size) if size <= bytes.len() => {}
            _ => return Err(TiffError::InvalidIfdOffset(offset)),
        }

        let entry_size = header.ifd_entry_size();
        let value_size = header.offset_size();
        let mut entries = Vec::with_capacity(entry_count as usize);

        for i in 0..entry_count as usize {
            let start = count_size + i * entry_size;
            let raw = &bytes[start..start + entry_size];

            let tag = byte_order.read_u16(&raw[0..2]);
            let field_type_raw = byte_order.read_u16(&raw[2..4]);
            let (count, value_field) = if header.is_bigtiff {
                (byte_order.read_u64(&raw[4..12]), raw[12..20].to_vec())
            } else {
                (byte_order.read_u32(&raw[4..8]) as u64, raw[8..12].to_vec())
            };
            debug_assert_eq!(value_field.len(), value_size);

            entries.push(IfdEntry {
                tag,
                field_type: FieldType::from_u16(field_type_raw),
                field_type_raw,
                count,
                value_field,
            });
        }

        let next_start = count_size + entry_count as usize * entry_size;
        let next_ifd_offset = header.read_offset(&bytes[next_start..next_start + value_size]);

        Ok(Ifd {
            offset,
            entries,
            next_ifd_offset,
        })
    }

    /// Find the entry for a tag.
    pub fn entry(&self, tag: TiffTag) -> Option<&IfdEntry> {
        let id = tag.as_u16();
        self.entries.iter().find(|e| e.tag == id)
    }

    /// Whether the IFD describes a tiled (rather than stripped) page.
    pub fn is_tiled(&self) -> bool {
        self.entry(TiffTag::TileWidth).is_some() && self.entry(TiffTag::TileOffsets).is_some()
    }
}

/// Read every IFD in the file by following the next-IFD chain.
///
/// The walk stops at the end of the chain, at [`MAX_IFDS`], or when an
/// offset repeats (a cyclic chain in a damaged file).
pub async fn read_ifd_chain<R: RangeReader>(
    reader: &R,
    header: &TiffHeader,
) -> Result<Vec<Ifd>, TiffError> {
    let mut ifds = Vec::new();
    let mut visited = HashSet::new();
    let mut offset = header.first_ifd_offset;

    while offset != 0 && ifds.len() < MAX_IFDS {
        if !visited.insert(offset) {
            warn!(
                "IFD chain of {} loops back to offset {}",
                reader.identifier(),
                offset
            );
            break;
        }
        if offset >= reader.size() {
            return Err(TiffError::InvalidIfdOffset(offset));
        }

        let count_bytes = reader.read_exact_at(offset, header.ifd_count_size()).await?;
        let entry_count = if header.is_bigtiff {
            header.byte_order.read_u64(&count_bytes)
        } else {
            header.byte_order.read_u16(&count_bytes) as u64
        };

        // The entry count is untrusted; the directory must fit in the file
        let remaining = reader.size() - offset;
        let ifd_size = match Ifd::calculate_size(entry_count, header) {
            Some(size) if size as u64 <= remaining => size,
            _ => return Err(TiffError::InvalidIfdOffset(offset)),
        };
        let ifd_bytes = reader.read_exact_at(offset, ifd_size).await?;
        let ifd = Ifd::parse(&ifd_bytes, offset, header)?;

        offset = ifd.next_ifd_offset;
        ifds.push(ifd);
    }

    Ok(ifds)
}
