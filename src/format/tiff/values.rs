//! TIFF tag value reading.
//!
//! Values are either inline in the IFD entry or stored at an offset.
//! Array values (tile offsets and byte counts) are fetched with a single
//! range read regardless of their length.

use bytes::Bytes;

use crate::error::TiffError;
use crate::io::RangeReader;

use super::header::{ByteOrder, TiffHeader};
use super::ifd::IfdEntry;
use super::tags::{FieldType, TiffTag};

/// Reads tag values from a TIFF file.
pub struct ValueReader<'a, R: RangeReader> {
    reader: &'a R,
    header: &'a TiffHeader,
}

impl<'a, R: RangeReader> ValueReader<'a, R> {
    pub fn new(reader: &'a R, header: &'a TiffHeader) -> Self {
        Self { reader, header }
    }

    /// Read the raw bytes of an entry's value, inline or at its offset.
    pub async fn read_bytes(&self, entry: &IfdEntry) -> Result<Bytes, TiffError> {
        let size = entry
            .value_byte_size()
            .ok_or(TiffError::UnknownFieldType(entry.field_type_raw))?;

        if entry.is_inline() {
            return Ok(Bytes::copy_from_slice(&entry.value_field[..size as usize]));
        }

        let offset = entry.value_offset(self.header);
        let len = usize::try_from(size).map_err(|_| TiffError::InvalidTagValue {
            tag: "value",
            message: format!("value of {} bytes does not fit in memory", size),
        })?;
        Ok(self.reader.read_exact_at(offset, len).await?)
    }

    /// Read an integer array (Byte, Short, Long or Long8) widened to u64.
    pub async fn read_u64_array(
        &self,
        entry: &IfdEntry,
        tag: TiffTag,
    ) -> Result<Vec<u64>, TiffError> {
        let field_type = entry
            .field_type
            .ok_or(TiffError::UnknownFieldType(entry.field_type_raw))?;

        if entry.count == 0 {
            return Ok(Vec::new());
        }

        let bytes = self.read_bytes(entry).await?;
        parse_u64_array(&bytes, field_type, self.header.byte_order).ok_or_else(|| {
            TiffError::InvalidTagValue {
                tag: tag.name(),
                message: format!("expected an integer array, got {:?}", field_type),
            }
        })
    }

    /// Read a single integer value.
    pub async fn read_u64(&self, entry: &IfdEntry, tag: TiffTag) -> Result<u64, TiffError> {
        if entry.count != 1 {
            return Err(TiffError::InvalidTagValue {
                tag: tag.name(),
                message: format!("expected count 1, got {}", entry.count),
            });
        }

        self.read_u64_array(entry, tag)
            .await?
            .first()
            .copied()
            .ok_or(TiffError::MissingTag(tag.name()))
    }

    /// Read an ASCII value, dropping the NUL terminator and anything after it.
    pub async fn read_string(&self, entry: &IfdEntry) -> Result<String, TiffError> {
        let bytes = self.read_bytes(entry).await?;
        let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
        Ok(String::from_utf8_lossy(&bytes[..end]).into_owned())
    }
}

/// Parse an integer array from raw bytes.
///
/// Returns `None` for non-integer field types.
pub fn parse_u64_array(bytes: &[u8], field_type: FieldType, byte_order: ByteOrder) -> Option<Vec<u64>> {
    let width = field_type.size_in_bytes();
    let values = match field_type {
        FieldType::Byte => bytes.iter().map(|&b| b as u64).collect(),
        FieldType::Short => bytes
            .chunks_exact(width)
            .map(|c| byte_order.read_u16(c) as u64)
            .collect(),
        FieldType::Long => bytes
            .chunks_exact(width)
            .map(|c| byte_order.read_u32(c) as u64)
            .collect(),
        FieldType::Long8 => bytes
            .chunks_exact(width)
            .map(|c| byte_order.read_u64(c))
            .collect(),
        FieldType::Ascii | FieldType::Undefined => return None,
    };
    Some(values)
}
