//! BLTE streams: a block table header, an optional frame table, then frames
//! whose first byte names their encoding.

pub(crate) mod block_table_encoder_type;
pub(crate) mod block_table_entry;
pub(crate) mod block_table_header;

use crate::error::CascError;
use crate::ext::io_ext::SliceCursorExt;
use block_table_encoder_type::BlockTableEncoderType;
use block_table_entry::{BlockTableEntry, BLOCK_TABLE_ENTRY_SIZE};
use block_table_header::{BlockTableHeader, STANDARD_TABLE_FORMAT};
use flate2::read::ZlibDecoder;
use std::io::{Cursor, Read};

pub(crate) use block_table_header::BLTE_SIGNATURE;

/// Decodes a complete BLTE stream into its content bytes.
pub(crate) fn decode_blte(data: &[u8]) -> Result<Vec<u8>, CascError> {
    let mut cursor = Cursor::new(data);
    let header = BlockTableHeader::read(&mut cursor)?;

    if !header.has_table() {
        let frame = cursor.remaining_slice();
        return decode_frame(frame, None);
    }

    if header.table_format != STANDARD_TABLE_FORMAT {
        return Err(CascError::Unsupported(format!(
            "BLTE table format {:#04x}",
            header.table_format
        )));
    }
    if header.frame_count == 0 {
        return Err(CascError::malformed("BLTE frame table is empty"));
    }
    let expected_header_size = 12 + u64::from(header.frame_count) * u64::from(BLOCK_TABLE_ENTRY_SIZE);
    if u64::from(header.header_size) != expected_header_size {
        return Err(CascError::malformed(format!(
            "BLTE header size {} does not match {} frames",
            header.header_size, header.frame_count
        )));
    }

    let frames = (0..header.frame_count)
        .map(|_| BlockTableEntry::read(&mut cursor))
        .collect::<Result<Vec<_>, _>>()?;

    let mut content = Vec::new();
    for frame in &frames {
        let encoded = cursor.read_slice(frame.encoded_size as usize)?;
        let actual = md5::compute(encoded).0;
        if actual != frame.hash {
            return Err(CascError::HashMismatch {
                expected: hex::encode(frame.hash),
                actual: hex::encode(actual),
            });
        }
        content.extend(decode_frame(encoded, Some(frame.content_size))?);
    }
    Ok(content)
}

fn decode_frame(encoded: &[u8], content_size: Option<u32>) -> Result<Vec<u8>, CascError> {
    let (&mode, body) = encoded
        .split_first()
        .ok_or_else(|| CascError::malformed("empty BLTE frame"))?;

    let decoded = match BlockTableEncoderType::from(mode) {
        BlockTableEncoderType::Raw => body.to_vec(),
        BlockTableEncoderType::ZLib => {
            // One byte past the declared size is enough to detect an overrun.
            let limit = content_size.map_or(u64::MAX, |size| u64::from(size) + 1);
            let mut decoded = Vec::new();
            ZlibDecoder::new(body)
                .take(limit)
                .read_to_end(&mut decoded)
                .map_err(|e| CascError::malformed(format!("zlib frame: {e}")))?;
            decoded
        }
        BlockTableEncoderType::Encrypted => {
            return Err(CascError::Unsupported("encrypted BLTE frame".into()))
        }
        BlockTableEncoderType::Frame => {
            return Err(CascError::Unsupported("nested BLTE frame".into()))
        }
        BlockTableEncoderType::Unknown(other) => {
            return Err(CascError::Unsupported(format!("BLTE frame mode {other:#04x}")))
        }
    };

    match content_size {
        Some(expected) if decoded.len() > expected as usize => Err(CascError::malformed(format!(
            "BLTE frame inflates past the {expected} bytes the table declares"
        ))),
        Some(expected) if decoded.len() != expected as usize => Err(CascError::malformed(format!(
            "BLTE frame decoded to {} bytes, table says {expected}",
            decoded.len()
        ))),
        _ => Ok(decoded),
    }
}
