use crate::error::CascError;
use crate::ext::io_ext::SliceCursorExt;
use std::io::Cursor;

/// Signature at the start of every BLTE stream.
pub(crate) const BLTE_SIGNATURE: &[u8; 4] = b"BLTE";
/// The only frame table format this crate reads.
pub(crate) const STANDARD_TABLE_FORMAT: u8 = 0x0F;

/// Block Table Header
/// Represents the header of a block table in a CASC storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct BlockTableHeader {
    /// The size of the header in bytes, signature included. Zero means the
    /// stream is a single frame with no table.
    pub(crate) header_size: u32,
    /// The format version of the table.
    pub(crate) table_format: u8,
    /// The number of frames in the table (stored as a 24-bit integer).
    pub(crate) frame_count: u32,
}

impl BlockTableHeader {
    pub(crate) fn read(cursor: &mut Cursor<&[u8]>) -> Result<Self, CascError> {
        let signature = cursor.read_slice(4)?;
        if signature != BLTE_SIGNATURE {
            return Err(CascError::malformed(format!(
                "invalid BLTE signature {}",
                hex::encode(signature)
            )));
        }
        let header_size = cursor.read_uint_be(4)? as u32;
        if header_size == 0 {
            return Ok(Self {
                header_size,
                table_format: 0,
                frame_count: 1,
            });
        }
        Ok(Self {
            header_size,
            table_format: cursor.read_byte()?,
            frame_count: cursor.read_uint_be(3)? as u32,
        })
    }

    pub(crate) fn has_table(&self) -> bool {
        self.header_size != 0
    }
}
