use crate::error::CascError;
use crate::ext::io_ext::SliceCursorExt;
use std::io::Cursor;

/// Size of one frame table entry on disk.
pub(crate) const BLOCK_TABLE_ENTRY_SIZE: u32 = 24;

/// Represents an entry in the CASC block table.
/// Each entry describes one frame of the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct BlockTableEntry {
    /// The encoded (compressed/encrypted) size of the frame, mode byte included.
    pub(crate) encoded_size: u32,
    /// The decoded (original) content size of the frame.
    pub(crate) content_size: u32,
    /// MD5 of the encoded frame.
    pub(crate) hash: [u8; 16],
}

impl BlockTableEntry {
    pub(crate) fn read(cursor: &mut Cursor<&[u8]>) -> Result<Self, CascError> {
        let encoded_size = cursor.read_uint_be(4)? as u32;
        let content_size = cursor.read_uint_be(4)? as u32;
        let mut hash = [0u8; 16];
        hash.copy_from_slice(cursor.read_slice(16)?);
        Ok(Self {
            encoded_size,
            content_size,
            hash,
        })
    }
}
