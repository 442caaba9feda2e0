//! This module defines the `CascSpanHeader` struct, the 30-byte header that
//! precedes each stored span inside a `data.NNN` archive.

use crate::content_key::{ContentKey, KEY_LENGTH};
use crate::error::CascError;
use crate::ext::io_ext::SliceCursorExt;
use std::io::Cursor;

/// Size of a [`CascSpanHeader`] on disk.
pub(crate) const CASC_SPAN_HEADER_SIZE: usize = 30;

/// Represents the header for a span of data in a CASC archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct CascSpanHeader {
    /// The encoding key for the span, stored byte-reversed.
    pub(crate) encoding_key: [u8; 16],
    /// The size of the span in bytes, this header included.
    pub(crate) size: u32,
    /// Flags associated with the span.
    #[allow(dead_code)]
    pub(crate) flags: u16,
    /// Jenkins hash of the span data.
    #[allow(dead_code)]
    pub(crate) jenkins_hash: u32,
    /// Checksum for data integrity verification.
    #[allow(dead_code)]
    pub(crate) checksum: u32,
}

impl CascSpanHeader {
    pub(crate) fn read(bytes: &[u8]) -> Result<Self, CascError> {
        let mut cursor = Cursor::new(bytes);
        let mut encoding_key = [0u8; 16];
        encoding_key.copy_from_slice(cursor.read_slice(16)?);
        Ok(Self {
            encoding_key,
            size: cursor.read_uint_le(4)? as u32,
            flags: cursor.read_uint_le(2)? as u16,
            jenkins_hash: cursor.read_uint_le(4)? as u32,
            checksum: cursor.read_uint_le(4)? as u32,
        })
    }

    /// The storage key this span was written under.
    pub(crate) fn key(&self) -> ContentKey {
        let mut key = [0u8; KEY_LENGTH];
        for (dst, src) in key.iter_mut().zip(self.encoding_key.iter().rev()) {
            *dst = *src;
        }
        ContentKey::new(key)
    }
}
