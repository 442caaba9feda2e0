//! Module for handling CASC key mapping tables (`.idx` files), which map
//! keys to archive ids, offsets and sizes.
//!
//! A table is two hash-guarded blocks: a 16-byte header describing the
//! entry field widths, then, on the next 16-byte boundary, the packed
//! entries themselves.

use crate::content_key::{ContentKey, KEY_LENGTH};
use crate::error::CascError;
use crate::guarded_block::{get_block, get_block_unverified, BlockView};
use crate::storage_index::StorageIndexEntry;
use byteorder::{BigEndian, ByteOrder, LittleEndian};
use std::io::Cursor;

const HEADER_PAYLOAD_SIZE: usize = 16;
const ENTRY_BLOCK_ALIGNMENT: u64 = 0x10;

/// Represents the header of a CASC key mapping table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct CascKeyMappingTable {
    /// The version of the key mapping table format.
    pub(crate) version: u16,
    /// The bucket index used for hashing.
    pub(crate) bucket_index: u8,
    /// The length in bytes of the encoded size field.
    pub(crate) encoded_size_length: u8,
    /// The length in bytes of the storage offset field.
    pub(crate) storage_offset_length: u8,
    /// The length in bytes of the encoding key.
    pub(crate) encoding_key_length: u8,
    /// The number of bits used for the file offset.
    pub(crate) file_offset_bits: u8,
    /// Maximum size of one archive segment.
    pub(crate) segment_size: u64,
}

impl CascKeyMappingTable {
    fn parse(payload: &[u8]) -> Result<Self, CascError> {
        if payload.len() < HEADER_PAYLOAD_SIZE {
            return Err(CascError::malformed(format!(
                "key mapping table header is {} bytes, expected {HEADER_PAYLOAD_SIZE}",
                payload.len()
            )));
        }
        let table = Self {
            version: LittleEndian::read_u16(&payload[0..2]),
            bucket_index: payload[2],
            encoded_size_length: payload[4],
            storage_offset_length: payload[5],
            encoding_key_length: payload[6],
            file_offset_bits: payload[7],
            segment_size: LittleEndian::read_u64(&payload[8..16]),
        };
        table.validate()?;
        Ok(table)
    }

    fn validate(&self) -> Result<(), CascError> {
        let key_ok = (KEY_LENGTH..=16).contains(&usize::from(self.encoding_key_length));
        let offset_ok = (1..=8).contains(&self.storage_offset_length);
        let size_ok = (1..=8).contains(&self.encoded_size_length);
        let bits_ok = self.file_offset_bits > 0
            && u32::from(self.file_offset_bits) < u32::from(self.storage_offset_length) * 8;
        if key_ok && offset_ok && size_ok && bits_ok {
            Ok(())
        } else {
            Err(CascError::malformed(format!(
                "invalid data sizes in key mapping table: key {}, offset {}, size {}, offset bits {}",
                self.encoding_key_length,
                self.storage_offset_length,
                self.encoded_size_length,
                self.file_offset_bits
            )))
        }
    }

    pub(crate) fn entry_size(&self) -> usize {
        usize::from(self.encoding_key_length)
            + usize::from(self.storage_offset_length)
            + usize::from(self.encoded_size_length)
    }

    /// Parses a whole `.idx` file, returning its header and every non-empty entry.
    pub(crate) fn read(bytes: &[u8], verify: bool) -> Result<(Self, Vec<StorageIndexEntry>), CascError> {
        let mut cursor = Cursor::new(bytes);
        let header_block = Self::next_block(&mut cursor, verify)?;
        let table = Self::parse(header_block.payload())?;

        let aligned = (cursor.position() + ENTRY_BLOCK_ALIGNMENT - 1) & !(ENTRY_BLOCK_ALIGNMENT - 1);
        if aligned > bytes.len() as u64 {
            return Err(CascError::malformed("key mapping table ends before its entry block"));
        }
        cursor.set_position(aligned);
        let entry_block = Self::next_block(&mut cursor, verify)?;

        let entry_size = table.entry_size();
        if entry_block.len() % entry_size != 0 {
            return Err(CascError::malformed(format!(
                "entry block of {} bytes is not a multiple of the {entry_size} byte entry size",
                entry_block.len()
            )));
        }

        let mut entries = Vec::with_capacity(entry_block.len() / entry_size);
        for chunk in entry_block.payload().chunks_exact(entry_size) {
            if let Some(entry) = table.parse_entry(chunk)? {
                entries.push(entry);
            }
        }
        Ok((table, entries))
    }

    fn next_block<'a>(cursor: &mut Cursor<&'a [u8]>, verify: bool) -> Result<BlockView<'a>, CascError> {
        if verify {
            get_block(cursor)
        } else {
            get_block_unverified(cursor)
        }
    }

    /// Decodes one packed entry; all-zero keys mark unused slots.
    fn parse_entry(&self, buffer: &[u8]) -> Result<Option<StorageIndexEntry>, CascError> {
        let key_length = usize::from(self.encoding_key_length);
        let offset_length = usize::from(self.storage_offset_length);
        let size_length = usize::from(self.encoded_size_length);

        let key = ContentKey::from_slice(&buffer[..key_length])?;
        if key.is_zero() {
            return Ok(None);
        }

        let packed_offset_and_index =
            BigEndian::read_uint(&buffer[key_length..key_length + offset_length], offset_length);
        let size = LittleEndian::read_uint(&buffer[key_length + offset_length..], size_length);

        let file_offset_mask = (1u64 << self.file_offset_bits) - 1;
        let archive_id = u16::try_from(packed_offset_and_index >> self.file_offset_bits).map_err(|_| {
            CascError::malformed(format!("archive index out of range for key {key}"))
        })?;

        Ok(Some(StorageIndexEntry {
            key,
            archive_id,
            offset: packed_offset_and_index & file_offset_mask,
            size,
        }))
    }
}
