//! Hash-guarded blocks: an 8-byte little-endian header (`length`, `hash`)
//! followed by exactly `length` payload bytes.
//!
//! `.idx` key mapping tables are made of these blocks, and any stored
//! content can be wrapped in one. The hash is lookup3 `hashlittle` over the
//! payload with a zero seed.

use crate::error::CascError;
use crate::ext::io_ext::SliceCursorExt;
use crate::utility::jenkins_hash::hashlittle;
use byteorder::{ByteOrder, LittleEndian};
use std::io::Cursor;

/// Size in bytes of a [`BlockHeader`] on disk.
pub const BLOCK_HEADER_SIZE: usize = 8;

/// The header preceding every guarded block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockHeader {
    pub length: u32,
    pub expected_hash: u32,
}

impl BlockHeader {
    /// Parses a header from the first [`BLOCK_HEADER_SIZE`] bytes of `bytes`.
    pub fn parse(bytes: &[u8]) -> Result<Self, CascError> {
        let header = bytes.get(..BLOCK_HEADER_SIZE).ok_or_else(|| {
            CascError::malformed(format!(
                "block header needs {BLOCK_HEADER_SIZE} bytes, only {} remain",
                bytes.len()
            ))
        })?;
        Ok(Self {
            length: LittleEndian::read_u32(&header[0..4]),
            expected_hash: LittleEndian::read_u32(&header[4..8]),
        })
    }

    pub fn to_bytes(&self) -> [u8; BLOCK_HEADER_SIZE] {
        let mut bytes = [0u8; BLOCK_HEADER_SIZE];
        LittleEndian::write_u32(&mut bytes[0..4], self.length);
        LittleEndian::write_u32(&mut bytes[4..8], self.expected_hash);
        bytes
    }
}

/// A validated payload borrowed from the buffer it was decoded from.
#[derive(Debug, Clone, Copy)]
pub struct BlockView<'a> {
    header: BlockHeader,
    payload: &'a [u8],
    verified: bool,
}

impl<'a> BlockView<'a> {
    pub fn header(&self) -> BlockHeader {
        self.header
    }

    pub fn payload(&self) -> &'a [u8] {
        self.payload
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Whether the payload hash was checked against the header.
    pub fn is_verified(&self) -> bool {
        self.verified
    }
}

/// The outcome of [`decode_block_size`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockSize {
    pub length: u32,
    pub hash_valid: bool,
}

impl BlockSize {
    /// The length, negated when the hash did not match.
    pub fn signed(&self) -> i64 {
        let length = i64::from(self.length);
        if self.hash_valid {
            length
        } else {
            -length
        }
    }
}

/// The checksum a guarded block header stores for `payload`.
pub fn block_hash(payload: &[u8]) -> u32 {
    hashlittle(payload, 0)
}

/// Probes the block at the cursor position without consuming it.
///
/// A hash mismatch is reported through [`BlockSize::hash_valid`] rather than
/// an error. A header or payload that does not fit in the buffer is still a
/// [`CascError::MalformedStructure`].
pub fn decode_block_size(source: &Cursor<&[u8]>) -> Result<BlockSize, CascError> {
    let (header, payload) = split_block(source.remaining_slice())?;
    Ok(BlockSize {
        length: header.length,
        hash_valid: block_hash(payload) == header.expected_hash,
    })
}

/// Reads and verifies the block at the cursor position, advancing past it.
///
/// On failure the cursor is left where it was.
pub fn get_block<'a>(source: &mut Cursor<&'a [u8]>) -> Result<BlockView<'a>, CascError> {
    read_block(source, true)
}

/// Like [`get_block`] but skips the hash comparison. Bounds are still enforced.
pub fn get_block_unverified<'a>(source: &mut Cursor<&'a [u8]>) -> Result<BlockView<'a>, CascError> {
    read_block(source, false)
}

/// Wraps `payload` in a guarded block.
pub fn encode_block(payload: &[u8]) -> Result<Vec<u8>, CascError> {
    let length = u32::try_from(payload.len())
        .map_err(|_| CascError::malformed(format!("payload of {} bytes is too large for a block", payload.len())))?;
    let header = BlockHeader {
        length,
        expected_hash: block_hash(payload),
    };
    let mut block = Vec::with_capacity(BLOCK_HEADER_SIZE + payload.len());
    block.extend_from_slice(&header.to_bytes());
    block.extend_from_slice(payload);
    Ok(block)
}

/// Whether `bytes` is exactly one guarded block, judged by its length field only.
pub(crate) fn is_single_block(bytes: &[u8]) -> bool {
    BlockHeader::parse(bytes)
        .map(|header| header.length as usize == bytes.len() - BLOCK_HEADER_SIZE)
        .unwrap_or(false)
}

fn read_block<'a>(source: &mut Cursor<&'a [u8]>, verify: bool) -> Result<BlockView<'a>, CascError> {
    let (header, payload) = split_block(source.remaining_slice())?;
    if verify {
        let actual = block_hash(payload);
        if actual != header.expected_hash {
            return Err(CascError::hash_mismatch(header.expected_hash, actual));
        }
    }
    source.set_position(source.position() + (BLOCK_HEADER_SIZE + payload.len()) as u64);
    Ok(BlockView {
        header,
        payload,
        verified: verify,
    })
}

fn split_block(bytes: &[u8]) -> Result<(BlockHeader, &[u8]), CascError> {
    let header = BlockHeader::parse(bytes)?;
    let body = &bytes[BLOCK_HEADER_SIZE..];
    let payload = body.get(..header.length as usize).ok_or_else(|| {
        CascError::malformed(format!(
            "block claims {} bytes but only {} remain",
            header.length,
            body.len()
        ))
    })?;
    Ok((header, payload))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn get_block_consumes_header_and_payload() {
        let mut buffer = encode_block(b"first").unwrap();
        buffer.extend(encode_block(b"second block").unwrap());
        let mut cursor = Cursor::new(&buffer[..]);

        let first = get_block(&mut cursor).unwrap();
        assert_eq!(first.payload(), b"first");
        assert!(first.is_verified());
        assert_eq!(cursor.position(), 13);

        let second = get_block(&mut cursor).unwrap();
        assert_eq!(second.payload(), b"second block");
        assert_eq!(cursor.position(), buffer.len() as u64);
    }

    #[test]
    fn oversized_length_is_structural_not_integrity() {
        let mut buffer = BlockHeader {
            length: 1000,
            expected_hash: 0,
        }
        .to_bytes()
        .to_vec();
        buffer.extend_from_slice(&[0xAB; 32]);
        assert_eq!(buffer.len(), 40);

        let mut cursor = Cursor::new(&buffer[..]);
        let err = get_block(&mut cursor).unwrap_err();
        assert!(err.is_malformed(), "{err}");
        assert_eq!(cursor.position(), 0);
        assert!(decode_block_size(&cursor).unwrap_err().is_malformed());
    }

    #[test]
    fn truncated_header_is_malformed() {
        let buffer = [1u8, 0, 0];
        let mut cursor = Cursor::new(&buffer[..]);
        assert!(get_block(&mut cursor).unwrap_err().is_malformed());
    }

    #[test]
    fn size_probe_flags_bad_hash_without_failing() {
        let mut buffer = encode_block(b"payload").unwrap();
        let cursor = Cursor::new(&buffer[..]);
        let probe = decode_block_size(&cursor).unwrap();
        assert_eq!(probe, BlockSize { length: 7, hash_valid: true });
        assert_eq!(probe.signed(), 7);

        buffer[BLOCK_HEADER_SIZE] ^= 0xFF;
        let cursor = Cursor::new(&buffer[..]);
        let probe = decode_block_size(&cursor).unwrap();
        assert!(!probe.hash_valid);
        assert_eq!(probe.signed(), -7);
        assert_eq!(cursor.position(), 0);
    }

    #[test]
    fn unverified_read_skips_hash() {
        let mut buffer = encode_block(b"payload").unwrap();
        buffer[4] ^= 0x01;
        let mut cursor = Cursor::new(&buffer[..]);
        let view = get_block_unverified(&mut cursor).unwrap();
        assert_eq!(view.payload(), b"payload");
        assert!(!view.is_verified());
    }

    #[test]
    fn single_block_detection() {
        let block = encode_block(b"abc").unwrap();
        assert!(is_single_block(&block));
        assert!(!is_single_block(&block[..block.len() - 1]));
        assert!(!is_single_block(b"short"));
    }

    proptest! {
        #[test]
        fn round_trip_returns_payload(payload in prop::collection::vec(any::<u8>(), 0..2048)) {
            let block = encode_block(&payload).unwrap();
            let mut cursor = Cursor::new(&block[..]);
            let view = get_block(&mut cursor).unwrap();
            prop_assert_eq!(view.payload(), &payload[..]);
            prop_assert_eq!(cursor.position(), block.len() as u64);
        }

        #[test]
        fn any_single_byte_corruption_is_a_hash_mismatch(
            payload in prop::collection::vec(any::<u8>(), 1..512),
            index in any::<prop::sample::Index>(),
            flip in 1u8..=255,
        ) {
            let mut block = encode_block(&payload).unwrap();
            let target = BLOCK_HEADER_SIZE + index.index(payload.len());
            block[target] ^= flip;
            let mut cursor = Cursor::new(&block[..]);
            let err = get_block(&mut cursor).unwrap_err();
            prop_assert!(err.is_hash_mismatch(), "{}", err);
        }
    }
}
