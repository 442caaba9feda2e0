//! Turns the bytes stored for a key into content.
//!
//! A stored range is one of, checked in this order:
//! - a [`CascSpanHeader`] followed by a BLTE stream,
//! - a bare BLTE stream,
//! - exactly one hash-guarded block,
//! - plain bytes, returned unchanged.

use crate::block_table::{decode_blte, BLTE_SIGNATURE};
use crate::casc_span_header::{CascSpanHeader, CASC_SPAN_HEADER_SIZE};
use crate::content_key::ContentKey;
use crate::error::CascError;
use crate::guarded_block::{get_block, is_single_block};
use std::io::Cursor;

/// Decodes `raw` stored bytes. When `expected_key` is given, a span header
/// naming a different key is rejected.
pub fn decode_content(raw: &[u8], expected_key: Option<&ContentKey>) -> Result<Vec<u8>, CascError> {
    if has_signature_at(raw, CASC_SPAN_HEADER_SIZE) {
        let header = CascSpanHeader::read(raw)?;
        if let Some(expected) = expected_key {
            if header.key() != *expected {
                return Err(CascError::malformed(format!(
                    "span header names key {} instead of {expected}",
                    header.key()
                )));
            }
        }
        let end = header.size as usize;
        let blte = raw.get(CASC_SPAN_HEADER_SIZE..end).ok_or_else(|| {
            CascError::malformed(format!(
                "span header size {end} does not fit the {} stored bytes",
                raw.len()
            ))
        })?;
        return decode_blte(blte);
    }

    if has_signature_at(raw, 0) {
        return decode_blte(raw);
    }

    if is_single_block(raw) {
        let mut cursor = Cursor::new(raw);
        return Ok(get_block(&mut cursor)?.payload().to_vec());
    }

    Ok(raw.to_vec())
}

fn has_signature_at(raw: &[u8], offset: usize) -> bool {
    raw.get(offset..offset + BLTE_SIGNATURE.len()) == Some(&BLTE_SIGNATURE[..])
}
