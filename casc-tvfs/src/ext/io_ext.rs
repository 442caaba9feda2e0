use crate::error::CascError;
use byteorder::{BigEndian, ByteOrder, LittleEndian};
use std::io::Cursor;

/// Bounds-checked reads over an in-memory byte cursor.
///
/// Every method either returns data that lies entirely inside the buffer or a
/// [`CascError::MalformedStructure`]; the position only moves on success.
pub(crate) trait SliceCursorExt<'a> {
    /// The bytes between the current position and the end of the buffer.
    fn remaining_slice(&self) -> &'a [u8];

    /// Peeks a single byte without advancing.
    fn peek_byte(&self) -> Result<u8, CascError>;

    /// Skips over the given number of bytes from the current position.
    fn skip(&mut self, count: usize) -> Result<(), CascError>;

    /// Borrows the next `count` bytes and advances past them.
    fn read_slice(&mut self, count: usize) -> Result<&'a [u8], CascError>;

    fn read_byte(&mut self) -> Result<u8, CascError>;

    /// Reads a big-endian unsigned integer of `width` bytes (1..=8).
    fn read_uint_be(&mut self, width: usize) -> Result<u64, CascError>;

    /// Reads a little-endian unsigned integer of `width` bytes (1..=8).
    fn read_uint_le(&mut self, width: usize) -> Result<u64, CascError>;
}

impl<'a> SliceCursorExt<'a> for Cursor<&'a [u8]> {
    fn remaining_slice(&self) -> &'a [u8] {
        let data: &'a [u8] = *self.get_ref();
        let position = usize::try_from(self.position()).unwrap_or(usize::MAX);
        data.get(position..).unwrap_or(&[])
    }

    fn peek_byte(&self) -> Result<u8, CascError> {
        self.remaining_slice()
            .first()
            .copied()
            .ok_or_else(|| CascError::malformed(format!("unexpected end of data at {}", self.position())))
    }

    fn skip(&mut self, count: usize) -> Result<(), CascError> {
        self.read_slice(count).map(|_| ())
    }

    fn read_slice(&mut self, count: usize) -> Result<&'a [u8], CascError> {
        let remaining = self.remaining_slice();
        let slice = remaining.get(..count).ok_or_else(|| {
            CascError::malformed(format!(
                "needed {count} bytes at {}, only {} remain",
                self.position(),
                remaining.len()
            ))
        })?;
        self.set_position(self.position() + count as u64);
        Ok(slice)
    }

    fn read_byte(&mut self) -> Result<u8, CascError> {
        Ok(self.read_slice(1)?[0])
    }

    fn read_uint_be(&mut self, width: usize) -> Result<u64, CascError> {
        check_width(width)?;
        Ok(BigEndian::read_uint(self.read_slice(width)?, width))
    }

    fn read_uint_le(&mut self, width: usize) -> Result<u64, CascError> {
        check_width(width)?;
        Ok(LittleEndian::read_uint(self.read_slice(width)?, width))
    }
}

fn check_width(width: usize) -> Result<(), CascError> {
    if (1..=8).contains(&width) {
        Ok(())
    } else {
        Err(CascError::malformed(format!("unsupported integer width {width}")))
    }
}
