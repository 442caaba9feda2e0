/// Represents the encoding type used for frames in the block table.
///
/// The first byte of every encoded frame says how the rest is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BlockTableEncoderType {
    /// Plain raw data, uncompressed and unencrypted.
    Raw,
    /// Zlib compressed data.
    ZLib,
    /// Encrypted data.
    Encrypted,
    /// A nested BLTE stream.
    Frame,
    /// Unknown or unsupported type, stores the raw byte value.
    Unknown(u8),
}

impl From<u8> for BlockTableEncoderType {
    fn from(byte: u8) -> Self {
        match byte {
            0x4E => BlockTableEncoderType::Raw,
            0x5A => BlockTableEncoderType::ZLib,
            0x45 => BlockTableEncoderType::Encrypted,
            0x46 => BlockTableEncoderType::Frame,
            other => BlockTableEncoderType::Unknown(other),
        }
    }
}
