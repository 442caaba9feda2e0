use crate::error::CascError;
use std::fmt;
use std::str::FromStr;

/// Number of key bytes local storage tracks; longer keys are truncated to this.
pub const KEY_LENGTH: usize = 9;

/// A fixed-width content key, the lookup key of the storage index.
///
/// Local `.idx` files and TVFS container tables only keep the first nine
/// bytes of an encoding key, so full 16-byte keys from configuration files
/// are truncated on construction.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentKey([u8; KEY_LENGTH]);

impl ContentKey {
    pub const fn new(bytes: [u8; KEY_LENGTH]) -> Self {
        Self(bytes)
    }

    /// Builds a key from at least [`KEY_LENGTH`] bytes, ignoring the rest.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CascError> {
        let head = bytes.get(..KEY_LENGTH).ok_or_else(|| {
            CascError::malformed(format!("key of {} bytes is shorter than {KEY_LENGTH}", bytes.len()))
        })?;
        let mut key = [0u8; KEY_LENGTH];
        key.copy_from_slice(head);
        Ok(Self(key))
    }

    /// Parses a hex string such as a configuration `vfs-root` value.
    pub fn from_hex(text: &str) -> Result<Self, CascError> {
        let bytes = hex::decode(text.trim())
            .map_err(|e| CascError::malformed(format!("invalid hex key {text:?}: {e}")))?;
        Self::from_slice(&bytes)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LENGTH] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|&b| b == 0)
    }
}

impl FromStr for ContentKey {
    type Err = CascError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl fmt::Display for ContentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for ContentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentKey({self})")
    }
}
