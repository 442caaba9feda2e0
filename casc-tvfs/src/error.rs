use thiserror::Error;

/// Represents all possible errors that can occur in the CASC library.
///
/// Every variant is terminal for the operation that produced it; nothing in
/// the crate retries internally. Failures of one file never poison shared
/// state, so bulk callers can skip the item and continue.
#[derive(Debug, Error)]
pub enum CascError {
    /// The binary or text data violates the expected layout: truncated
    /// headers, out-of-bounds lengths, dangling table references, missing
    /// required records or folders.
    #[error("Malformed structure: {0}")]
    MalformedStructure(String),
    /// A payload failed integrity verification.
    #[error("Hash mismatch: expected {expected}, computed {actual}")]
    HashMismatch { expected: String, actual: String },
    /// A path or key that the caller asked to resolve definitely has no entry.
    #[error("Not found: {0}")]
    NotFound(String),
    /// The data is well formed but uses a feature this crate does not read.
    #[error("Unsupported: {0}")]
    Unsupported(String),
    /// A read was attempted after the owning storage was closed.
    #[error("Storage has been closed")]
    StorageClosed,
    /// Represents an error that occurs during I/O operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CascError {
    pub(crate) fn malformed(message: impl Into<String>) -> Self {
        CascError::MalformedStructure(message.into())
    }

    pub(crate) fn hash_mismatch(expected: impl std::fmt::LowerHex, actual: impl std::fmt::LowerHex) -> Self {
        CascError::HashMismatch {
            expected: format!("{expected:08x}"),
            actual: format!("{actual:08x}"),
        }
    }

    /// Returns `true` for [`CascError::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, CascError::NotFound(_))
    }

    /// Returns `true` for [`CascError::MalformedStructure`].
    pub fn is_malformed(&self) -> bool {
        matches!(self, CascError::MalformedStructure(_))
    }

    /// Returns `true` for [`CascError::HashMismatch`].
    pub fn is_hash_mismatch(&self) -> bool {
        matches!(self, CascError::HashMismatch { .. })
    }
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, CascError>;
