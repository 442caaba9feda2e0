use crate::content_key::ContentKey;

/// One contiguous piece of a TVFS file, stored under its own key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpanInfo {
    /// Key of the stored span in the storage index.
    pub key: ContentKey,
    /// Offset of this span within the reassembled file.
    pub file_offset: u32,
    /// Decoded size of the span.
    pub content_size: u32,
}
