use crate::content_key::ContentKey;
use crate::error::CascError;
use crate::path_fragment::PathFragment;
use crate::span_info::SpanInfo;
use crate::storage::Storage;
use std::fmt;
use std::sync::Arc;

/// What a resolved path points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathTarget {
    /// A regular file assembled from one or more stored spans.
    File { spans: Vec<SpanInfo>, size: u64 },
    /// The root table of another TVFS, mounted separately with
    /// [`VirtualFileSystem::mount_nested`](crate::VirtualFileSystem::mount_nested).
    NestedContainer { root: ContentKey, size: u64 },
}

/// The outcome of resolving one path.
///
/// Results are independent of each other and of the file system that
/// produced them; reading only needs the shared [`Storage`].
#[derive(Clone)]
pub struct PathResult {
    path: String,
    fragments: Vec<PathFragment>,
    target: PathTarget,
    storage: Arc<Storage>,
}

impl PathResult {
    pub(crate) fn new(fragments: Vec<PathFragment>, target: PathTarget, storage: Arc<Storage>) -> Self {
        Self {
            path: PathFragment::join(&fragments),
            fragments,
            target,
            storage,
        }
    }

    /// The normalized `/`-separated, lowercase path.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn fragments(&self) -> &[PathFragment] {
        &self.fragments
    }

    pub fn target(&self) -> &PathTarget {
        &self.target
    }

    pub fn file_size(&self) -> u64 {
        match &self.target {
            PathTarget::File { size, .. } | PathTarget::NestedContainer { size, .. } => *size,
        }
    }

    pub fn is_file(&self) -> bool {
        matches!(self.target, PathTarget::File { .. })
    }

    /// Whether this path is the root of a nested TVFS.
    pub fn is_tvfs(&self) -> bool {
        matches!(self.target, PathTarget::NestedContainer { .. })
    }

    /// The key of the first span, or of the nested root table.
    pub fn storage_key(&self) -> ContentKey {
        match &self.target {
            PathTarget::File { spans, .. } => spans[0].key,
            PathTarget::NestedContainer { root, .. } => *root,
        }
    }

    /// Every key that must be present locally to read this path.
    pub fn keys(&self) -> Vec<ContentKey> {
        match &self.target {
            PathTarget::File { spans, .. } => spans.iter().map(|span| span.key).collect(),
            PathTarget::NestedContainer { root, .. } => vec![*root],
        }
    }

    /// Whether every backing key is in the local storage index. A path can be a
    /// valid TVFS entry whose content was never downloaded.
    pub fn exists_in_storage(&self) -> bool {
        self.keys().iter().all(|key| self.storage.contains_key(key))
    }

    /// Reads and decodes the content behind this path, concatenating spans in order.
    pub fn read_file(&self) -> Result<Vec<u8>, CascError> {
        match &self.target {
            PathTarget::File { spans, .. } => {
                let mut content = Vec::new();
                for span in spans {
                    let decoded = self.storage.read_content(&span.key)?;
                    if decoded.len() as u64 != u64::from(span.content_size) {
                        return Err(CascError::malformed(format!(
                            "span {} of {} decoded to {} bytes, expected {}",
                            span.key,
                            self.path,
                            decoded.len(),
                            span.content_size
                        )));
                    }
                    content.extend(decoded);
                }
                Ok(content)
            }
            PathTarget::NestedContainer { root, .. } => self.storage.read_content(root),
        }
    }

    pub(crate) fn storage(&self) -> &Arc<Storage> {
        &self.storage
    }
}

impl fmt::Debug for PathResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PathResult")
            .field("path", &self.path)
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}

impl PartialEq for PathResult {
    fn eq(&self, other: &Self) -> bool {
        self.fragments == other.fragments
            && self.target == other.target
            && Arc::ptr_eq(&self.storage, &other.storage)
    }
}

impl Eq for PathResult {}
