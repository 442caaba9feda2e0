//! The TVFS directory tree of one root table, resolved by case-insensitive path.
//!
//! Nodes live in a flat arena and refer to each other by index. The tree
//! is built once from the parsed path table and never changes afterwards, so
//! a mounted file system can be shared freely between threads.

use crate::content_key::ContentKey;
use crate::error::CascError;
use crate::path_fragment::PathFragment;
use crate::path_result::{PathResult, PathTarget};
use crate::span_info::SpanInfo;
use crate::storage::Storage;
use crate::tvfs_root_handler::{TVFSRootHandler, TvfsHeader, TvfsLeaf};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct NodeId(usize);

const ROOT: NodeId = NodeId(0);

#[derive(Debug)]
enum TvfsNode {
    Directory { children: BTreeMap<PathFragment, NodeId> },
    File { spans: Vec<SpanInfo>, size: u64 },
    NestedContainer { root: ContentKey, size: u64 },
}

/// A mounted TVFS root.
#[derive(Debug)]
pub struct VirtualFileSystem {
    storage: Arc<Storage>,
    root_key: ContentKey,
    header: TvfsHeader,
    nested_keys: HashSet<ContentKey>,
    nodes: Vec<TvfsNode>,
    leaf_count: usize,
}

impl VirtualFileSystem {
    /// Reads the root table stored under `root_key` and builds its tree.
    pub fn mount(storage: Arc<Storage>, root_key: ContentKey) -> Result<Self, CascError> {
        Self::mount_with_nested(storage, root_key, std::iter::empty())
    }

    /// Like [`mount`](Self::mount), treating leaves whose first span is one of
    /// `nested_keys` as nested containers instead of files.
    pub fn mount_with_nested<I>(storage: Arc<Storage>, root_key: ContentKey, nested_keys: I) -> Result<Self, CascError>
    where
        I: IntoIterator<Item = ContentKey>,
    {
        let table = storage.read_content(&root_key)?;
        Self::from_table(storage, root_key, &table, nested_keys.into_iter().collect())
    }

    fn from_table(
        storage: Arc<Storage>,
        root_key: ContentKey,
        table: &[u8],
        nested_keys: HashSet<ContentKey>,
    ) -> Result<Self, CascError> {
        let handler = TVFSRootHandler::new(table)?;
        let mut vfs = Self {
            storage,
            root_key,
            header: handler.header().clone(),
            nested_keys,
            nodes: vec![TvfsNode::Directory {
                children: BTreeMap::new(),
            }],
            leaf_count: 0,
        };
        for leaf in handler.leaves()? {
            vfs.insert_leaf(leaf)?;
        }
        debug!(
            root = %root_key,
            leaves = vfs.leaf_count,
            nodes = vfs.nodes.len(),
            "TVFS mounted"
        );
        Ok(vfs)
    }

    fn insert_leaf(&mut self, leaf: TvfsLeaf) -> Result<(), CascError> {
        let fragments = PathFragment::split_path(&leaf.path);
        let Some((name, parents)) = fragments.split_last() else {
            return Err(CascError::malformed(format!("TVFS entry {:?} has an empty path", leaf.path)));
        };

        let mut current = ROOT;
        for (depth, fragment) in parents.iter().enumerate() {
            current = match self.child(current, fragment) {
                Some(child) if matches!(self.nodes[child.0], TvfsNode::Directory { .. }) => child,
                Some(_) => {
                    return Err(CascError::malformed(format!(
                        "{} is both a file and a directory",
                        PathFragment::join(&fragments[..=depth])
                    )))
                }
                None => self.add_child(
                    current,
                    fragment.clone(),
                    TvfsNode::Directory {
                        children: BTreeMap::new(),
                    },
                ),
            };
        }

        if let Some(existing) = self.child(current, name) {
            return match self.nodes[existing.0] {
                TvfsNode::Directory { .. } => Err(CascError::malformed(format!(
                    "{} is both a file and a directory",
                    PathFragment::join(&fragments)
                ))),
                _ => {
                    warn!(path = %PathFragment::join(&fragments), "duplicate TVFS entry, keeping the first");
                    Ok(())
                }
            };
        }

        let size = leaf.spans.iter().map(|span| u64::from(span.content_size)).sum();
        let nested_root = leaf
            .spans
            .first()
            .map(|span| span.key)
            .filter(|key| self.nested_keys.contains(key));
        let node = match nested_root {
            Some(root) => TvfsNode::NestedContainer { root, size },
            None => TvfsNode::File { spans: leaf.spans, size },
        };
        self.add_child(current, name.clone(), node);
        self.leaf_count += 1;
        Ok(())
    }

    fn child(&self, parent: NodeId, fragment: &PathFragment) -> Option<NodeId> {
        match &self.nodes[parent.0] {
            TvfsNode::Directory { children } => children.get(fragment).copied(),
            _ => None,
        }
    }

    fn add_child(&mut self, parent: NodeId, fragment: PathFragment, node: TvfsNode) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(node);
        if let TvfsNode::Directory { children } = &mut self.nodes[parent.0] {
            children.insert(fragment, id);
        }
        id
    }

    pub fn root_key(&self) -> ContentKey {
        self.root_key
    }

    pub fn header(&self) -> &TvfsHeader {
        &self.header
    }

    pub fn storage(&self) -> &Arc<Storage> {
        &self.storage
    }

    /// Number of files and nested containers in the tree.
    pub fn len(&self) -> usize {
        self.leaf_count
    }

    pub fn is_empty(&self) -> bool {
        self.leaf_count == 0
    }

    /// Resolves `path`, accepting `/` or `\` separators in any letter case.
    ///
    /// Fails with [`CascError::NotFound`] when a component is missing or the
    /// path ends at a directory, and with [`CascError::Unsupported`] when the
    /// path continues into a nested container.
    pub fn resolve_path(&self, path: &str) -> Result<PathResult, CascError> {
        self.resolve_fragments(&PathFragment::split_path(path))
    }

    pub fn resolve_fragments(&self, fragments: &[PathFragment]) -> Result<PathResult, CascError> {
        let mut current = ROOT;
        for (depth, fragment) in fragments.iter().enumerate() {
            current = match &self.nodes[current.0] {
                TvfsNode::Directory { children } => *children.get(fragment).ok_or_else(|| {
                    CascError::NotFound(PathFragment::join(&fragments[..=depth]))
                })?,
                TvfsNode::File { .. } => {
                    return Err(CascError::NotFound(format!(
                        "{} (parent {} is a file)",
                        PathFragment::join(fragments),
                        PathFragment::join(&fragments[..depth])
                    )))
                }
                TvfsNode::NestedContainer { .. } => {
                    return Err(CascError::Unsupported(format!(
                        "{} lies inside nested container {}; mount it and resolve from its root",
                        PathFragment::join(fragments),
                        PathFragment::join(&fragments[..depth])
                    )))
                }
            };
        }

        self.leaf_result(fragments.to_vec(), current).ok_or_else(|| {
            CascError::NotFound(format!("{} is a directory", PathFragment::join(fragments)))
        })
    }

    /// Resolves `path`, returning `None` instead of an error when it does not
    /// name a file or nested container.
    pub fn find(&self, path: &str) -> Option<PathResult> {
        self.resolve_path(path).ok()
    }

    /// Whether `path` is a file whose every span is present in local storage.
    pub fn is_file_available(&self, path: &str) -> bool {
        self.find(path)
            .is_some_and(|result| result.is_file() && result.exists_in_storage())
    }

    /// Mounts the nested container a previous resolution pointed at.
    pub fn mount_nested(&self, container: &PathResult) -> Result<VirtualFileSystem, CascError> {
        match container.target() {
            PathTarget::NestedContainer { root, .. } => Self::mount_with_nested(
                Arc::clone(container.storage()),
                *root,
                self.nested_keys.iter().copied(),
            ),
            PathTarget::File { .. } => Err(CascError::Unsupported(format!(
                "{} is a file, not a nested container",
                container.path()
            ))),
        }
    }

    /// Walks the whole tree, yielding every file and nested container in
    /// pre-order with children sorted by name.
    ///
    /// Nothing is cached: each call repeats the walk, so prefer
    /// [`resolve_path`](Self::resolve_path) when the path is known.
    pub fn enumerate_all(&self) -> Leaves<'_> {
        Leaves {
            vfs: self,
            stack: vec![(ROOT, Vec::new())],
        }
    }

    fn leaf_result(&self, fragments: Vec<PathFragment>, id: NodeId) -> Option<PathResult> {
        let target = match &self.nodes[id.0] {
            TvfsNode::Directory { .. } => return None,
            TvfsNode::File { spans, size } => PathTarget::File {
                spans: spans.clone(),
                size: *size,
            },
            TvfsNode::NestedContainer { root, size } => PathTarget::NestedContainer {
                root: *root,
                size: *size,
            },
        };
        Some(PathResult::new(fragments, target, Arc::clone(&self.storage)))
    }
}

/// Iterator returned by [`VirtualFileSystem::enumerate_all`].
pub struct Leaves<'a> {
    vfs: &'a VirtualFileSystem,
    stack: Vec<(NodeId, Vec<PathFragment>)>,
}

impl Iterator for Leaves<'_> {
    type Item = PathResult;

    fn next(&mut self) -> Option<PathResult> {
        while let Some((id, fragments)) = self.stack.pop() {
            match &self.vfs.nodes[id.0] {
                TvfsNode::Directory { children } => {
                    for (name, child) in children.iter().rev() {
                        let mut path = fragments.clone();
                        path.push(name.clone());
                        self.stack.push((*child, path));
                    }
                }
                _ => return self.vfs.leaf_result(fragments, id),
            }
        }
        None
    }
}
