use std::borrow::Borrow;
use std::fmt;

/// A single case-folded path component.
///
/// Paths may use `/` or `\` as separators and resolve case-insensitively, so
/// every component is lowercased on construction and empty components are
/// dropped.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PathFragment(String);

impl PathFragment {
    /// Folds one component. Returns `None` for an empty component.
    pub fn new(component: &str) -> Option<Self> {
        if component.is_empty() {
            None
        } else {
            Some(Self(component.to_lowercase()))
        }
    }

    /// Splits a path on both separator styles into folded fragments.
    pub fn split_path(path: &str) -> Vec<PathFragment> {
        path.split(['/', '\\']).filter_map(Self::new).collect()
    }

    /// Joins fragments back into a `/`-separated path.
    pub fn join(fragments: &[PathFragment]) -> String {
        fragments
            .iter()
            .map(PathFragment::as_str)
            .collect::<Vec<_>>()
            .join("/")
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PathFragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for PathFragment {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for PathFragment {
    fn borrow(&self) -> &str {
        &self.0
    }
}
