use crate::casc_key_mapping_table::CascKeyMappingTable;
use crate::content_key::ContentKey;
use crate::error::CascError;
use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// Where the bytes stored under a key live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StorageIndexEntry {
    pub key: ContentKey,
    /// Number of the `data.NNN` archive holding the bytes.
    pub archive_id: u16,
    /// Byte offset within the archive.
    pub offset: u64,
    /// Number of stored bytes.
    pub size: u64,
}

impl StorageIndexEntry {
    /// The offset one past the last stored byte, if it fits in a `u64`.
    pub fn end(&self) -> Option<u64> {
        self.offset.checked_add(self.size)
    }
}

/// Exact-match map from key to storage location, built once at open time.
#[derive(Debug, Default, Clone)]
pub struct StorageIndex {
    entries: HashMap<ContentKey, StorageIndexEntry>,
}

impl StorageIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn locate(&self, key: &ContentKey) -> Option<&StorageIndexEntry> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &ContentKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &StorageIndexEntry> {
        self.entries.values()
    }

    /// Adds an entry unless its key is already indexed. Returns whether it was added.
    pub fn insert(&mut self, entry: StorageIndexEntry) -> bool {
        match self.entries.entry(entry.key) {
            Entry::Occupied(_) => {
                trace!(key = %entry.key, "duplicate index key, keeping the first location");
                false
            }
            Entry::Vacant(slot) => {
                slot.insert(entry);
                true
            }
        }
    }

    /// Merges the entries of one `.idx` table. Returns how many were added.
    pub fn load_table(&mut self, bytes: &[u8], verify: bool) -> Result<usize, CascError> {
        let (table, entries) = CascKeyMappingTable::read(bytes, verify)?;
        let added = entries.into_iter().filter(|entry| self.insert(*entry)).count();
        trace!(
            bucket = table.bucket_index,
            version = table.version,
            segment_size = table.segment_size,
            added,
            "loaded key mapping table"
        );
        Ok(added)
    }

    /// Builds the index from every `.idx` file in `data_path`, taking only the
    /// newest version of each bucket.
    pub fn load_directory<P: AsRef<Path>>(data_path: P, verify: bool) -> Result<Self, CascError> {
        let data_path = data_path.as_ref();
        let mut newest: BTreeMap<u8, (u32, PathBuf)> = BTreeMap::new();

        for entry in fs::read_dir(data_path)? {
            let path = entry?.path();
            let is_idx = path
                .extension()
                .map(|ext| ext.eq_ignore_ascii_case("idx"))
                .unwrap_or(false);
            if !is_idx || !path.is_file() {
                continue;
            }
            let Some((bucket, version)) = path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .and_then(parse_index_name)
            else {
                trace!(path = %path.display(), "skipping index file with an unrecognized name");
                continue;
            };
            match newest.get(&bucket) {
                Some((current, _)) if *current >= version => {}
                _ => {
                    newest.insert(bucket, (version, path));
                }
            }
        }

        let mut index = Self::new();
        for (bucket, (version, path)) in &newest {
            let bytes = fs::read(path)?;
            let added = index.load_table(&bytes, verify).map_err(|e| match e {
                CascError::MalformedStructure(message) => {
                    CascError::malformed(format!("{}: {message}", path.display()))
                }
                other => other,
            })?;
            debug!(bucket, version, added, "index bucket loaded");
        }
        debug!(tables = newest.len(), entries = index.len(), "storage index built");
        Ok(index)
    }
}

impl FromIterator<StorageIndexEntry> for StorageIndex {
    fn from_iter<I: IntoIterator<Item = StorageIndexEntry>>(iter: I) -> Self {
        let mut index = Self::new();
        for entry in iter {
            index.insert(entry);
        }
        index
    }
}

/// Splits an index file stem like `0300000002` into bucket `0x03` and version `2`.
fn parse_index_name(stem: &str) -> Option<(u8, u32)> {
    if stem.len() != 10 || !stem.is_ascii() {
        return None;
    }
    let bucket = u8::from_str_radix(&stem[..2], 16).ok()?;
    let version = u32::from_str_radix(&stem[2..], 16).ok()?;
    Some((bucket, version))
}
