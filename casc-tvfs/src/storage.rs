//! The storage engine: the key index plus every open archive of a `Data/data` folder.

use crate::content::decode_content;
use crate::content_key::ContentKey;
use crate::data_archive::{DataArchive, IoMode};
use crate::error::CascError;
use crate::storage_index::{StorageIndex, StorageIndexEntry};
use glob::{glob, Pattern};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// Options for [`Storage::open`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageParams {
    /// The folder holding `.idx` files and `data.NNN` archives.
    pub data_path: PathBuf,
    pub io_mode: IoMode,
    /// Check the hash of every `.idx` block while loading the index.
    pub verify_index_blocks: bool,
}

impl StorageParams {
    pub fn new<P: Into<PathBuf>>(data_path: P) -> Self {
        Self {
            data_path: data_path.into(),
            io_mode: IoMode::default(),
            verify_index_blocks: true,
        }
    }

    pub fn with_io_mode(mut self, io_mode: IoMode) -> Self {
        self.io_mode = io_mode;
        self
    }

    pub fn with_index_verification(mut self, verify: bool) -> Self {
        self.verify_index_blocks = verify;
        self
    }
}

/// Open archives and the index that locates keys inside them.
///
/// `Storage` is `Send + Sync`; any number of threads may read through a
/// shared reference. Every read holds a shared guard on the archive table,
/// and [`Storage::close`] takes it exclusively, so closing waits for reads
/// already in flight and every read started afterwards fails with
/// [`CascError::StorageClosed`].
#[derive(Debug)]
pub struct Storage {
    data_path: PathBuf,
    io_mode: IoMode,
    index: StorageIndex,
    archives: RwLock<Option<HashMap<u16, DataArchive>>>,
}

impl Storage {
    /// Builds the index and opens every archive under `params.data_path`.
    pub fn open(params: &StorageParams) -> Result<Self, CascError> {
        let data_path = params.data_path.clone();
        if !data_path.is_dir() {
            return Err(CascError::malformed(format!(
                "data folder {} does not exist",
                data_path.display()
            )));
        }

        let index = StorageIndex::load_directory(&data_path, params.verify_index_blocks)?;
        let archives = Self::load_data_files(&data_path, params.io_mode)?;
        debug!(
            path = %data_path.display(),
            keys = index.len(),
            archives = archives.len(),
            io_mode = ?params.io_mode,
            "storage opened"
        );

        Ok(Self {
            data_path,
            io_mode: params.io_mode,
            index,
            archives: RwLock::new(Some(archives)),
        })
    }

    fn load_data_files(data_path: &Path, io_mode: IoMode) -> Result<HashMap<u16, DataArchive>, CascError> {
        let folder = data_path.to_string_lossy();
        let pattern = format!("{}/data.*", Pattern::escape(&folder));
        let paths = glob(&pattern).map_err(|e| CascError::malformed(format!("archive pattern {pattern}: {e}")))?;

        let mut archives = HashMap::new();
        for entry in paths {
            let path = entry.map_err(|e| CascError::Io(e.into()))?;
            let Some(archive_id) = path
                .extension()
                .and_then(|ext| ext.to_str())
                .and_then(|ext| ext.parse::<u16>().ok())
            else {
                trace!(path = %path.display(), "skipping file without a numeric archive suffix");
                continue;
            };
            archives.insert(archive_id, DataArchive::open(&path, io_mode)?);
        }
        Ok(archives)
    }

    pub fn data_path(&self) -> &Path {
        &self.data_path
    }

    pub fn io_mode(&self) -> IoMode {
        self.io_mode
    }

    pub fn index(&self) -> &StorageIndex {
        &self.index
    }

    /// Looks up where `key` is stored. A missing key is `None`, not an error.
    pub fn locate(&self, key: &ContentKey) -> Option<&StorageIndexEntry> {
        self.index.locate(key)
    }

    pub fn contains_key(&self, key: &ContentKey) -> bool {
        self.index.contains(key)
    }

    /// Reads the raw stored bytes of `entry`.
    pub fn read_entry(&self, entry: &StorageIndexEntry) -> Result<Vec<u8>, CascError> {
        self.with_archive(entry, |archive| archive.read_at(entry.offset, entry.size))
    }

    /// Runs `f` over the raw stored bytes of `entry` without copying them out
    /// of a mapped archive. The storage cannot close while `f` runs.
    pub fn with_entry_bytes<R>(
        &self,
        entry: &StorageIndexEntry,
        f: impl FnOnce(&[u8]) -> R,
    ) -> Result<R, CascError> {
        self.with_archive(entry, |archive| archive.with_slice(entry.offset, entry.size, f))
    }

    fn with_archive<R>(
        &self,
        entry: &StorageIndexEntry,
        read: impl FnOnce(&DataArchive) -> Result<R, CascError>,
    ) -> Result<R, CascError> {
        let guard = self.archives.read();
        let archives = guard.as_ref().ok_or(CascError::StorageClosed)?;
        let archive = archives.get(&entry.archive_id).ok_or_else(|| {
            CascError::malformed(format!(
                "archive data.{:03} for key {} is missing",
                entry.archive_id, entry.key
            ))
        })?;
        read(archive)
    }

    /// Reads the raw stored bytes of `key`.
    pub fn read_key(&self, key: &ContentKey) -> Result<Vec<u8>, CascError> {
        let entry = self.located(key)?;
        self.read_entry(entry)
    }

    /// Reads and decodes the content stored under `key`.
    pub fn read_content(&self, key: &ContentKey) -> Result<Vec<u8>, CascError> {
        let entry = self.located(key)?;
        self.with_entry_bytes(entry, |raw| decode_content(raw, Some(key)))?
    }

    fn located(&self, key: &ContentKey) -> Result<&StorageIndexEntry, CascError> {
        self.locate(key)
            .ok_or_else(|| CascError::NotFound(format!("key {key} is not in local storage")))
    }

    /// Releases every archive handle and mapping once in-flight reads finish.
    /// Closing twice is a no-op.
    pub fn close(&self) {
        let mut guard = self.archives.write();
        if let Some(archives) = guard.take() {
            debug!(path = %self.data_path.display(), archives = archives.len(), "storage closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.archives.read().is_none()
    }
}
