//! Read access to one `data.NNN` archive file.

use crate::error::CascError;
use memmap2::{Mmap, MmapOptions};
use parking_lot::Mutex;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use tracing::trace;

/// How archive bytes are fetched, chosen once when the storage is opened.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IoMode {
    /// Positioned reads into a fresh buffer per call.
    #[default]
    Channel,
    /// The archive is mapped read-only once and reads slice the mapping.
    Mapped,
}

/// An open archive in one of the two [`IoMode`]s.
#[derive(Debug)]
pub(crate) enum DataArchive {
    Channel { file: Mutex<File>, len: u64 },
    Mapped(Mmap),
}

impl DataArchive {
    pub(crate) fn open(path: &Path, mode: IoMode) -> Result<Self, CascError> {
        let file = File::open(path)?;
        let archive = match mode {
            IoMode::Channel => {
                let len = file.metadata()?.len();
                DataArchive::Channel {
                    file: Mutex::new(file),
                    len,
                }
            }
            IoMode::Mapped => {
                // SAFETY: the mapping is read-only and archives are not
                // modified while a storage has them open.
                let mmap = unsafe { MmapOptions::new().map(&file)? };
                DataArchive::Mapped(mmap)
            }
        };
        trace!(path = %path.display(), len = archive.len(), ?mode, "archive opened");
        Ok(archive)
    }

    pub(crate) fn len(&self) -> u64 {
        match self {
            DataArchive::Channel { len, .. } => *len,
            DataArchive::Mapped(mmap) => mmap.len() as u64,
        }
    }

    /// Reads `size` bytes at `offset` into a new buffer.
    pub(crate) fn read_at(&self, offset: u64, size: u64) -> Result<Vec<u8>, CascError> {
        self.with_slice(offset, size, <[u8]>::to_vec)
    }

    /// Hands `f` the `size` bytes at `offset`. In mapped mode the slice
    /// borrows the mapping directly.
    pub(crate) fn with_slice<R>(
        &self,
        offset: u64,
        size: u64,
        f: impl FnOnce(&[u8]) -> R,
    ) -> Result<R, CascError> {
        let end = self.check_bounds(offset, size)?;
        match self {
            DataArchive::Channel { file, .. } => {
                let mut buffer = vec![0u8; (end - offset) as usize];
                {
                    let mut file = file.lock();
                    file.seek(SeekFrom::Start(offset))?;
                    file.read_exact(&mut buffer)?;
                }
                Ok(f(&buffer))
            }
            DataArchive::Mapped(mmap) => Ok(f(&mmap[offset as usize..end as usize])),
        }
    }

    fn check_bounds(&self, offset: u64, size: u64) -> Result<u64, CascError> {
        let len = self.len();
        offset
            .checked_add(size)
            .filter(|end| *end <= len)
            .ok_or_else(|| {
                CascError::malformed(format!(
                    "read of {size} bytes at offset {offset} exceeds the {len} byte archive"
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn archive_file() -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        let bytes: Vec<u8> = (0..=255u8).collect();
        file.write_all(&bytes).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn both_modes_read_the_same_bytes() {
        let file = archive_file();
        for mode in [IoMode::Channel, IoMode::Mapped] {
            let archive = DataArchive::open(file.path(), mode).unwrap();
            assert_eq!(archive.len(), 256);
            assert_eq!(archive.read_at(100, 4).unwrap(), vec![100, 101, 102, 103]);
            let sum = archive
                .with_slice(0, 3, |bytes| bytes.iter().map(|&b| u32::from(b)).sum::<u32>())
                .unwrap();
            assert_eq!(sum, 3);
        }
    }

    #[test]
    fn reads_past_the_end_are_malformed() {
        let file = archive_file();
        for mode in [IoMode::Channel, IoMode::Mapped] {
            let archive = DataArchive::open(file.path(), mode).unwrap();
            assert!(archive.read_at(250, 7).unwrap_err().is_malformed());
            assert!(archive.read_at(u64::MAX, 2).unwrap_err().is_malformed());
            assert_eq!(archive.read_at(256, 0).unwrap(), Vec::<u8>::new());
        }
    }
}
