//! # casc-tvfs
//!
//! `casc-tvfs` reads Blizzard CASC storages through their TVFS virtual file
//! system: it indexes the local archives, mounts the TVFS root named by the
//! active build configuration, and resolves case-insensitive paths to file
//! contents.
//!
//! ## Features
//! - `.idx` key mapping tables and `data.NNN` archives, read through positioned
//!   reads or memory maps
//! - Hash-guarded block codec (lookup3 checksums) and BLTE decoding
//!   (raw and zlib frames, MD5 verified)
//! - TVFS path tables with multi-span files and nested container detection
//! - Safe concurrent reads, with a close barrier that waits for in-flight reads
//!
//! ## Usage
//! ```toml
//! [dependencies]
//! casc-tvfs = "0.1"
//! ```
//!
//! ### Example: resolving and reading a file
//! ```no_run
//! use casc_tvfs::{CascStorage, IoMode};
//!
//! let storage = CascStorage::open_with("path/to/install", IoMode::Mapped)?;
//! if storage.is_file_available("data/global/excel/units.txt") {
//!     let bytes = storage.read_file("DATA\\Global\\Excel\\Units.txt")?;
//!     println!("{} bytes", bytes.len());
//! }
//! storage.close();
//! # Ok::<(), casc_tvfs::CascError>(())
//! ```
//!
//! ### Example: using the lower layers directly
//! ```no_run
//! use casc_tvfs::{ContentKey, Storage, StorageParams, VirtualFileSystem};
//! use std::sync::Arc;
//!
//! let storage = Arc::new(Storage::open(&StorageParams::new("install/Data/data"))?);
//! let root: ContentKey = "0123456789abcdef01".parse()?;
//! let vfs = VirtualFileSystem::mount(Arc::clone(&storage), root)?;
//! for entry in vfs.enumerate_all() {
//!     println!("{} in storage: {}", entry.path(), entry.exists_in_storage());
//! }
//! # Ok::<(), casc_tvfs::CascError>(())
//! ```

mod block_table;
pub mod casc_build_info;
pub mod casc_config;
mod casc_key_mapping_table;
mod casc_span_header;
pub mod casc_storage;
pub mod content;
pub mod content_key;
mod data_archive;
pub mod error;
mod ext;
pub mod guarded_block;
pub mod path_fragment;
pub mod path_result;
mod path_table_node_flags;
pub mod span_info;
pub mod storage;
pub mod storage_index;
mod tvfs_root_handler;
mod utility;
pub mod virtual_file_system;

#[cfg(test)]
mod test_utils;

pub use casc_storage::{CascStorage, OpenOptions};
pub use content_key::{ContentKey, KEY_LENGTH};
pub use data_archive::IoMode;
pub use error::{CascError, Result};
pub use path_fragment::PathFragment;
pub use path_result::{PathResult, PathTarget};
pub use span_info::SpanInfo;
pub use storage::{Storage, StorageParams};
pub use storage_index::{StorageIndex, StorageIndexEntry};
pub use tvfs_root_handler::{TvfsHeader, TVFS_FLAG_INCLUDE_CKEY, TVFS_FLAG_PATCH_SUPPORT, TVFS_FLAG_WRITE_SUPPORT};
pub use utility::jenkins_hash::hashlittle;
pub use virtual_file_system::{Leaves, VirtualFileSystem};
