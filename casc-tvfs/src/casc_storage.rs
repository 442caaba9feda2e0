use crate::casc_build_info::CascBuildInfo;
use crate::casc_config::CascConfig;
use crate::data_archive::IoMode;
use crate::error::CascError;
use crate::path_result::PathResult;
use crate::storage::{Storage, StorageParams};
use crate::virtual_file_system::{Leaves, VirtualFileSystem};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Options for [`CascStorage::open_with_options`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenOptions {
    io_mode: IoMode,
    verify_index_blocks: bool,
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self {
            io_mode: IoMode::default(),
            verify_index_blocks: true,
        }
    }
}

impl OpenOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn io_mode(mut self, io_mode: IoMode) -> Self {
        self.io_mode = io_mode;
        self
    }

    /// Whether `.idx` block hashes are checked while building the index.
    /// Installs whose entry blocks carry a different running hash need this off.
    pub fn verify_index_blocks(mut self, verify: bool) -> Self {
        self.verify_index_blocks = verify;
        self
    }
}

/// An open CASC installation, reached through its TVFS root.
///
/// `CascStorage` is the main entry point of the crate. [`CascStorage::open`]
/// takes the installation folder (the one containing `.build.info` and
/// `Data/`), reads the active build configuration, opens the archives under
/// `Data/data` and mounts the TVFS root named by the configuration's
/// `vfs-root` entry.
///
/// ```no_run
/// use casc_tvfs::CascStorage;
///
/// let storage = CascStorage::open("path/to/install")?;
/// let units = storage.resolve_path("data/global/excel/units.txt")?;
/// let bytes = units.read_file()?;
/// println!("{} is {} bytes", units.path(), bytes.len());
///
/// for file in storage.enumerate_all().filter(|f| f.is_file()) {
///     println!("{} ({} bytes)", file.path(), file.file_size());
/// }
/// # Ok::<(), casc_tvfs::CascError>(())
/// ```
///
/// # Thread Safety
///
/// Resolution and reads take `&self` and may run from many threads at once.
/// [`CascStorage::close`] waits for reads in flight, after which every read
/// fails with [`CascError::StorageClosed`].
#[derive(Debug)]
pub struct CascStorage {
    storage_path: PathBuf,
    build_info: CascBuildInfo,
    config: CascConfig,
    storage: Arc<Storage>,
    vfs: VirtualFileSystem,
}

impl CascStorage {
    pub fn open<P: AsRef<Path>>(folder: P) -> Result<Self, CascError> {
        Self::open_with(folder, IoMode::default())
    }

    pub fn open_with<P: AsRef<Path>>(folder: P, io_mode: IoMode) -> Result<Self, CascError> {
        Self::open_with_options(folder, &OpenOptions::new().io_mode(io_mode))
    }

    pub fn open_with_options<P: AsRef<Path>>(folder: P, options: &OpenOptions) -> Result<Self, CascError> {
        let storage_path = folder.as_ref().to_path_buf();
        let data_folder = storage_path.join("Data");
        if !data_folder.is_dir() {
            return Err(CascError::malformed(format!(
                "{} has no Data folder",
                storage_path.display()
            )));
        }

        let build_info = Self::load_build_info(&storage_path)?;
        let config = Self::load_config(&build_info, &storage_path)?;

        let params = StorageParams::new(data_folder.join("data"))
            .with_io_mode(options.io_mode)
            .with_index_verification(options.verify_index_blocks);
        let storage = Arc::new(Storage::open(&params)?);
        let vfs = VirtualFileSystem::mount_with_nested(
            Arc::clone(&storage),
            config.vfs_root_key()?,
            config.nested_vfs_keys()?,
        )?;
        debug!(path = %storage_path.display(), files = vfs.len(), "CASC storage ready");

        Ok(Self {
            storage_path,
            build_info,
            config,
            storage,
            vfs,
        })
    }

    fn load_build_info(storage_path: &Path) -> Result<CascBuildInfo, CascError> {
        let direct = storage_path.join(".build.info");
        let path = if direct.is_file() {
            Some(direct)
        } else {
            find_file(storage_path, ".build.info")
        };
        match path {
            Some(path) => CascBuildInfo::load(path),
            None => Err(CascError::malformed(format!(
                "no .build.info under {}",
                storage_path.display()
            ))),
        }
    }

    fn load_config(build_info: &CascBuildInfo, storage_path: &Path) -> Result<CascConfig, CascError> {
        let build_key = build_info.build_key()?.to_ascii_lowercase();
        let direct = match (build_key.get(0..2), build_key.get(2..4)) {
            (Some(first), Some(second)) => Some(
                storage_path
                    .join("Data")
                    .join("config")
                    .join(first)
                    .join(second)
                    .join(&build_key),
            ),
            _ => None,
        };
        let path = match direct {
            Some(path) if path.is_file() => Some(path),
            _ => find_file(storage_path, &build_key),
        };
        match path {
            Some(path) => CascConfig::load(path),
            None => Err(CascError::malformed(format!(
                "build config {build_key} not found under {}",
                storage_path.display()
            ))),
        }
    }

    pub fn storage_path(&self) -> &Path {
        &self.storage_path
    }

    pub fn build_info(&self) -> &CascBuildInfo {
        &self.build_info
    }

    pub fn config(&self) -> &CascConfig {
        &self.config
    }

    pub fn storage(&self) -> &Arc<Storage> {
        &self.storage
    }

    pub fn file_system(&self) -> &VirtualFileSystem {
        &self.vfs
    }

    pub fn resolve_path(&self, path: &str) -> Result<PathResult, CascError> {
        self.vfs.resolve_path(path)
    }

    pub fn find(&self, path: &str) -> Option<PathResult> {
        self.vfs.find(path)
    }

    /// Every file and nested container of the root file system. Walks the
    /// whole tree on each call.
    pub fn enumerate_all(&self) -> Leaves<'_> {
        self.vfs.enumerate_all()
    }

    pub fn read_file(&self, path: &str) -> Result<Vec<u8>, CascError> {
        self.resolve_path(path)?.read_file()
    }

    pub fn is_file_available(&self, path: &str) -> bool {
        self.vfs.is_file_available(path)
    }

    pub fn mount_nested(&self, container: &PathResult) -> Result<VirtualFileSystem, CascError> {
        self.vfs.mount_nested(container)
    }

    /// Closes the underlying storage. Outstanding [`PathResult`]s stay valid
    /// to inspect but can no longer read.
    pub fn close(&self) {
        self.storage.close();
    }
}

/// Depth-first search for a file called `name` below `dir`.
fn find_file(dir: &Path, name: &str) -> Option<PathBuf> {
    for entry in fs::read_dir(dir).ok()? {
        let Ok(entry) = entry else { continue };
        let Ok(file_type) = entry.file_type() else { continue };
        let path = entry.path();
        // Symlinked folders are not followed; a link cycle would never end.
        if file_type.is_dir() {
            if let Some(found) = find_file(&path, name) {
                return Some(found);
            }
        } else if path.file_name() == Some(name.as_ref()) && path.is_file() {
            return Some(path);
        }
    }
    None
}
