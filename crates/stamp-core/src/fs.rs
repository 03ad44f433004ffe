//! FileSystem trait abstraction for host-independent file access.
//!
//! Implementations:
//! - `InMemoryFs` - For testing
//! - `NativeFs` (in stamp-daemon) - Uses tokio::fs and an ignore-aware walk
//!
//! All paths are absolute. The stamping logic never touches the disk
//! directly; it goes through this trait.

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FsError {
    #[error("File not found: {0}")]
    NotFound(PathBuf),

    #[error("Is a directory: {0}")]
    IsDirectory(PathBuf),

    #[error("IO error: {0}")]
    Io(String),
}

pub type Result<T> = std::result::Result<T, FsError>;

/// File metadata
#[derive(Debug, Clone)]
pub struct FileStat {
    /// Whether this is a directory
    pub is_dir: bool,
}

/// Host filesystem abstraction.
#[async_trait]
pub trait FileSystem: Send + Sync {
    /// Read file contents
    async fn read(&self, path: &Path) -> Result<Vec<u8>>;

    /// Write file contents (creates parent directories if needed)
    async fn write(&self, path: &Path, content: &[u8]) -> Result<()>;

    /// Get file metadata
    async fn stat(&self, path: &Path) -> Result<FileStat>;

    /// List every file below `root` that belongs to the project scope.
    ///
    /// Directories are not returned. Implementations decide what is out of
    /// scope (ignored, hidden, vendored directories).
    async fn walk(&self, root: &Path) -> Result<Vec<PathBuf>>;
}

/// In-memory filesystem for testing
#[derive(Default)]
pub struct InMemoryFs {
    files: RwLock<BTreeMap<PathBuf, Vec<u8>>>,
    dirs: RwLock<BTreeSet<PathBuf>>,
    /// Paths whose writes fail, for exercising rollback
    read_only: RwLock<BTreeSet<PathBuf>>,
}

impl InMemoryFs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a file without going through the async API.
    pub fn insert(&self, path: impl Into<PathBuf>, content: impl Into<Vec<u8>>) {
        let path = path.into();
        self.add_parents(&path);
        self.files.write().unwrap().insert(path, content.into());
    }

    /// Register an (empty) directory.
    pub fn insert_dir(&self, path: impl Into<PathBuf>) {
        let path = path.into();
        self.add_parents(&path);
        self.dirs.write().unwrap().insert(path);
    }

    /// Make writes to `path` fail with an IO error.
    pub fn set_read_only(&self, path: impl Into<PathBuf>) {
        self.read_only.write().unwrap().insert(path.into());
    }

    /// Current contents as a string, for assertions.
    pub fn text(&self, path: impl AsRef<Path>) -> Option<String> {
        self.files
            .read()
            .unwrap()
            .get(path.as_ref())
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
    }

    fn add_parents(&self, path: &Path) {
        let mut dirs = self.dirs.write().unwrap();
        for ancestor in path.ancestors().skip(1) {
            if ancestor.as_os_str().is_empty() {
                break;
            }
            dirs.insert(ancestor.to_path_buf());
        }
    }
}

#[async_trait]
impl FileSystem for InMemoryFs {
    async fn read(&self, path: &Path) -> Result<Vec<u8>> {
        if self.dirs.read().unwrap().contains(path) {
            return Err(FsError::IsDirectory(path.to_path_buf()));
        }
        self.files
            .read()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| FsError::NotFound(path.to_path_buf()))
    }

    async fn write(&self, path: &Path, content: &[u8]) -> Result<()> {
        if self.read_only.read().unwrap().contains(path) {
            return Err(FsError::Io(format!("permission denied: {}", path.display())));
        }
        self.insert(path, content);
        Ok(())
    }

    async fn stat(&self, path: &Path) -> Result<FileStat> {
        if self.files.read().unwrap().contains_key(path) {
            return Ok(FileStat { is_dir: false });
        }

        if self.dirs.read().unwrap().contains(path) {
            return Ok(FileStat { is_dir: true });
        }

        Err(FsError::NotFound(path.to_path_buf()))
    }

    async fn walk(&self, root: &Path) -> Result<Vec<PathBuf>> {
        let files = self.files.read().unwrap();
        Ok(files
            .keys()
            .filter(|path| path.starts_with(root))
            .cloned()
            .collect())
    }
}

// Allows sharing one filesystem between a stamper and test assertions.
#[async_trait]
impl<T: FileSystem + ?Sized> FileSystem for std::sync::Arc<T> {
    async fn read(&self, path: &Path) -> Result<Vec<u8>> {
        (**self).read(path).await
    }

    async fn write(&self, path: &Path, content: &[u8]) -> Result<()> {
        (**self).write(path, content).await
    }

    async fn stat(&self, path: &Path) -> Result<FileStat> {
        (**self).stat(path).await
    }

    async fn walk(&self, root: &Path) -> Result<Vec<PathBuf>> {
        (**self).walk(root).await
    }
}
