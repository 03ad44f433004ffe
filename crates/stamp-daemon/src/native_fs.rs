//! Native filesystem implementation using tokio::fs.

use async_trait::async_trait;
use ignore::WalkBuilder;
use stamp_core::fs::{FileStat, FileSystem, FsError, Result};
use std::path::{Path, PathBuf};
use tokio::fs;

/// Directories holding dependencies or build output rather than project sources.
pub const EXCLUDED_DIRS: &[&str] = &[
    "node_modules",
    "target",
    "vendor",
    "build",
    "dist",
    "__pycache__",
];

/// Native filesystem implementation for the daemon
#[derive(Debug, Default, Clone)]
pub struct NativeFs;

impl NativeFs {
    pub fn new() -> Self {
        Self
    }
}

fn io_error(path: &Path, e: std::io::Error) -> FsError {
    match e.kind() {
        std::io::ErrorKind::NotFound => FsError::NotFound(path.to_path_buf()),
        _ => FsError::Io(format!("{}: {}", path.display(), e)),
    }
}

/// Project-scope walk: honours .gitignore/.ignore, skips hidden entries and
/// [`EXCLUDED_DIRS`].
pub(crate) fn walk_project(root: &Path) -> Vec<PathBuf> {
    WalkBuilder::new(root)
        .hidden(true)
        .git_ignore(true)
        .require_git(false)
        .filter_entry(|entry| {
            let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
            !(is_dir
                && entry
                    .file_name()
                    .to_str()
                    .map(|name| EXCLUDED_DIRS.contains(&name))
                    .unwrap_or(false))
        })
        .build()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
        .map(|entry| entry.into_path())
        .collect()
}

#[async_trait]
impl FileSystem for NativeFs {
    async fn read(&self, path: &Path) -> Result<Vec<u8>> {
        if fs::metadata(path).await.map(|m| m.is_dir()).unwrap_or(false) {
            return Err(FsError::IsDirectory(path.to_path_buf()));
        }
        fs::read(path).await.map_err(|e| io_error(path, e))
    }

    async fn write(&self, path: &Path, content: &[u8]) -> Result<()> {
        // Create parent directories if needed
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| io_error(parent, e))?;
        }

        fs::write(path, content).await.map_err(|e| io_error(path, e))
    }

    async fn stat(&self, path: &Path) -> Result<FileStat> {
        let metadata = fs::metadata(path).await.map_err(|e| io_error(path, e))?;

        Ok(FileStat {
            is_dir: metadata.is_dir(),
        })
    }

    async fn walk(&self, root: &Path) -> Result<Vec<PathBuf>> {
        if !fs::try_exists(root).await.map_err(|e| io_error(root, e))? {
            return Err(FsError::NotFound(root.to_path_buf()));
        }

        let root = root.to_path_buf();
        tokio::task::spawn_blocking(move || walk_project(&root))
            .await
            .map_err(|e| FsError::Io(e.to_string()))
    }
}
