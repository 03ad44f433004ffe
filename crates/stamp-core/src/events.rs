//! Filesystem change notifications delivered by the host watcher.

use std::path::{Path, PathBuf};

/// A change reported by the host's file watcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    /// A new entry appeared in `parent`.
    Created {
        parent: PathBuf,
        name: String,
        is_dir: bool,
    },
    /// Existing file contents changed.
    Modified(PathBuf),
    /// An entry was removed.
    Removed(PathBuf),
}

impl WatchEvent {
    /// Build a `Created` event from a full path. `None` for paths without a
    /// parent or a UTF-8 file name.
    pub fn created(path: &Path, is_dir: bool) -> Option<Self> {
        let parent = path.parent()?.to_path_buf();
        let name = path.file_name()?.to_str()?.to_string();
        Some(Self::Created {
            parent,
            name,
            is_dir,
        })
    }
}

/// A file-creation notification captured during the prepare phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedEntry {
    pub parent: PathBuf,
    pub name: String,
    pub is_dir: bool,
}

impl CreatedEntry {
    pub fn path(&self) -> PathBuf {
        self.parent.join(&self.name)
    }
}
