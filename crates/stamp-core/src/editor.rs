//! Text editing capability: read a file's text model and prepend headers
//! as one batch.

use crate::fs::{FileSystem, FsError, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// UTF-8 encoded byte order mark. Not part of the text model; headers go
/// after it.
const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// A single insertion at offset 0 of a file's text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prepend {
    pub path: PathBuf,
    pub text: String,
}

/// Edits applied together. A batch either lands completely or the editor
/// restores whatever it already changed.
#[derive(Debug, Default, Clone)]
pub struct EditBatch {
    edits: Vec<Prepend>,
}

impl EditBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn prepend(&mut self, path: impl Into<PathBuf>, text: impl Into<String>) {
        self.edits.push(Prepend {
            path: path.into(),
            text: text.into(),
        });
    }

    pub fn len(&self) -> usize {
        self.edits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }
}

/// Host text-model access.
#[async_trait]
pub trait TextEditor: Send + Sync {
    /// Current text of `path`, or `None` when the file has no text model
    /// (binary content, unreadable, missing). A leading byte order mark is
    /// not part of the text.
    async fn text(&self, path: &Path) -> Option<String>;

    /// Apply every edit in `batch`.
    async fn commit(&self, batch: EditBatch) -> Result<()>;
}

/// `TextEditor` over any [`FileSystem`]: text is the UTF-8 decoded file.
pub struct FsEditor<F: FileSystem> {
    fs: F,
}

impl<F: FileSystem> FsEditor<F> {
    pub fn new(fs: F) -> Self {
        Self { fs }
    }

    async fn restore(&self, applied: &[(PathBuf, Vec<u8>)]) {
        for (path, original) in applied.iter().rev() {
            if let Err(e) = self.fs.write(path, original).await {
                warn!("Failed to restore {} after aborted batch: {}", path.display(), e);
            }
        }
    }
}

#[async_trait]
impl<F: FileSystem> TextEditor for FsEditor<F> {
    async fn text(&self, path: &Path) -> Option<String> {
        match self.fs.read(path).await {
            Ok(bytes) => {
                let body = bytes.strip_prefix(UTF8_BOM).unwrap_or(&bytes[..]);
                String::from_utf8(body.to_vec()).ok()
            }
            Err(FsError::NotFound(_)) | Err(FsError::IsDirectory(_)) => None,
            Err(e) => {
                debug!("No text for {}: {}", path.display(), e);
                None
            }
        }
    }

    async fn commit(&self, batch: EditBatch) -> Result<()> {
        let mut applied: Vec<(PathBuf, Vec<u8>)> = Vec::with_capacity(batch.len());

        for edit in batch.edits {
            // Re-read right before writing so the prepend sees the latest content.
            let original = match self.fs.read(&edit.path).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    self.restore(&applied).await;
                    return Err(e);
                }
            };

            let (bom, body) = match original.strip_prefix(UTF8_BOM) {
                Some(body) => (UTF8_BOM, body),
                None => (&[][..], &original[..]),
            };
            let mut content = Vec::with_capacity(edit.text.len() + original.len());
            content.extend_from_slice(bom);
            content.extend_from_slice(edit.text.as_bytes());
            content.extend_from_slice(body);

            if let Err(e) = self.fs.write(&edit.path, &content).await {
                self.restore(&applied).await;
                return Err(e);
            }
            applied.push((edit.path, original));
        }

        Ok(())
    }
}
