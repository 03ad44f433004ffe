//! New-file stamping.
//!
//! Creation handling is split in two phases. `prepare` runs wherever the
//! watcher delivers events and only collects which entries were created.
//! `NewFileStamper::apply` runs later on the single mutation context and
//! performs the edits.

use crate::comment::{self, CommentTemplate};
use crate::editor::{EditBatch, TextEditor};
use crate::events::{CreatedEntry, WatchEvent};
use crate::fs::{FileSystem, FsError};
use crate::project::{Project, ProjectRegistry};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Why a file was left untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The entry is a directory
    Directory,
    /// The entry disappeared before it could be processed
    NotFound,
    /// No open project owns the file
    NoProject,
    /// No comment syntax for the extension
    Unsupported,
    /// The file has no text representation
    NoText,
    /// The text already starts with a comment leader
    AlreadyStamped,
    /// The host failed to read or write the file
    Failed(String),
}

/// Result of handling one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StampOutcome {
    Stamped { path: PathBuf, header: String },
    Skipped { path: PathBuf, reason: SkipReason },
}

impl StampOutcome {
    pub fn is_stamped(&self) -> bool {
        matches!(self, StampOutcome::Stamped { .. })
    }

    fn skipped(path: PathBuf, reason: SkipReason) -> Self {
        debug!("Skipping {}: {:?}", path.display(), reason);
        StampOutcome::Skipped { path, reason }
    }
}

/// New-file stamper settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StamperConfig {
    /// Skip new files whose text already starts with a comment leader.
    /// Prevents double headers when a creation is reported twice.
    pub guard_on_create: bool,
}

impl Default for StamperConfig {
    fn default() -> Self {
        Self {
            guard_on_create: true,
        }
    }
}

/// Creations collected during the prepare phase.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingChanges {
    entries: Vec<CreatedEntry>,
}

impl PendingChanges {
    pub fn entries(&self) -> &[CreatedEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Append another prepared batch. An entry already queued is not
    /// queued twice.
    pub fn merge(&mut self, other: PendingChanges) {
        for entry in other.entries {
            if !self.entries.contains(&entry) {
                self.entries.push(entry);
            }
        }
    }
}

/// Prepare phase: keep creation events only. Read-only; returns `None`
/// when nothing was created.
pub fn prepare<I>(events: I) -> Option<PendingChanges>
where
    I: IntoIterator<Item = WatchEvent>,
{
    let entries: Vec<CreatedEntry> = events
        .into_iter()
        .filter_map(|event| match event {
            WatchEvent::Created {
                parent,
                name,
                is_dir,
            } => Some(CreatedEntry {
                parent,
                name,
                is_dir,
            }),
            WatchEvent::Modified(_) | WatchEvent::Removed(_) => None,
        })
        .collect();

    if entries.is_empty() {
        None
    } else {
        Some(PendingChanges { entries })
    }
}

/// Template for `path` within `project`, honouring the project's
/// plain-text classification.
pub fn template_for(project: &Project, path: &Path) -> Option<CommentTemplate> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    comment::resolve(&extension, project.plain_text().is_plain_text(&extension))
}

/// Full header (comment line plus blank line) for `path`, if stampable.
pub fn header_for(project: &Project, path: &Path) -> Option<String> {
    template_for(project, path).map(|template| template.header(&project.render_path(path)))
}

/// Apply phase of new-file stamping.
pub struct NewFileStamper<'a, F: FileSystem, E: TextEditor> {
    fs: &'a F,
    editor: &'a E,
    projects: &'a ProjectRegistry,
    config: StamperConfig,
}

impl<'a, F: FileSystem, E: TextEditor> NewFileStamper<'a, F, E> {
    pub fn new(fs: &'a F, editor: &'a E, projects: &'a ProjectRegistry) -> Self {
        Self {
            fs,
            editor,
            projects,
            config: StamperConfig::default(),
        }
    }

    pub fn with_config(mut self, config: StamperConfig) -> Self {
        self.config = config;
        self
    }

    /// Stamp every prepared creation. One file's failure never stops the rest.
    pub async fn apply(&self, pending: PendingChanges) -> Vec<StampOutcome> {
        let mut outcomes = Vec::with_capacity(pending.len());
        for entry in pending.entries {
            let path = entry.path();
            let outcome = if entry.is_dir {
                StampOutcome::skipped(path, SkipReason::Directory)
            } else {
                self.stamp_file(&path).await
            };
            outcomes.push(outcome);
        }
        outcomes
    }

    /// Run the new-file pipeline for a single path.
    pub async fn stamp_file(&self, path: &Path) -> StampOutcome {
        let path = path.to_path_buf();

        match self.fs.stat(&path).await {
            Ok(stat) if stat.is_dir => return StampOutcome::skipped(path, SkipReason::Directory),
            Ok(_) => {}
            Err(FsError::NotFound(_)) => return StampOutcome::skipped(path, SkipReason::NotFound),
            Err(e) => return StampOutcome::skipped(path, SkipReason::Failed(e.to_string())),
        }

        let Some(project) = self.projects.project_for(&path) else {
            return StampOutcome::skipped(path, SkipReason::NoProject);
        };

        let Some(header) = header_for(project, &path) else {
            return StampOutcome::skipped(path, SkipReason::Unsupported);
        };

        let Some(text) = self.editor.text(&path).await else {
            return StampOutcome::skipped(path, SkipReason::NoText);
        };

        if self.config.guard_on_create && comment::has_comment_leader(&text) {
            return StampOutcome::skipped(path, SkipReason::AlreadyStamped);
        }

        let mut batch = EditBatch::new();
        batch.prepend(&path, header.clone());
        if let Err(e) = self.editor.commit(batch).await {
            warn!("Failed to stamp {}: {}", path.display(), e);
            return StampOutcome::skipped(path, SkipReason::Failed(e.to_string()));
        }

        info!("Stamped {} ({})", path.display(), project.name());
        StampOutcome::Stamped { path, header }
    }
}
