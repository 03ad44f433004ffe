//! stamp-core: Host-independent path stamping.
//!
//! This crate provides:
//! - The comment-style resolver (extension -> comment template)
//! - The project model (content roots, relative path rendering)
//! - New-file stamping and the one-time project backfill
//! - FileSystem, TextEditor and KeyValueStore trait abstractions, with
//!   in-memory implementations for testing

pub mod backfill;
pub mod comment;
pub mod editor;
pub mod events;
pub mod fs;
pub mod project;
pub mod stamper;
pub mod store;

pub use backfill::{BackfillError, BackfillReport, BackfillStamper, PROCESSED_KEY};
pub use comment::{CommentTemplate, PlainTextTypes, COMMENT_LEADERS};
pub use editor::{EditBatch, FsEditor, TextEditor};
pub use events::{CreatedEntry, WatchEvent};
pub use fs::{FileStat, FileSystem, FsError, InMemoryFs};
pub use project::{Project, ProjectManifest, ProjectRegistry, MANIFEST_FILE};
pub use stamper::{NewFileStamper, PendingChanges, SkipReason, StampOutcome, StamperConfig};
pub use store::{InMemoryStore, KeyValueStore, StoreError};
