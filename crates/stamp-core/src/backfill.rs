//! One-time backfill: stamp every pre-existing project file that does not
//! start with a comment yet.
//!
//! A project is scanned once. The ProcessedFlag is stored under
//! [`PROCESSED_KEY`] and written only after the whole scan has been
//! committed, so an interrupted run is retried next time; files it already
//! stamped are then skipped by the comment-leader check.

use crate::comment;
use crate::editor::{EditBatch, TextEditor};
use crate::fs::{FileSystem, FsError};
use crate::project::Project;
use crate::stamper::header_for;
use crate::store::{KeyValueStore, StoreError};
use std::collections::BTreeSet;
use std::path::PathBuf;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Settings key of the ProcessedFlag.
pub const PROCESSED_KEY: &str = "pathstamp.processed";

#[derive(Debug, Error)]
pub enum BackfillError {
    #[error("Failed to commit backfill edits: {0}")]
    Commit(#[from] FsError),

    #[error("Failed to persist processed flag: {0}")]
    Store(#[from] StoreError),

    #[error("Failed to enumerate {0}: {1}")]
    Enumerate(PathBuf, #[source] FsError),

    #[error("Project {0} was closed before it became ready")]
    NeverReady(String),
}

pub type Result<T> = std::result::Result<T, BackfillError>;

/// What a backfill run did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BackfillReport {
    /// Files that received a header
    pub stamped: Vec<PathBuf>,
    /// Files already starting with a comment leader
    pub already_stamped: Vec<PathBuf>,
    /// Files with no template (e.g. `.json`)
    pub unsupported: Vec<PathBuf>,
    /// Files without a text representation
    pub no_text: Vec<PathBuf>,
    /// The project was already processed; nothing was scanned
    pub skipped_processed: bool,
}

impl BackfillReport {
    /// Number of files looked at.
    pub fn total_scanned(&self) -> usize {
        self.stamped.len() + self.already_stamped.len() + self.unsupported.len() + self.no_text.len()
    }
}

/// Whether the project's backfill has completed before.
pub fn is_processed<S: KeyValueStore + ?Sized>(store: &S, project: &Project) -> bool {
    store.get_bool(project.id(), PROCESSED_KEY)
}

/// Forget that a project was processed. Only ever done on user request.
pub fn reset<S: KeyValueStore + ?Sized>(store: &mut S, project: &Project) -> Result<()> {
    store.remove(project.id(), PROCESSED_KEY)?;
    info!("Cleared processed flag for {}", project.name());
    Ok(())
}

/// Runs the one-time scan for a project.
pub struct BackfillStamper<'a, F: FileSystem, E: TextEditor, S: KeyValueStore + ?Sized> {
    fs: &'a F,
    editor: &'a E,
    store: &'a mut S,
}

impl<'a, F: FileSystem, E: TextEditor, S: KeyValueStore + ?Sized> BackfillStamper<'a, F, E, S> {
    pub fn new(fs: &'a F, editor: &'a E, store: &'a mut S) -> Self {
        Self { fs, editor, store }
    }

    /// Wait until `ready` turns true, then run. Waits without a timeout.
    pub async fn run_when_ready(
        &mut self,
        project: &Project,
        mut ready: watch::Receiver<bool>,
    ) -> Result<BackfillReport> {
        if is_processed(&*self.store, project) {
            debug!("{} already processed, not waiting for readiness", project.name());
            return Ok(BackfillReport {
                skipped_processed: true,
                ..Default::default()
            });
        }

        debug!("Waiting for {} to become ready", project.name());
        if ready.wait_for(|ready| *ready).await.is_err() {
            return Err(BackfillError::NeverReady(project.name().to_string()));
        }
        self.run(project).await
    }

    /// Scan the project once and stamp files lacking a header.
    pub async fn run(&mut self, project: &Project) -> Result<BackfillReport> {
        if is_processed(&*self.store, project) {
            debug!("{} already processed, skipping backfill", project.name());
            return Ok(BackfillReport {
                skipped_processed: true,
                ..Default::default()
            });
        }

        let files = self.collect(project).await?;
        info!("Backfill of {}: {} candidate file(s)", project.name(), files.len());

        let mut report = BackfillReport::default();
        let mut batch = EditBatch::new();

        for path in files {
            let Some(text) = self.editor.text(&path).await else {
                report.no_text.push(path);
                continue;
            };

            if !text.is_empty() && comment::has_comment_leader(&text) {
                report.already_stamped.push(path);
                continue;
            }

            let Some(header) = header_for(project, &path) else {
                report.unsupported.push(path);
                continue;
            };

            batch.prepend(&path, header);
            report.stamped.push(path);
        }

        if !batch.is_empty() {
            self.editor.commit(batch).await?;
        }

        self.store.set_bool(project.id(), PROCESSED_KEY, true)?;
        info!(
            "Backfill of {} done: {} stamped, {} already stamped",
            project.name(),
            report.stamped.len(),
            report.already_stamped.len()
        );
        Ok(report)
    }

    /// Every project file whose extension is on the allow-list.
    ///
    /// A missing content root is skipped. Any other enumeration failure
    /// aborts the run so the project is not marked processed.
    async fn collect(&self, project: &Project) -> Result<BTreeSet<PathBuf>> {
        let mut allowed: BTreeSet<&str> = project.plain_text().extensions().collect();
        for ext in comment::stampable_extensions() {
            allowed.insert(ext);
        }

        let mut files = BTreeSet::new();
        for root in project.scan_roots() {
            let found = match self.fs.walk(root).await {
                Ok(found) => found,
                Err(FsError::NotFound(_)) => {
                    warn!("Content root {} does not exist, skipping", root.display());
                    continue;
                }
                Err(e) => return Err(BackfillError::Enumerate(root.to_path_buf(), e)),
            };

            for path in found {
                let matches = path
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .map(|ext| allowed.contains(ext.to_ascii_lowercase().as_str()))
                    .unwrap_or(false);
                if matches {
                    files.insert(path);
                }
            }
        }
        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editor::FsEditor;
    use crate::fs::{FileStat, InMemoryFs};
    use crate::store::InMemoryStore;
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::Arc;

    fn setup() -> (Arc<InMemoryFs>, FsEditor<Arc<InMemoryFs>>, InMemoryStore) {
        let fs = Arc::new(InMemoryFs::new());
        let editor = FsEditor::new(fs.clone());
        (fs, editor, InMemoryStore::new())
    }

    #[tokio::test]
    async fn test_backfill_scenario() {
        let (fs, editor, mut store) = setup();
        let project = Project::new("/proj");
        fs.insert("/proj/a.go", "");
        fs.insert("/proj/b.go", "// something else\npackage b\n");
        fs.insert("/proj/c.json", "{}");

        let report = BackfillStamper::new(&fs, &editor, &mut store)
            .run(&project)
            .await
            .unwrap();

        assert_eq!(fs.text("/proj/a.go").unwrap(), "// a.go\n\n");
        assert_eq!(fs.text("/proj/b.go").unwrap(), "// something else\npackage b\n");
        assert_eq!(fs.text("/proj/c.json").unwrap(), "{}");
        assert_eq!(report.stamped, vec![PathBuf::from("/proj/a.go")]);
        assert_eq!(report.already_stamped, vec![PathBuf::from("/proj/b.go")]);
        // json is not on the allow-list, so it is never even considered
        assert_eq!(report.total_scanned(), 2);
        assert!(is_processed(&store, &project));
    }

    #[tokio::test]
    async fn test_second_run_is_a_no_op() {
        let (fs, editor, mut store) = setup();
        let project = Project::new("/proj");
        fs.insert("/proj/main.rs", "fn main() {}\n");

        BackfillStamper::new(&fs, &editor, &mut store).run(&project).await.unwrap();
        fs.insert("/proj/late.rs", "fn late() {}\n");
        let report = BackfillStamper::new(&fs, &editor, &mut store).run(&project).await.unwrap();

        assert!(report.skipped_processed);
        assert_eq!(report.total_scanned(), 0);
        assert_eq!(fs.text("/proj/main.rs").unwrap(), "// main.rs\n\nfn main() {}\n");
        assert_eq!(fs.text("/proj/late.rs").unwrap(), "fn late() {}\n");
    }

    #[tokio::test]
    async fn test_empty_project_is_still_marked_processed() {
        let (fs, editor, mut store) = setup();
        let project = Project::new("/proj");
        fs.insert("/proj/notes.md", "hello");

        let report = BackfillStamper::new(&fs, &editor, &mut store).run(&project).await.unwrap();
        assert!(report.stamped.is_empty());
        assert!(is_processed(&store, &project));
    }

    #[tokio::test]
    async fn test_mismatched_header_is_not_restamped() {
        let (fs, editor, mut store) = setup();
        let project = Project::new("/proj");
        fs.insert("/proj/src/old.py", "# moved from elsewhere/old.py\n");
        fs.insert("/proj/query.sql", "-- report\nSELECT 1;\n");
        fs.insert("/proj/page.html", "<!-- layout -->\n");
        fs.insert("/proj/style.css", "/* theme */\n");

        let report = BackfillStamper::new(&fs, &editor, &mut store).run(&project).await.unwrap();
        assert!(report.stamped.is_empty());
        assert_eq!(report.already_stamped.len(), 4);
        assert_eq!(fs.text("/proj/src/old.py").unwrap(), "# moved from elsewhere/old.py\n");
    }

    #[tokio::test]
    async fn test_backfill_renders_per_content_root() {
        let (fs, editor, mut store) = setup();
        let project = Project::new("/proj").with_content_roots(["/proj/api", "/proj/web"]);
        fs.insert("/proj/api/handlers/user.ts", "export {}\n");
        fs.insert("/proj/web/index.html", "<html></html>\n");
        fs.insert("/proj/tools/gen.py", "print()\n");

        let report = BackfillStamper::new(&fs, &editor, &mut store).run(&project).await.unwrap();

        assert_eq!(report.stamped.len(), 2);
        assert_eq!(
            fs.text("/proj/api/handlers/user.ts").unwrap(),
            "// handlers/user.ts\n\nexport {}\n"
        );
        assert_eq!(
            fs.text("/proj/web/index.html").unwrap(),
            "<!-- index.html -->\n\n<html></html>\n"
        );
        // Outside every content root, so outside the scan scope.
        assert_eq!(fs.text("/proj/tools/gen.py").unwrap(), "print()\n");
    }

    #[tokio::test]
    async fn test_backfill_includes_plain_text_types() {
        let (fs, editor, mut store) = setup();
        let project = Project::new("/proj");
        fs.insert("/proj/deploy.conf", "listen 80\n");
        fs.insert("/proj/Cargo.lock", "version = 3\n");

        let report = BackfillStamper::new(&fs, &editor, &mut store).run(&project).await.unwrap();
        assert_eq!(report.stamped, vec![PathBuf::from("/proj/deploy.conf")]);
        assert_eq!(fs.text("/proj/deploy.conf").unwrap(), "# deploy.conf\n\nlisten 80\n");
    }

    #[tokio::test]
    async fn test_failed_commit_leaves_project_unprocessed() {
        let (fs, editor, mut store) = setup();
        let project = Project::new("/proj");
        fs.insert("/proj/a.rs", "");
        fs.insert("/proj/b.rs", "");
        fs.set_read_only("/proj/b.rs");

        let result = BackfillStamper::new(&fs, &editor, &mut store).run(&project).await;
        assert!(matches!(result, Err(BackfillError::Commit(_))));
        assert!(!is_processed(&store, &project));
        assert_eq!(fs.text("/proj/a.rs").unwrap(), "");
    }

    #[tokio::test]
    async fn test_reset_allows_rescan() {
        let (fs, editor, mut store) = setup();
        let project = Project::new("/proj");
        BackfillStamper::new(&fs, &editor, &mut store).run(&project).await.unwrap();

        reset(&mut store, &project).unwrap();
        assert!(!is_processed(&store, &project));

        fs.insert("/proj/new.kt", "fun main() {}\n");
        let report = BackfillStamper::new(&fs, &editor, &mut store).run(&project).await.unwrap();
        assert_eq!(report.stamped, vec![PathBuf::from("/proj/new.kt")]);
    }

    #[tokio::test]
    async fn test_run_when_ready_waits_for_signal() {
        let (fs, editor, mut store) = setup();
        let project = Project::new("/proj");
        fs.insert("/proj/lib.rs", "");

        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(async move {
            tokio::task::yield_now().await;
            tx.send(true).unwrap();
            tx
        });

        let report = BackfillStamper::new(&fs, &editor, &mut store)
            .run_when_ready(&project, rx)
            .await
            .unwrap();
        let _tx = handle.await.unwrap();

        assert_eq!(report.stamped, vec![PathBuf::from("/proj/lib.rs")]);
        assert_eq!(fs.text(Path::new("/proj/lib.rs")).unwrap(), "// lib.rs\n\n");
    }

    #[tokio::test]
    async fn test_run_when_ready_fails_if_never_ready() {
        let (fs, editor, mut store) = setup();
        let project = Project::new("/proj");
        let (tx, rx) = watch::channel(false);
        drop(tx);

        let result = BackfillStamper::new(&fs, &editor, &mut store)
            .run_when_ready(&project, rx)
            .await;
        assert!(matches!(result, Err(BackfillError::NeverReady(_))));
        assert!(!is_processed(&store, &project));
    }

    /// Filesystem whose enumeration always fails with the given error.
    struct BrokenWalk {
        inner: Arc<InMemoryFs>,
        missing: bool,
    }

    #[async_trait]
    impl FileSystem for BrokenWalk {
        async fn read(&self, path: &Path) -> crate::fs::Result<Vec<u8>> {
            self.inner.read(path).await
        }

        async fn write(&self, path: &Path, content: &[u8]) -> crate::fs::Result<()> {
            self.inner.write(path, content).await
        }

        async fn stat(&self, path: &Path) -> crate::fs::Result<FileStat> {
            self.inner.stat(path).await
        }

        async fn walk(&self, root: &Path) -> crate::fs::Result<Vec<PathBuf>> {
            if self.missing {
                Err(FsError::NotFound(root.to_path_buf()))
            } else {
                Err(FsError::Io(format!("{}: permission denied", root.display())))
            }
        }
    }

    #[tokio::test]
    async fn test_unreadable_root_leaves_project_unprocessed() {
        let (fs, editor, mut store) = setup();
        let project = Project::new("/proj");
        fs.insert("/proj/a.rs", "");
        let broken = BrokenWalk {
            inner: fs.clone(),
            missing: false,
        };

        let result = BackfillStamper::new(&broken, &editor, &mut store).run(&project).await;
        assert!(matches!(result, Err(BackfillError::Enumerate(ref root, _)) if root == Path::new("/proj")));
        assert!(!is_processed(&store, &project));
        assert_eq!(fs.text("/proj/a.rs").unwrap(), "");

        // Once enumeration works again the scan is retried.
        let report = BackfillStamper::new(&fs, &editor, &mut store).run(&project).await.unwrap();
        assert_eq!(report.stamped, vec![PathBuf::from("/proj/a.rs")]);
        assert!(is_processed(&store, &project));
    }

    #[tokio::test]
    async fn test_missing_content_root_is_skipped() {
        let (fs, editor, mut store) = setup();
        let project = Project::new("/proj").with_content_roots(["/proj/gone"]);
        let broken = BrokenWalk {
            inner: fs.clone(),
            missing: true,
        };

        let report = BackfillStamper::new(&broken, &editor, &mut store).run(&project).await.unwrap();
        assert_eq!(report.total_scanned(), 0);
        assert!(is_processed(&store, &project));
    }

    #[tokio::test]
    async fn test_byte_order_mark_is_preserved_and_recognised() {
        let (fs, editor, mut store) = setup();
        let project = Project::new("/proj");
        fs.insert("/proj/a.cs", "\u{FEFF}// a.cs\n\nclass A {}\n");
        fs.insert("/proj/b.cs", "\u{FEFF}class B {}\n");

        let report = BackfillStamper::new(&fs, &editor, &mut store).run(&project).await.unwrap();

        assert_eq!(report.stamped, vec![PathBuf::from("/proj/b.cs")]);
        assert_eq!(report.already_stamped, vec![PathBuf::from("/proj/a.cs")]);
        assert_eq!(fs.text("/proj/a.cs").unwrap(), "\u{FEFF}// a.cs\n\nclass A {}\n");
        assert_eq!(fs.text("/proj/b.cs").unwrap(), "\u{FEFF}// b.cs\n\nclass B {}\n");
    }
}
