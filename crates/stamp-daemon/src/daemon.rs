//! The daemon: owns the host implementations and is the single place
//! where files are edited.

use anyhow::{bail, Context};
use stamp_core::backfill::{self, BackfillReport, BackfillStamper};
use stamp_core::stamper::{NewFileStamper, PendingChanges, StampOutcome};
use stamp_core::{BackfillError, FsEditor, Project, ProjectRegistry};
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info};

use crate::config::Config;
use crate::native_fs::NativeFs;
use crate::persistence::JsonFileStore;
use crate::watcher::FileWatcher;

/// Daemon state holding all components.
pub struct Daemon {
    config: Config,
    fs: NativeFs,
    editor: FsEditor<NativeFs>,
    projects: ProjectRegistry,
    store: JsonFileStore,
}

impl Daemon {
    pub fn new(config: Config) -> Self {
        let store = JsonFileStore::open(&config.state_path);
        Self {
            config,
            fs: NativeFs::new(),
            editor: FsEditor::new(NativeFs::new()),
            projects: ProjectRegistry::new(),
            store,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn projects(&self) -> &ProjectRegistry {
        &self.projects
    }

    pub fn store(&self) -> &JsonFileStore {
        &self.store
    }

    pub fn open_project(&mut self, project: Project) {
        info!(
            "Opened project {} ({}) with {} content root(s)",
            project.name(),
            project.id(),
            project.content_roots().len()
        );
        self.projects.open(project);
    }

    /// Run the one-time backfill for every open project once `ready` fires.
    /// Failures are logged per project; the other projects still run.
    pub async fn backfill_all(&mut self, ready: watch::Receiver<bool>) -> Vec<BackfillReport> {
        let mut reports = Vec::new();
        for project in self.projects.projects() {
            let mut stamper = BackfillStamper::new(&self.fs, &self.editor, &mut self.store);
            match stamper.run_when_ready(project, ready.clone()).await {
                Ok(report) => {
                    if report.skipped_processed {
                        debug!("{} was already processed", project.name());
                    }
                    reports.push(report);
                }
                Err(e) => error!("Backfill of {} failed: {}", project.name(), e),
            }
        }
        reports
    }

    /// Run the backfill for one open project immediately.
    pub async fn backfill(&mut self, id: &str, force: bool) -> anyhow::Result<BackfillReport> {
        let Some(project) = self.projects.projects().iter().find(|p| p.id() == id) else {
            bail!("No open project with id {}", id);
        };

        if force {
            backfill::reset(&mut self.store, project)?;
        }
        let report = BackfillStamper::new(&self.fs, &self.editor, &mut self.store)
            .run(project)
            .await
            .with_context(|| format!("Backfill of {} failed", project.name()))?;
        Ok(report)
    }

    /// Clear the processed flag of every open project.
    pub fn reset_all(&mut self) -> Result<(), BackfillError> {
        for project in self.projects.projects() {
            backfill::reset(&mut self.store, project)?;
        }
        Ok(())
    }

    /// Apply phase for prepared creations.
    pub async fn on_created(&self, pending: PendingChanges) -> Vec<StampOutcome> {
        let outcomes = NewFileStamper::new(&self.fs, &self.editor, &self.projects)
            .with_config(self.config.stamper)
            .apply(pending)
            .await;
        log_outcomes(&outcomes);
        outcomes
    }

    /// Stamp explicit files through the new-file pipeline.
    pub async fn stamp_files(&self, paths: &[PathBuf]) -> Vec<StampOutcome> {
        let stamper = NewFileStamper::new(&self.fs, &self.editor, &self.projects)
            .with_config(self.config.stamper);
        let mut outcomes = Vec::with_capacity(paths.len());
        for path in paths {
            let path = path.canonicalize().unwrap_or_else(|_| path.clone());
            outcomes.push(stamper.stamp_file(&path).await);
        }
        log_outcomes(&outcomes);
        outcomes
    }

    /// Watch every open project: backfill once ready, then stamp new files
    /// until `shutdown` resolves.
    pub async fn watch<S>(&mut self, shutdown: S) -> anyhow::Result<()>
    where
        S: std::future::Future<Output = ()>,
    {
        if self.projects.is_empty() {
            bail!("No projects to watch");
        }

        let roots: Vec<PathBuf> = self
            .projects
            .projects()
            .iter()
            .map(|p| p.base().to_path_buf())
            .collect();
        let mut watcher = FileWatcher::new(roots)?;
        info!("File watcher started");

        // Creations during the backfill queue up in the watcher channel.
        let (ready_tx, ready_rx) = watch::channel(false);
        ready_tx.send_replace(true);
        self.backfill_all(ready_rx).await;

        info!("Daemon running. Press Ctrl+C to stop.");
        tokio::pin!(shutdown);
        let settle = self.config.settle;

        loop {
            tokio::select! {
                Some(pending) = next_settled(watcher.event_rx(), settle) => {
                    self.on_created(pending).await;
                }

                _ = &mut shutdown => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        Ok(())
    }
}

/// Wait for the next prepared batch, let the creator finish writing, then
/// take everything queued meanwhile. `None` once the watcher is gone.
pub async fn next_settled(
    rx: &mut mpsc::UnboundedReceiver<PendingChanges>,
    settle: Duration,
) -> Option<PendingChanges> {
    let mut pending = rx.recv().await?;
    tokio::time::sleep(settle).await;
    while let Ok(more) = rx.try_recv() {
        pending.merge(more);
    }
    Some(pending)
}

fn log_outcomes(outcomes: &[StampOutcome]) {
    let stamped = outcomes.iter().filter(|o| o.is_stamped()).count();
    if stamped > 0 {
        info!("Stamped {} of {} new file(s)", stamped, outcomes.len());
    } else {
        debug!("No stamps for {} new file(s)", outcomes.len());
    }
}
