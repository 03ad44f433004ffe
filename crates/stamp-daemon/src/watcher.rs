//! File watcher for project directories.
//!
//! The notify callback thread performs the prepare phase only: it turns
//! raw notifications into [`WatchEvent`]s, keeps the creations and ships
//! them to the main loop as [`PendingChanges`]. Nothing is edited here.
//!
//! Files written into a new directory before its watch is registered
//! produce no event of their own, so a directory creation also reports
//! every file already inside it.

use anyhow::Result;
use notify::event::CreateKind;
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use stamp_core::stamper::{self, PendingChanges};
use stamp_core::WatchEvent;
use std::path::{Component, Path, PathBuf};
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::native_fs::{walk_project, EXCLUDED_DIRS};

/// File watcher that monitors project directories.
pub struct FileWatcher {
    /// Watcher handle (must keep alive)
    _watcher: RecommendedWatcher,
    /// Receiver for prepared creations
    event_rx: mpsc::UnboundedReceiver<PendingChanges>,
}

impl FileWatcher {
    /// Start watching every directory in `roots` recursively.
    pub fn new(roots: Vec<PathBuf>) -> Result<Self> {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let watched = roots.clone();

        let mut watcher = RecommendedWatcher::new(
            move |result: notify::Result<Event>| match result {
                Ok(event) => {
                    let events = Self::process_event(&event, &watched);
                    if let Some(pending) = stamper::prepare(events) {
                        // Receiver dropped means the daemon is shutting down
                        let _ = event_tx.send(pending);
                    }
                }
                Err(e) => {
                    error!("File watcher error: {}", e);
                }
            },
            Config::default(),
        )?;

        for root in &roots {
            watcher.watch(root, RecursiveMode::Recursive)?;
            info!("Watching {}", root.display());
        }

        Ok(Self {
            _watcher: watcher,
            event_rx,
        })
    }

    /// Convert a raw notification into watch events we care about.
    fn process_event(event: &Event, roots: &[PathBuf]) -> Vec<WatchEvent> {
        let mut events = Vec::new();
        for path in event.paths.iter().filter(|path| Self::is_watched(path, roots)) {
            let watch_event = match event.kind {
                EventKind::Create(CreateKind::File) => WatchEvent::created(path, false),
                EventKind::Create(CreateKind::Folder) => WatchEvent::created(path, true),
                // Backends that can't tell: ask the filesystem
                EventKind::Create(_) => WatchEvent::created(path, path.is_dir()),
                EventKind::Modify(_) => Some(WatchEvent::Modified(path.clone())),
                EventKind::Remove(_) => Some(WatchEvent::Removed(path.clone())),
                _ => None,
            };
            let Some(watch_event) = watch_event else {
                continue;
            };
            debug!("Watch event: {:?}", watch_event);

            let new_dir = matches!(watch_event, WatchEvent::Created { is_dir: true, .. });
            events.push(watch_event);
            if new_dir {
                events.extend(Self::files_in_new_dir(path));
            }
        }
        events
    }

    /// Creation events for files that already exist in a new directory.
    fn files_in_new_dir(dir: &Path) -> Vec<WatchEvent> {
        let found: Vec<WatchEvent> = walk_project(dir)
            .iter()
            .filter_map(|file| WatchEvent::created(file, false))
            .collect();
        if !found.is_empty() {
            debug!("{} file(s) already in new directory {}", found.len(), dir.display());
        }
        found
    }

    /// Inside a watched root and not in a hidden or dependency directory.
    fn is_watched(path: &Path, roots: &[PathBuf]) -> bool {
        let Some(relative) = roots.iter().find_map(|root| path.strip_prefix(root).ok()) else {
            return false;
        };

        relative.components().all(|c| match c {
            Component::Normal(part) => part
                .to_str()
                .map(|name| !name.starts_with('.') && !EXCLUDED_DIRS.contains(&name))
                .unwrap_or(false),
            _ => false,
        })
    }

    /// Get the receiver for prepared creations.
    pub fn event_rx(&mut self) -> &mut mpsc::UnboundedReceiver<PendingChanges> {
        &mut self.event_rx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{ModifyKind, RemoveKind};

    fn event(kind: EventKind, path: &str) -> Event {
        Event::new(kind).add_path(PathBuf::from(path))
    }

    #[test]
    fn test_process_event_maps_creations() {
        let roots = vec![PathBuf::from("/proj")];

        let events = FileWatcher::process_event(
            &event(EventKind::Create(CreateKind::File), "/proj/src/main.rs"),
            &roots,
        );
        assert_eq!(
            events,
            vec![WatchEvent::Created {
                parent: "/proj/src".into(),
                name: "main.rs".into(),
                is_dir: false,
            }]
        );

        let events = FileWatcher::process_event(
            &event(EventKind::Create(CreateKind::Folder), "/proj/src"),
            &roots,
        );
        assert!(matches!(&events[0], WatchEvent::Created { is_dir: true, .. }));
    }

    #[test]
    fn test_process_event_other_kinds() {
        let roots = vec![PathBuf::from("/proj")];

        let events = FileWatcher::process_event(
            &event(EventKind::Modify(ModifyKind::Any), "/proj/a.rs"),
            &roots,
        );
        assert_eq!(events, vec![WatchEvent::Modified("/proj/a.rs".into())]);

        let events = FileWatcher::process_event(
            &event(EventKind::Remove(RemoveKind::File), "/proj/a.rs"),
            &roots,
        );
        assert_eq!(events, vec![WatchEvent::Removed("/proj/a.rs".into())]);

        assert!(stamper::prepare(events).is_none());
    }

    #[test]
    fn test_hidden_and_dependency_paths_are_ignored() {
        let roots = vec![PathBuf::from("/proj")];
        for path in [
            "/proj/.git/objects/ab",
            "/proj/node_modules/x/index.js",
            "/proj/target/debug/main.rs",
            "/elsewhere/a.rs",
        ] {
            let events = FileWatcher::process_event(
                &event(EventKind::Create(CreateKind::File), path),
                &roots,
            );
            assert!(events.is_empty(), "{path}");
        }
    }

    #[test]
    fn test_new_directory_reports_existing_files() {
        let temp = tempfile::TempDir::new().unwrap();
        let root = temp.path().canonicalize().unwrap().join("proj");
        std::fs::create_dir_all(root.join("a/b")).unwrap();
        std::fs::write(root.join("a/b/x.rs"), "").unwrap();
        std::fs::write(root.join("a/y.py"), "").unwrap();

        let events = FileWatcher::process_event(
            &Event::new(EventKind::Create(CreateKind::Folder)).add_path(root.join("a")),
            &[root.clone()],
        );

        let pending = stamper::prepare(events).unwrap();
        let mut files: Vec<PathBuf> = pending
            .entries()
            .iter()
            .filter(|entry| !entry.is_dir)
            .map(|entry| entry.path())
            .collect();
        files.sort();
        assert_eq!(files, vec![root.join("a/b/x.rs"), root.join("a/y.py")]);
        assert!(pending.entries().iter().any(|entry| entry.is_dir && entry.path() == root.join("a")));
    }
}
