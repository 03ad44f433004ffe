//! Persistence for per-project settings.
//!
//! Stores the processed flags on disk so a backfill survives restarts.
//! Settings live in one JSON file (by default
//! `<data dir>/pathstamp/state.json`), keyed by project id.

use serde::{Deserialize, Serialize};
use stamp_core::store::{KeyValueStore, Result};
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use tracing::warn;

/// Settings of a single project.
pub type ProjectSettings = BTreeMap<String, bool>;

/// On-disk layout of the state file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PersistedState {
    /// Settings per project id.
    pub projects: BTreeMap<String, ProjectSettings>,
}

impl PersistedState {
    pub fn get(&self, project_id: &str, key: &str) -> Option<bool> {
        self.projects.get(project_id)?.get(key).copied()
    }

    pub fn set(&mut self, project_id: &str, key: &str, value: bool) {
        self.projects
            .entry(project_id.to_string())
            .or_default()
            .insert(key.to_string(), value);
    }

    /// Remove a key; drops the project entry once it is empty.
    pub fn remove(&mut self, project_id: &str, key: &str) {
        if let Some(settings) = self.projects.get_mut(project_id) {
            settings.remove(key);
            if settings.is_empty() {
                self.projects.remove(project_id);
            }
        }
    }
}

/// JSON-file backed [`KeyValueStore`].
pub struct JsonFileStore {
    /// Path to the storage file.
    path: PathBuf,
    /// In-memory cache.
    state: PersistedState,
}

impl JsonFileStore {
    /// Open the store at `path`. A missing file is an empty store; an
    /// unreadable one is logged and treated as empty.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let mut storage = Self {
            path: path.into(),
            state: PersistedState::default(),
        };

        match storage.load() {
            Ok(loaded) => storage.state = loaded,
            Err(e) => warn!("Ignoring unreadable state file {}: {}", storage.path.display(), e),
        }

        storage
    }

    /// Load state from disk.
    pub fn load(&self) -> Result<PersistedState> {
        if !self.path.exists() {
            return Ok(PersistedState::default());
        }

        let contents = fs::read_to_string(&self.path)?;
        let state: PersistedState = serde_json::from_str(&contents)?;
        Ok(state)
    }

    /// Save current state to disk.
    pub fn save(&self) -> Result<()> {
        // Ensure directory exists
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = serde_json::to_string_pretty(&self.state)?;
        // Write then rename so a crash never leaves a truncated file.
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, contents)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl KeyValueStore for JsonFileStore {
    fn get_bool(&self, project_id: &str, key: &str) -> bool {
        self.state.get(project_id, key).unwrap_or(false)
    }

    fn set_bool(&mut self, project_id: &str, key: &str, value: bool) -> Result<()> {
        self.state.set(project_id, key, value);
        self.save()
    }

    fn remove(&mut self, project_id: &str, key: &str) -> Result<()> {
        self.state.remove(project_id, key);
        self.save()
    }
}
