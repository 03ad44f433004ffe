//! Persisted per-project key/value settings.
//!
//! The only value stored today is the ProcessedFlag written by the
//! backfill. Absent keys read as `false`.

use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt store: {0}")]
    Corrupt(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Per-project boolean settings, keyed by `(project id, key)`.
pub trait KeyValueStore: Send {
    fn get_bool(&self, project_id: &str, key: &str) -> bool;

    /// Set and persist a value.
    fn set_bool(&mut self, project_id: &str, key: &str, value: bool) -> Result<()>;

    /// Remove and persist. Removing a missing key is not an error.
    fn remove(&mut self, project_id: &str, key: &str) -> Result<()>;
}

/// Volatile store for tests and one-shot runs.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    values: HashMap<(String, String), bool>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for InMemoryStore {
    fn get_bool(&self, project_id: &str, key: &str) -> bool {
        self.values
            .get(&(project_id.to_string(), key.to_string()))
            .copied()
            .unwrap_or(false)
    }

    fn set_bool(&mut self, project_id: &str, key: &str, value: bool) -> Result<()> {
        self.values
            .insert((project_id.to_string(), key.to_string()), value);
        Ok(())
    }

    fn remove(&mut self, project_id: &str, key: &str) -> Result<()> {
        self.values.remove(&(project_id.to_string(), key.to_string()));
        Ok(())
    }
}

impl<S: KeyValueStore + ?Sized> KeyValueStore for Box<S> {
    fn get_bool(&self, project_id: &str, key: &str) -> bool {
        (**self).get_bool(project_id, key)
    }

    fn set_bool(&mut self, project_id: &str, key: &str, value: bool) -> Result<()> {
        (**self).set_bool(project_id, key, value)
    }

    fn remove(&mut self, project_id: &str, key: &str) -> Result<()> {
        (**self).remove(project_id, key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_reads_false() {
        let store = InMemoryStore::new();
        assert!(!store.get_bool("proj.0011", "pathstamp.processed"));
    }

    #[test]
    fn test_set_and_remove() {
        let mut store = InMemoryStore::new();
        store.set_bool("proj.0011", "pathstamp.processed", true).unwrap();
        assert!(store.get_bool("proj.0011", "pathstamp.processed"));
        assert!(!store.get_bool("other.2233", "pathstamp.processed"));

        store.remove("proj.0011", "pathstamp.processed").unwrap();
        assert!(!store.get_bool("proj.0011", "pathstamp.processed"));
        store.remove("proj.0011", "pathstamp.processed").unwrap();
    }
}
