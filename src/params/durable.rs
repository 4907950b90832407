// SPDX-License-Identifier: GPL-3.0-only

//! Durable key/value backends for the parameter store
//!
//! Both backends are internally synchronized so the store can write
//! statistics and parameters from separate critical sections.

use crate::errors::ParameterError;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{PoisonError, RwLock};
use tracing::{debug, info};

/// String-keyed durable storage
pub trait DurableStore: Send + Sync {
    fn read(&self, key: &str) -> Option<String>;
    fn write(&self, key: &str, value: &str);
    fn keys(&self) -> Vec<String>;
    /// Persist pending writes
    fn flush(&self) -> Result<(), ParameterError>;
}

/// Volatile store, used for tests and ephemeral sessions
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DurableStore for MemoryStore {
    fn read(&self, key: &str) -> Option<String> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn write(&self, key: &str, value: &str) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());
    }

    fn keys(&self) -> Vec<String> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    fn flush(&self) -> Result<(), ParameterError> {
        Ok(())
    }
}

/// JSON file store, one flat object of string values
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: RwLock<BTreeMap<String, String>>,
    dirty: AtomicBool,
}

impl FileStore {
    /// Default location under the user's config directory
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("framefx").join("parameters.json"))
    }

    /// Open the store at `path`; a missing file starts empty.
    ///
    /// A file that exists but does not parse is an error, so a corrupt
    /// store is never silently replaced.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ParameterError> {
        let path = path.as_ref().to_path_buf();
        let entries = if path.exists() {
            let text = std::fs::read_to_string(&path)?;
            let entries: BTreeMap<String, String> = serde_json::from_str(&text)?;
            info!(path = %path.display(), records = entries.len(), "Loaded parameter file");
            entries
        } else {
            debug!(path = %path.display(), "Parameter file not found, starting empty");
            BTreeMap::new()
        };

        Ok(Self {
            path,
            entries: RwLock::new(entries),
            dirty: AtomicBool::new(false),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DurableStore for FileStore {
    fn read(&self, key: &str) -> Option<String> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn write(&self, key: &str, value: &str) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());
        self.dirty.store(true, Ordering::Release);
    }

    fn keys(&self) -> Vec<String> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    fn flush(&self) -> Result<(), ParameterError> {
        if !self.dirty.swap(false, Ordering::AcqRel) {
            return Ok(());
        }

        let text = {
            let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
            serde_json::to_string_pretty(&*entries)?
        };

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        // Write beside the target then rename so a crash never leaves half a file
        let tmp = self.path.with_extension("json.tmp");
        let result = std::fs::write(&tmp, text).and_then(|_| std::fs::rename(&tmp, &self.path));
        if let Err(e) = result {
            self.dirty.store(true, Ordering::Release);
            return Err(e.into());
        }

        debug!(path = %self.path.display(), "Flushed parameter file");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_store_persists_across_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("params.json");

        let store = FileStore::open(&path).unwrap();
        store.write("ABC_Width", "5");
        store.flush().unwrap();

        let reopened = FileStore::open(&path).unwrap();
        assert_eq!(reopened.read("ABC_Width").as_deref(), Some("5"));
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("params.json");
        std::fs::write(&path, "{ not json").unwrap();

        assert!(matches!(
            FileStore::open(&path),
            Err(ParameterError::Json(_))
        ));
    }

    #[test]
    fn test_memory_store_keys() {
        let store = MemoryStore::new();
        store.write("b", "2");
        store.write("a", "1");
        assert_eq!(store.keys(), vec!["a".to_string(), "b".to_string()]);
    }
}
