//! JSON file-based durable store.
//!
//! Keeps every entry in one human-readable JSON file and rewrites the file on
//! each modification using an atomic write (write-to-temp + rename), so a crash
//! never leaves a half-written file behind.
//!
//! # File Format
//!
//! ```json
//! {
//!   "version": 1,
//!   "entries": {
//!     "state:theme": "\"dark\"",
//!     "state:user": "{\"name\":\"ada\"}"
//!   }
//! }
//! ```
//!
//! Values are the already-serialized strings handed over by the state manager.

use crate::domain::error::{PageShellError, Result};
use crate::storage::backend::DurableStore;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Current on-disk format version.
const FORMAT_VERSION: u32 = 1;

/// Top-level structure serialized to disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoreData {
    /// Version of the storage format for future migrations.
    version: u32,

    /// Stored entries, ordered by key for stable diffs.
    #[serde(default)]
    entries: BTreeMap<String, String>,
}

impl Default for StoreData {
    fn default() -> Self {
        Self {
            version: FORMAT_VERSION,
            entries: BTreeMap::new(),
        }
    }
}

/// JSON file store.
///
/// The whole dataset lives in memory and is persisted on every write or
/// remove. `Send` but not `Sync`; the state manager serializes access.
pub struct JsonFileStore {
    /// Path to the JSON file on disk.
    file_path: PathBuf,

    /// In-memory copy, loaded on creation.
    data: StoreData,

    /// Set when `data` differs from the file (a save failed).
    dirty: bool,
}

impl JsonFileStore {
    /// Opens or creates a JSON store at `file_path`.
    ///
    /// Parent directories are created automatically. A missing file yields an
    /// empty store.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Parent directory creation fails
    /// - The file exists but contains invalid JSON
    /// - The file cannot be read
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use pageshell::storage::JsonFileStore;
    ///
    /// let store = JsonFileStore::open("/tmp/pageshell/state.json")?;
    /// # Ok::<(), pageshell::PageShellError>(())
    /// ```
    pub fn open(file_path: impl Into<PathBuf>) -> Result<Self> {
        let file_path = file_path.into();
        tracing::debug!(path = ?file_path, "opening JSON store");

        if let Some(parent) = file_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let data = if file_path.exists() {
            Self::load_from_file(&file_path)?
        } else {
            tracing::debug!("initializing new empty store");
            StoreData::default()
        };

        tracing::debug!(entries = data.entries.len(), "JSON store ready");

        Ok(Self {
            file_path,
            data,
            dirty: false,
        })
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.file_path
    }

    fn load_from_file(path: &Path) -> Result<StoreData> {
        let contents = std::fs::read_to_string(path)?;
        let data: StoreData = serde_json::from_str(&contents)
            .map_err(|e| PageShellError::Storage(format!("failed to parse JSON store: {e}")))?;

        if data.version > FORMAT_VERSION {
            return Err(PageShellError::Storage(format!(
                "store format version {} is newer than supported version {FORMAT_VERSION}",
                data.version
            )));
        }

        tracing::debug!(version = data.version, entries = data.entries.len(), "loaded store data");
        Ok(data)
    }

    /// Persists the in-memory data with an atomic write.
    fn save_to_file(&mut self) -> Result<()> {
        self.dirty = true;

        let json = serde_json::to_string_pretty(&self.data)?;
        let tmp_path = self.file_path.with_extension("tmp");

        tracing::trace!(tmp_path = ?tmp_path, "writing to temporary file");
        std::fs::write(&tmp_path, json)?;
        std::fs::rename(&tmp_path, &self.file_path)?;

        self.dirty = false;
        tracing::trace!(path = ?self.file_path, "store saved");
        Ok(())
    }
}

impl DurableStore for JsonFileStore {
    fn read(&self, key: &str) -> Result<Option<String>> {
        Ok(self.data.entries.get(key).cloned())
    }

    fn write(&mut self, key: &str, value: &str) -> Result<()> {
        if self.data.entries.get(key).map(String::as_str) == Some(value) && !self.dirty {
            return Ok(());
        }
        self.data.entries.insert(key.to_string(), value.to_string());
        self.save_to_file()
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        if self.data.entries.remove(key).is_none() && !self.dirty {
            return Ok(());
        }
        self.save_to_file()
    }
}

impl std::fmt::Debug for JsonFileStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonFileStore")
            .field("file_path", &self.file_path)
            .field("entries", &self.data.entries.len())
            .field("dirty", &self.dirty)
            .finish()
    }
}

impl Drop for JsonFileStore {
    /// Retries a failed save one last time.
    fn drop(&mut self) {
        if self.dirty {
            tracing::debug!("saving dirty store on drop");
            if let Err(e) = self.save_to_file() {
                tracing::error!(error = %e, "failed to save store on drop");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entries_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("state.json");

        {
            let mut store = JsonFileStore::open(&path).unwrap();
            store.write("state:theme", "\"dark\"").unwrap();
            store.write("state:count", "3").unwrap();
            store.remove("state:count").unwrap();
        }

        let store = JsonFileStore::open(&path).unwrap();
        assert_eq!(store.read("state:theme").unwrap().as_deref(), Some("\"dark\""));
        assert_eq!(store.read("state:count").unwrap(), None);
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn corrupt_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "{not json").unwrap();

        assert!(matches!(JsonFileStore::open(&path), Err(PageShellError::Storage(_))));
    }

    #[test]
    fn newer_format_versions_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, r#"{"version": 99, "entries": {}}"#).unwrap();

        assert!(JsonFileStore::open(&path).is_err());
    }
}
