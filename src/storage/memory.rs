//! In-memory durable store.
//!
//! "Durable" only for the lifetime of the process, but clones share the same
//! map, so two [`StateManager`](crate::state::StateManager)s built over clones of
//! one `MemoryStore` see each other's writes. That is what tests and embedded
//! hosts without a filesystem use.

use crate::domain::error::{PageShellError, Result};
use crate::storage::backend::DurableStore;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// Shared in-memory string map.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().map_or(0, |entries| entries.len())
    }

    /// Returns `true` when nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, String>>> {
        self.entries
            .lock()
            .map_err(|e| PageShellError::Storage(format!("memory store poisoned: {e}")))
    }
}

impl DurableStore for MemoryStore {
    fn read(&self, key: &str) -> Result<Option<String>> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn write(&mut self, key: &str, value: &str) -> Result<()> {
        self.lock()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        self.lock()?.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_entries() {
        let mut a = MemoryStore::new();
        let b = a.clone();

        a.write("k", "1").unwrap();
        assert_eq!(b.read("k").unwrap().as_deref(), Some("1"));
        assert_eq!(b.len(), 1);
    }

    #[test]
    fn removing_absent_key_is_fine() {
        let mut store = MemoryStore::new();
        store.remove("missing").unwrap();
        assert!(store.is_empty());
    }
}
