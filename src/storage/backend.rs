//! Durable key/value store abstraction.
//!
//! This module defines the [`DurableStore`] trait consumed by the
//! [`StateManager`](crate::state::StateManager) for persistent keys. A store is a
//! dumb string-to-string map: key namespacing and JSON (de)serialization are the
//! state manager's responsibility, not the store's.

use crate::domain::error::Result;

/// Abstraction over durable string storage.
///
/// The state manager only ever calls these three operations, synchronously, from
/// inside its own lock, so implementations need `Send` but not `Sync`.
///
/// # Implementations
///
/// - [`MemoryStore`](super::MemoryStore): process-local map, shareable between managers
/// - [`JsonFileStore`](super::JsonFileStore): JSON file with atomic writes
///
/// # Examples
///
/// ```
/// use pageshell::storage::{DurableStore, MemoryStore};
///
/// let mut store = MemoryStore::new();
/// store.write("state:theme", "\"dark\"")?;
/// assert_eq!(store.read("state:theme")?, Some("\"dark\"".to_string()));
/// store.remove("state:theme")?;
/// assert_eq!(store.read("state:theme")?, None);
/// # Ok::<(), pageshell::PageShellError>(())
/// ```
pub trait DurableStore: Send {
    /// Reads the serialized value stored under `key`.
    ///
    /// Returns `Ok(None)` when nothing is stored.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing medium cannot be read.
    fn read(&self, key: &str) -> Result<Option<String>>;

    /// Stores `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if the write cannot be made durable.
    fn write(&mut self, key: &str, value: &str) -> Result<()>;

    /// Removes `key`. Removing an absent key is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing medium cannot be updated.
    fn remove(&mut self, key: &str) -> Result<()>;
}
