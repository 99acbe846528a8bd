//! Reactive key/value store.
//!
//! [`StateManager`] holds JSON values by key, notifies per-key subscribers on
//! change, keeps a bounded audit history, and mirrors a configured set of
//! *persistent* keys into a [`DurableStore`].
//!
//! # Semantics
//!
//! - `set` with a value equal to the current one is a no-op: no history entry,
//!   no notification, no storage write.
//! - Subscribers run synchronously after the store is updated, in subscription
//!   order, over a snapshot of the subscriber list. A panicking subscriber is
//!   logged and skipped.
//! - Persistence is best-effort. A failed write is logged and the in-memory
//!   value stays authoritative; nothing is rolled back.
//! - `update` is N sequential `set`s, not a transaction.

use super::history::{ChangeHistory, ChangeRecord, DEFAULT_MAX_HISTORY};
use crate::domain::error::PageShellError;
use crate::infrastructure::isolation::run_isolated;
use crate::storage::{DurableStore, MemoryStore};
use chrono::Utc;
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

/// Change callback: `(new_value, old_value)`. `new_value` is `None` after a delete.
pub type StateCallback = Arc<dyn Fn(Option<&Value>, Option<&Value>) + Send + Sync>;

/// Default prefix for persisted keys in the durable store.
pub const DEFAULT_STORAGE_PREFIX: &str = "state:";

/// Construction options for [`StateManager`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateOptions {
    /// Keys mirrored into durable storage.
    pub persistent: Vec<String>,
    /// Capacity of the change history ring buffer.
    pub max_history: usize,
    /// Namespace prefix for keys written to durable storage.
    pub storage_prefix: String,
}

impl Default for StateOptions {
    fn default() -> Self {
        Self {
            persistent: Vec::new(),
            max_history: DEFAULT_MAX_HISTORY,
            storage_prefix: DEFAULT_STORAGE_PREFIX.to_string(),
        }
    }
}

impl StateOptions {
    /// Options with the given persistent keys and defaults otherwise.
    #[must_use]
    pub fn persistent<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            persistent: keys.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }
}

#[derive(Clone)]
struct SubEntry {
    id: u64,
    callback: StateCallback,
}

struct StateData {
    values: HashMap<String, Value>,
    subscribers: HashMap<String, Vec<SubEntry>>,
    history: ChangeHistory,
    store: Box<dyn DurableStore>,
}

struct StateInner {
    data: Mutex<StateData>,
    persistent: HashSet<String>,
    prefix: String,
    next_id: AtomicU64,
}

impl StateInner {
    fn data(&self) -> MutexGuard<'_, StateData> {
        self.data.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn storage_key(&self, key: &str) -> String {
        format!("{}{key}", self.prefix)
    }
}

/// Keyed reactive store with optional persistence.
///
/// Cheap to clone; clones share the same store.
///
/// # Examples
///
/// ```
/// use pageshell::state::{StateManager, StateOptions};
/// use pageshell::storage::MemoryStore;
/// use serde_json::json;
///
/// let storage = MemoryStore::new();
/// let state = StateManager::new(StateOptions::persistent(["theme"]), storage.clone());
/// state.set("theme", json!("dark"));
///
/// // A fresh manager over the same storage rehydrates the persistent key.
/// let restored = StateManager::new(StateOptions::persistent(["theme"]), storage);
/// assert_eq!(restored.get("theme"), Some(json!("dark")));
/// ```
#[derive(Clone)]
pub struct StateManager {
    inner: Arc<StateInner>,
}

impl StateManager {
    /// Creates a manager and hydrates persistent keys from `store`.
    ///
    /// Never fails: a key whose stored copy cannot be read or parsed is logged
    /// and left absent.
    pub fn new(options: StateOptions, store: impl DurableStore + 'static) -> Self {
        Self::with_boxed_store(options, Box::new(store))
    }

    /// Creates a manager over a fresh, unshared [`MemoryStore`].
    #[must_use]
    pub fn in_memory(options: StateOptions) -> Self {
        Self::new(options, MemoryStore::new())
    }

    /// Like [`StateManager::new`] for an already boxed store.
    #[must_use]
    pub fn with_boxed_store(options: StateOptions, store: Box<dyn DurableStore>) -> Self {
        let persistent: HashSet<String> = options.persistent.iter().cloned().collect();
        let inner = StateInner {
            data: Mutex::new(StateData {
                values: HashMap::new(),
                subscribers: HashMap::new(),
                history: ChangeHistory::new(options.max_history),
                store,
            }),
            persistent,
            prefix: options.storage_prefix,
            next_id: AtomicU64::new(1),
        };

        let manager = Self {
            inner: Arc::new(inner),
        };
        manager.load_persistent(&options.persistent);
        manager
    }

    fn load_persistent(&self, keys: &[String]) {
        let mut data = self.inner.data();
        let mut loaded = 0_usize;

        for key in keys {
            let storage_key = self.inner.storage_key(key);
            let raw = match data.store.read(&storage_key) {
                Ok(Some(raw)) => raw,
                Ok(None) => continue,
                Err(e) => {
                    tracing::error!(key = %key, error = %e, "failed to read persistent state");
                    continue;
                }
            };

            match serde_json::from_str::<Value>(&raw) {
                Ok(value) => {
                    data.values.insert(key.clone(), value);
                    loaded += 1;
                }
                Err(e) => {
                    tracing::error!(key = %key, error = %e, "failed to parse persistent state");
                }
            }
        }

        tracing::debug!(persistent = keys.len(), loaded, "persistent state hydrated");
    }

    /// Returns the value stored under `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Value> {
        self.inner.data().values.get(key).cloned()
    }

    /// Returns the value stored under `key`, or `default` when absent.
    #[must_use]
    pub fn get_or(&self, key: &str, default: Value) -> Value {
        self.get(key).unwrap_or(default)
    }

    /// Stores `value` under `key` and notifies subscribers.
    ///
    /// Returns `false` when `value` equals the current value (nothing happens).
    pub fn set(&self, key: &str, value: Value) -> bool {
        let (old, subscribers) = {
            let mut data = self.inner.data();

            if data.values.get(key) == Some(&value) {
                tracing::trace!(key = %key, "state unchanged");
                return false;
            }

            let old = data.values.insert(key.to_string(), value.clone());
            data.history.push(ChangeRecord {
                key: key.to_string(),
                old_value: old.clone(),
                new_value: Some(value.clone()),
                timestamp: Utc::now(),
            });

            if self.inner.persistent.contains(key) {
                self.persist(&mut data, key, &value);
            }

            (old, Self::snapshot(&data, key))
        };

        tracing::debug!(key = %key, subscribers = subscribers.len(), "state changed");
        Self::notify(key, &subscribers, Some(&value), old.as_ref());
        true
    }

    fn persist(&self, data: &mut StateData, key: &str, value: &Value) {
        let storage_key = self.inner.storage_key(key);
        let result = serde_json::to_string(value)
            .map_err(PageShellError::from)
            .and_then(|raw| data.store.write(&storage_key, &raw));

        if let Err(e) = result {
            tracing::error!(key = %key, error = %e, "failed to persist state");
        }
    }

    fn unpersist(&self, data: &mut StateData, key: &str) {
        let storage_key = self.inner.storage_key(key);
        if let Err(e) = data.store.remove(&storage_key) {
            tracing::error!(key = %key, error = %e, "failed to remove persisted state");
        }
    }

    fn snapshot(data: &StateData, key: &str) -> Vec<SubEntry> {
        data.subscribers.get(key).cloned().unwrap_or_default()
    }

    fn notify(key: &str, subscribers: &[SubEntry], new: Option<&Value>, old: Option<&Value>) {
        for sub in subscribers {
            run_isolated(key, || (sub.callback)(new, old));
        }
    }

    /// Subscribes `callback` to changes of `key`.
    pub fn subscribe<F>(&self, key: &str, callback: F) -> StateSubscription
    where
        F: Fn(Option<&Value>, Option<&Value>) + Send + Sync + 'static,
    {
        self.subscribe_callback(key, Arc::new(callback))
    }

    /// Subscribes a pre-built [`StateCallback`], for later removal with [`StateManager::unsubscribe`].
    pub fn subscribe_callback(&self, key: &str, callback: StateCallback) -> StateSubscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner
            .data()
            .subscribers
            .entry(key.to_string())
            .or_default()
            .push(SubEntry { id, callback });

        tracing::trace!(key = %key, id, "state subscriber added");
        StateSubscription {
            state: Arc::downgrade(&self.inner),
            key: key.to_string(),
            id,
        }
    }

    /// Removes the first subscription of `callback` (by pointer identity) from `key`.
    pub fn unsubscribe(&self, key: &str, callback: &StateCallback) {
        let mut data = self.inner.data();
        let Some(subs) = data.subscribers.get_mut(key) else {
            return;
        };
        if let Some(index) = subs.iter().position(|s| Arc::ptr_eq(&s.callback, callback)) {
            subs.remove(index);
        }
        if subs.is_empty() {
            data.subscribers.remove(key);
        }
    }

    /// Returns `true` if `key` holds a value.
    #[must_use]
    pub fn has(&self, key: &str) -> bool {
        self.inner.data().values.contains_key(key)
    }

    /// Removes `key`, notifying subscribers with `new_value = None`.
    ///
    /// Returns whether the key was present.
    pub fn delete(&self, key: &str) -> bool {
        let (old, subscribers) = {
            let mut data = self.inner.data();
            let Some(old) = data.values.remove(key) else {
                return false;
            };
            if self.inner.persistent.contains(key) {
                self.unpersist(&mut data, key);
            }
            (old, Self::snapshot(&data, key))
        };

        tracing::debug!(key = %key, "state deleted");
        Self::notify(key, &subscribers, None, Some(&old));
        true
    }

    /// Removes every value, subscription and history record, and erases persisted copies.
    pub fn clear(&self) {
        let mut data = self.inner.data();
        let entries = data.values.len();
        data.values.clear();
        data.subscribers.clear();
        data.history.clear();

        let mut keys: Vec<&String> = self.inner.persistent.iter().collect();
        keys.sort();
        for key in keys {
            self.unpersist(&mut data, key);
        }
        tracing::debug!(entries, "state cleared");
    }

    /// Drops every in-memory value, subscription and history record while
    /// keeping persisted copies, so the next manager over the same storage
    /// rehydrates them.
    pub fn reset(&self) {
        let mut data = self.inner.data();
        let entries = data.values.len();
        data.values.clear();
        data.subscribers.clear();
        data.history.clear();
        tracing::debug!(entries, "state reset");
    }

    /// Point-in-time copy of every key/value pair.
    #[must_use]
    pub fn get_all(&self) -> Map<String, Value> {
        self.inner
            .data()
            .values
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Applies `set` for each pair, in iteration order.
    ///
    /// Not atomic: every pair is applied independently. Returns how many pairs
    /// actually changed a value.
    pub fn update<I, K>(&self, updates: I) -> usize
    where
        I: IntoIterator<Item = (K, Value)>,
        K: AsRef<str>,
    {
        updates
            .into_iter()
            .filter(|(key, value)| self.set(key.as_ref(), value.clone()))
            .count()
    }

    /// The `limit` most recent change records, newest last.
    #[must_use]
    pub fn get_history(&self, limit: usize) -> Vec<ChangeRecord> {
        self.inner.data().history.recent(limit)
    }

    /// Returns `true` if `key` is mirrored into durable storage.
    #[must_use]
    pub fn is_persistent(&self, key: &str) -> bool {
        self.inner.persistent.contains(key)
    }

    /// Number of stored keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.data().values.len()
    }

    /// Returns `true` when no key holds a value.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for StateManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let data = self.inner.data();
        f.debug_struct("StateManager")
            .field("keys", &data.values.len())
            .field("history", &data.history.len())
            .field("persistent", &self.inner.persistent)
            .finish()
    }
}

/// Handle to one state subscription.
///
/// Dropping the handle does **not** unsubscribe.
#[derive(Clone)]
pub struct StateSubscription {
    state: Weak<StateInner>,
    key: String,
    id: u64,
}

impl StateSubscription {
    /// Removes this subscription. Calling it again is a no-op.
    pub fn unsubscribe(&self) {
        let Some(state) = self.state.upgrade() else {
            return;
        };
        let mut data = state.data();
        if let Some(subs) = data.subscribers.get_mut(&self.key) {
            subs.retain(|s| s.id != self.id);
            if subs.is_empty() {
                data.subscribers.remove(&self.key);
            }
        }
    }

    /// Key this subscription watches.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl std::fmt::Debug for StateSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateSubscription")
            .field("key", &self.key)
            .field("id", &self.id)
            .finish()
    }
}
