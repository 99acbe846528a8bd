//! # Synchronous in-process event bus.
//!
//! [`EventBus`] maps event names to ordered listener lists and delivers each
//! emission synchronously, on the caller's thread, before `emit` returns.
//!
//! ## Rules
//! - **FIFO delivery**: listeners run in registration order.
//! - **Snapshot dispatch**: `emit` copies the listener list before iterating;
//!   listeners added or removed during an emission affect the next one only.
//! - **Isolation**: a panicking listener is logged and skipped; siblings still run
//!   and nothing propagates to the emitter.
//! - **Once**: a `once` listener is claimed and deregistered *before* its callback
//!   runs, so it fires at most once even if the callback re-emits the event.
//! - **No empty keys**: an event name disappears from [`EventBus::event_names`]
//!   as soon as its last listener is removed.
//!
//! The bus is a cheap `Clone` handle; every clone observes the same registry.

use crate::infrastructure::isolation::run_isolated;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

/// A registered event callback. Receives the emitted payload.
pub type Listener = Arc<dyn Fn(&Value) + Send + Sync>;

/// Default soft ceiling on listeners per event name.
pub const DEFAULT_MAX_LISTENERS: usize = 10;

/// Tuning knobs for [`EventBus`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventBusOptions {
    /// Listener count per event above which a leak warning is logged.
    ///
    /// Advisory only: registration always succeeds.
    pub max_listeners: usize,
}

impl Default for EventBusOptions {
    fn default() -> Self {
        Self {
            max_listeners: DEFAULT_MAX_LISTENERS,
        }
    }
}

/// One registration of a listener to an event name.
#[derive(Clone)]
struct Entry {
    id: u64,
    listener: Listener,
    /// `Some` for `once` registrations; flipped to `true` by whoever fires it first.
    claimed: Option<Arc<AtomicBool>>,
}

#[derive(Default)]
struct Registry {
    events: HashMap<String, Vec<Entry>>,
}

impl Registry {
    /// Removes the entry with `id`, dropping the event key once it is empty.
    fn remove_id(&mut self, event: &str, id: u64) -> bool {
        let Some(entries) = self.events.get_mut(event) else {
            return false;
        };
        let before = entries.len();
        entries.retain(|e| e.id != id);
        let removed = entries.len() != before;
        if entries.is_empty() {
            self.events.remove(event);
        }
        removed
    }
}

struct BusInner {
    registry: Mutex<Registry>,
    next_id: AtomicU64,
    options: EventBusOptions,
}

impl BusInner {
    fn registry(&self) -> MutexGuard<'_, Registry> {
        // Listeners never run under this lock, so poisoning can only come from
        // a bug inside the bus itself; the registry is still structurally valid.
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Synchronous publish/subscribe registry.
///
/// # Examples
///
/// ```
/// use pageshell::events::EventBus;
/// use serde_json::json;
/// use std::sync::{Arc, Mutex};
///
/// let bus = EventBus::new();
/// let seen = Arc::new(Mutex::new(Vec::new()));
///
/// let sink = Arc::clone(&seen);
/// let sub = bus.on("user:login", move |payload| {
///     sink.lock().unwrap().push(payload["name"].as_str().unwrap_or("").to_string());
/// });
///
/// bus.emit("user:login", json!({"name": "ada"}));
/// sub.unsubscribe();
/// bus.emit("user:login", json!({"name": "grace"}));
///
/// assert_eq!(*seen.lock().unwrap(), vec!["ada".to_string()]);
/// ```
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    /// Creates a bus with default options.
    #[must_use]
    pub fn new() -> Self {
        Self::with_options(EventBusOptions::default())
    }

    /// Creates a bus with the given options.
    #[must_use]
    pub fn with_options(options: EventBusOptions) -> Self {
        Self {
            inner: Arc::new(BusInner {
                registry: Mutex::new(Registry::default()),
                next_id: AtomicU64::new(1),
                options,
            }),
        }
    }

    /// Subscribes `callback` to `event`.
    ///
    /// The returned [`Subscription`] removes exactly this registration.
    pub fn on<F>(&self, event: &str, callback: F) -> Subscription
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.on_listener(event, Arc::new(callback))
    }

    /// Subscribes a pre-built [`Listener`].
    ///
    /// Use this form when the same `Arc` will later be passed to [`EventBus::off`].
    pub fn on_listener(&self, event: &str, listener: Listener) -> Subscription {
        self.register(event, listener, None)
    }

    /// Subscribes `callback` for a single delivery.
    ///
    /// The registration is removed before the callback runs, so it fires at most
    /// once even if the callback emits `event` again.
    pub fn once<F>(&self, event: &str, callback: F) -> Subscription
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.once_listener(event, Arc::new(callback))
    }

    /// Single-delivery variant of [`EventBus::on_listener`].
    pub fn once_listener(&self, event: &str, listener: Listener) -> Subscription {
        self.register(event, listener, Some(Arc::new(AtomicBool::new(false))))
    }

    fn register(&self, event: &str, listener: Listener, claimed: Option<Arc<AtomicBool>>) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let once = claimed.is_some();

        let count = {
            let mut registry = self.inner.registry();
            let entries = registry.events.entry(event.to_string()).or_default();
            entries.push(Entry { id, listener, claimed });
            entries.len()
        };

        if count > self.inner.options.max_listeners {
            tracing::warn!(
                event = %event,
                listeners = count,
                max = self.inner.options.max_listeners,
                "possible listener leak: too many listeners for event"
            );
        }
        tracing::trace!(event = %event, id, once, "listener subscribed");

        Subscription {
            bus: Arc::downgrade(&self.inner),
            event: event.to_string(),
            id,
        }
    }

    /// Removes listeners from `event`.
    ///
    /// With `None`, every listener for `event` is removed. With `Some(listener)`,
    /// the first registration of that exact `Arc` (for `on` or `once`) is removed.
    pub fn off(&self, event: &str, listener: Option<&Listener>) {
        let mut registry = self.inner.registry();

        let Some(listener) = listener else {
            if registry.events.remove(event).is_some() {
                tracing::trace!(event = %event, "removed all listeners for event");
            }
            return;
        };

        let Some(entries) = registry.events.get_mut(event) else {
            return;
        };
        if let Some(index) = entries.iter().position(|e| Arc::ptr_eq(&e.listener, listener)) {
            entries.remove(index);
            tracing::trace!(event = %event, "listener unsubscribed");
        }
        if entries.is_empty() {
            registry.events.remove(event);
        }
    }

    /// Delivers `payload` to every listener of `event`, synchronously and in order.
    ///
    /// Returns the number of listeners that ran to completion.
    pub fn emit(&self, event: &str, payload: Value) -> usize {
        let snapshot: Vec<Entry> = {
            let registry = self.inner.registry();
            match registry.events.get(event) {
                Some(entries) => entries.clone(),
                None => {
                    tracing::trace!(event = %event, "emit with no listeners");
                    return 0;
                }
            }
        };

        tracing::trace!(event = %event, listeners = snapshot.len(), "emit");

        let mut delivered = 0;
        for entry in snapshot {
            if let Some(claimed) = &entry.claimed {
                if claimed.swap(true, Ordering::AcqRel) {
                    continue;
                }
                self.inner.registry().remove_id(event, entry.id);
            }

            if run_isolated(event, || (entry.listener)(&payload)) {
                delivered += 1;
            }
        }
        delivered
    }

    /// Number of listeners currently registered for `event`.
    #[must_use]
    pub fn listener_count(&self, event: &str) -> usize {
        self.inner.registry().events.get(event).map_or(0, Vec::len)
    }

    /// Names of all events that currently have at least one listener.
    #[must_use]
    pub fn event_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.registry().events.keys().cloned().collect();
        names.sort();
        names
    }

    /// Clears the entire registry.
    pub fn remove_all_listeners(&self) {
        let mut registry = self.inner.registry();
        let events = registry.events.len();
        registry.events.clear();
        tracing::debug!(events, "removed all listeners");
    }

    /// Options this bus was built with.
    #[must_use]
    pub fn options(&self) -> &EventBusOptions {
        &self.inner.options
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("events", &self.event_names())
            .field("options", &self.inner.options)
            .finish()
    }
}

/// Handle to one registration, returned by [`EventBus::on`] and [`EventBus::once`].
///
/// Dropping the handle does **not** unsubscribe.
#[derive(Debug, Clone)]
pub struct Subscription {
    bus: Weak<BusInner>,
    event: String,
    id: u64,
}

impl Subscription {
    /// Removes this registration. Calling it again is a no-op.
    pub fn unsubscribe(&self) {
        if let Some(bus) = self.bus.upgrade() {
            if bus.registry().remove_id(&self.event, self.id) {
                tracing::trace!(event = %self.event, id = self.id, "subscription removed");
            }
        }
    }

    /// Returns `true` while the registration is still in the registry.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.bus.upgrade().is_some_and(|bus| {
            bus.registry()
                .events
                .get(&self.event)
                .is_some_and(|entries| entries.iter().any(|e| e.id == self.id))
        })
    }

    /// Event name this subscription belongs to.
    #[must_use]
    pub fn event(&self) -> &str {
        &self.event
    }
}

impl std::fmt::Debug for BusInner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BusInner").finish_non_exhaustive()
    }
}
