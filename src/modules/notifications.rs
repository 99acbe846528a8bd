//! Built-in in-app notification module.
//!
//! Registered under [`NOTIFICATIONS_MODULE`]. Once loaded, the shell hands it to
//! the error handler, which then shows fault messages here instead of falling
//! back to blocking host alerts.

use super::loader::ModuleLoader;
use super::module::{FeatureModule, Teardown};
use crate::domain::error::Result;
use crate::errors::{Notification, Notifier, Severity};
use crate::events::{names, EventBus};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Module name the notification center is registered under.
pub const NOTIFICATIONS_MODULE: &str = "notifications";

/// Default number of notifications visible at once.
pub const DEFAULT_MAX_VISIBLE: usize = 5;

/// A notification currently on screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShownNotification {
    /// Identifier used to dismiss it.
    pub id: u64,
    /// What is displayed.
    #[serde(flatten)]
    pub notification: Notification,
    /// When it was shown.
    pub shown_at: DateTime<Utc>,
}

struct CenterState {
    bus: EventBus,
    max_visible: usize,
    visible: Mutex<VecDeque<ShownNotification>>,
    next_id: AtomicU64,
}

impl CenterState {
    fn visible(&self) -> MutexGuard<'_, VecDeque<ShownNotification>> {
        self.visible.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn dismiss(&self, id: u64) -> bool {
        let removed = {
            let mut visible = self.visible();
            let before = visible.len();
            visible.retain(|n| n.id != id);
            visible.len() != before
        };
        if removed {
            self.bus.emit(names::NOTIFICATION_DISMISSED, json!({ "id": id }));
        }
        removed
    }
}

/// Bounded stack of toast notifications.
///
/// Showing more than `max_visible` notifications drops the oldest. Each
/// notification with a non-zero duration is dismissed automatically when a
/// Tokio runtime is available; the timer is not cancelled by teardown.
pub struct NotificationCenter {
    state: Arc<CenterState>,
}

impl NotificationCenter {
    /// Creates a center emitting on `bus`.
    #[must_use]
    pub fn new(bus: EventBus, max_visible: usize) -> Self {
        Self {
            state: Arc::new(CenterState {
                bus,
                max_visible: max_visible.max(1),
                visible: Mutex::new(VecDeque::new()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Registers the center with `loader` under [`NOTIFICATIONS_MODULE`].
    pub fn register(loader: &ModuleLoader, max_visible: usize) {
        loader.register(NOTIFICATIONS_MODULE, move |ctx| async move {
            Ok(Self::new(ctx.bus, max_visible))
        });
    }

    /// Displays `notification` and returns its id.
    pub fn push(&self, notification: Notification) -> u64 {
        let id = self.state.next_id.fetch_add(1, Ordering::Relaxed);
        let duration_ms = notification.duration_ms;
        let shown = ShownNotification {
            id,
            notification,
            shown_at: Utc::now(),
        };

        let payload = serde_json::to_value(&shown).unwrap_or_else(|_| json!({ "id": id }));
        let evicted = {
            let mut visible = self.state.visible();
            visible.push_back(shown);
            let mut evicted = Vec::new();
            while visible.len() > self.state.max_visible {
                if let Some(old) = visible.pop_front() {
                    evicted.push(old.id);
                }
            }
            evicted
        };

        for old in evicted {
            tracing::trace!(id = old, "notification evicted");
            self.state
                .bus
                .emit(names::NOTIFICATION_DISMISSED, json!({ "id": old }));
        }
        self.state.bus.emit(names::NOTIFICATION_SHOWN, payload);

        if duration_ms > 0 {
            self.schedule_dismiss(id, Duration::from_millis(duration_ms));
        }
        id
    }

    fn schedule_dismiss(&self, id: u64, after: Duration) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let state = Arc::clone(&self.state);
        runtime.spawn(async move {
            tokio::time::sleep(after).await;
            state.dismiss(id);
        });
    }

    /// Shows an info notification.
    pub fn info(&self, message: &str) -> u64 {
        self.push(Notification::new(Severity::Info, "Info", message))
    }

    /// Shows a success notification.
    pub fn success(&self, message: &str) -> u64 {
        self.push(Notification::new(Severity::Success, "Success", message))
    }

    /// Shows a warning notification.
    pub fn warning(&self, message: &str) -> u64 {
        self.push(Notification::new(Severity::Warning, "Warning", message))
    }

    /// Shows an error notification.
    pub fn error(&self, message: &str) -> u64 {
        self.push(Notification::new(Severity::Error, "Error", message))
    }

    /// Removes notification `id`. Returns whether it was visible.
    pub fn dismiss(&self, id: u64) -> bool {
        self.state.dismiss(id)
    }

    /// Notifications on screen, oldest first.
    #[must_use]
    pub fn visible(&self) -> Vec<ShownNotification> {
        self.state.visible().iter().cloned().collect()
    }

    /// Removes every notification.
    pub fn clear(&self) {
        self.state.visible().clear();
    }
}

impl Notifier for NotificationCenter {
    fn show(&self, notification: Notification) {
        self.push(notification);
    }
}

impl Teardown for NotificationCenter {
    fn teardown(&self) -> Result<()> {
        self.clear();
        Ok(())
    }
}

impl FeatureModule for NotificationCenter {
    fn as_teardown(&self) -> Option<&dyn Teardown> {
        Some(self)
    }

    fn as_notifier(&self) -> Option<&dyn Notifier> {
        Some(self)
    }
}

impl std::fmt::Debug for NotificationCenter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationCenter")
            .field("max_visible", &self.state.max_visible)
            .field("visible", &self.state.visible().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn sticky(message: &str) -> Notification {
        Notification {
            duration_ms: 0,
            ..Notification::new(Severity::Info, "t", message)
        }
    }

    #[test]
    fn keeps_at_most_max_visible() {
        let center = NotificationCenter::new(EventBus::new(), 2);
        for n in 0..4 {
            center.push(sticky(&format!("n{n}")));
        }
        let messages: Vec<String> = center
            .visible()
            .into_iter()
            .map(|n| n.notification.message)
            .collect();
        assert_eq!(messages, vec!["n2", "n3"]);
    }

    #[test]
    fn emits_shown_with_id() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::<Value>::new()));
        let sink = Arc::clone(&seen);
        bus.on(names::NOTIFICATION_SHOWN, move |p| sink.lock().unwrap().push(p.clone()));

        let center = NotificationCenter::new(bus, DEFAULT_MAX_VISIBLE);
        let id = center.push(sticky("hello"));

        let seen = seen.lock().unwrap();
        assert_eq!(seen[0]["id"], json!(id));
        assert_eq!(seen[0]["message"], json!("hello"));
        assert_eq!(seen[0]["severity"], json!("info"));
    }

    #[test]
    fn dismiss_reports_presence() {
        let center = NotificationCenter::new(EventBus::new(), DEFAULT_MAX_VISIBLE);
        let id = center.warning("careful");
        assert!(center.dismiss(id));
        assert!(!center.dismiss(id));
    }

    #[tokio::test(start_paused = true)]
    async fn auto_dismisses_after_duration() {
        let center = NotificationCenter::new(EventBus::new(), DEFAULT_MAX_VISIBLE);
        center.error("failed");
        assert_eq!(center.visible().len(), 1);

        tokio::time::sleep(Duration::from_millis(5001)).await;
        assert!(center.visible().is_empty());
    }

    #[test]
    fn teardown_clears() {
        let center = NotificationCenter::new(EventBus::new(), DEFAULT_MAX_VISIBLE);
        center.info("a");
        center.teardown().unwrap();
        assert!(center.visible().is_empty());
    }
}
