//! User-facing notifications for captured faults.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// How long fault notifications stay visible.
pub const NOTIFICATION_DURATION: Duration = Duration::from_millis(5000);

/// Message shown for network faults.
pub const NETWORK_MESSAGE: &str = "Connection error. Please check your internet connection.";
/// Message shown for critical faults, before the automatic reload.
pub const CRITICAL_MESSAGE: &str = "Critical error. The page will reload.";
/// Message shown for every other fault.
pub const GENERIC_MESSAGE: &str = "An error occurred. We are working to fix it.";

/// Visual weight of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Neutral information.
    Info,
    /// A completed action.
    Success,
    /// Degraded but recoverable.
    Warning,
    /// Something failed.
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Info => "info",
            Self::Success => "success",
            Self::Warning => "warning",
            Self::Error => "error",
        })
    }
}

/// A toast-style message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    /// Visual weight.
    pub severity: Severity,
    /// Short heading.
    pub title: String,
    /// Body text.
    pub message: String,
    /// Auto-dismiss delay in milliseconds.
    pub duration_ms: u64,
}

impl Notification {
    /// A notification with the default duration.
    pub fn new(severity: Severity, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity,
            title: title.into(),
            message: message.into(),
            duration_ms: u64::try_from(NOTIFICATION_DURATION.as_millis()).unwrap_or(u64::MAX),
        }
    }
}

/// In-app notification subsystem.
///
/// When none is registered with the error handler, faults fall back to
/// [`Host::alert`](crate::host::Host::alert).
pub trait Notifier: Send + Sync {
    /// Displays `notification`.
    fn show(&self, notification: Notification);
}

/// Picks the user-facing message for a fault. Network faults win over critical ones.
#[must_use]
pub fn user_message(is_network: bool, is_critical: bool) -> (Severity, &'static str) {
    if is_network {
        (Severity::Warning, NETWORK_MESSAGE)
    } else if is_critical {
        (Severity::Error, CRITICAL_MESSAGE)
    } else {
        (Severity::Error, GENERIC_MESSAGE)
    }
}
