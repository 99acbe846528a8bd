//! Host event translation.
//!
//! The embedding environment reports what happened to the page (connectivity,
//! visibility, unload, uncaught faults, system theme, navigation) as
//! [`HostEvent`]s. [`handle_event`] maps each one to the [`Action`]s the shell
//! performs:
//!
//! | Event                     | Actions                                          |
//! |---------------------------|--------------------------------------------------|
//! | `Online` / `Offline`      | emit `network:online` / `network:offline`        |
//! | `VisibilityChanged`       | emit `app:hidden` / `app:visible`                |
//! | `BeforeUnload`            | destroy                                          |
//! | `UncaughtError`           | route with context `Global error`                |
//! | `UnhandledRejection`      | route with context `Unhandled promise rejection` |
//! | `SystemThemeChanged`      | apply theme, unless a theme was chosen explicitly |
//! | `Navigate`                | emit `route:change {url}`                        |

use super::actions::Action;
use crate::domain::Theme;
use crate::errors::{Fault, REJECTION_CONTEXT};
use crate::events::names;
use serde_json::json;

/// Context for faults reported by [`HostEvent::UncaughtError`].
pub const GLOBAL_ERROR_CONTEXT: &str = "Global error";

/// Something that happened in the embedding environment.
#[derive(Debug, Clone, PartialEq)]
pub enum HostEvent {
    /// Connectivity came back.
    Online,
    /// Connectivity was lost.
    Offline,
    /// The page was hidden or shown.
    VisibilityChanged {
        /// `true` when the page became hidden.
        hidden: bool,
    },
    /// The page is about to unload.
    BeforeUnload,
    /// A fault escaped every handler.
    UncaughtError(Fault),
    /// An asynchronous operation failed and nobody awaited it.
    UnhandledRejection(Fault),
    /// The system colour scheme changed.
    SystemThemeChanged {
        /// `true` when the system now prefers dark.
        dark: bool,
    },
    /// In-app navigation to `url`.
    Navigate {
        /// Target URL.
        url: String,
    },
}

/// Maps `event` to the actions the shell should perform.
///
/// `has_saved_theme` tells whether the user chose a theme explicitly; system
/// theme changes are ignored in that case.
#[must_use]
pub fn handle_event(event: &HostEvent, has_saved_theme: bool) -> Vec<Action> {
    match event {
        HostEvent::Online => vec![Action::emit(names::NETWORK_ONLINE)],
        HostEvent::Offline => vec![Action::emit(names::NETWORK_OFFLINE)],
        HostEvent::VisibilityChanged { hidden: true } => vec![Action::emit(names::APP_HIDDEN)],
        HostEvent::VisibilityChanged { hidden: false } => vec![Action::emit(names::APP_VISIBLE)],
        HostEvent::BeforeUnload => vec![Action::Destroy],
        HostEvent::UncaughtError(fault) => vec![Action::RouteError {
            fault: fault.clone(),
            context: GLOBAL_ERROR_CONTEXT,
        }],
        HostEvent::UnhandledRejection(fault) => vec![Action::RouteError {
            fault: fault.clone(),
            context: REJECTION_CONTEXT,
        }],
        HostEvent::SystemThemeChanged { .. } if has_saved_theme => {
            tracing::trace!("system theme change ignored, theme chosen explicitly");
            Vec::new()
        }
        HostEvent::SystemThemeChanged { dark } => {
            vec![Action::ApplyTheme(Theme::from_system(*dark))]
        }
        HostEvent::Navigate { url } => vec![Action::Emit {
            event: names::ROUTE_CHANGE,
            payload: json!({ "url": url }),
        }],
    }
}
