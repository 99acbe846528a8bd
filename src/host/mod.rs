//! The embedding environment.
//!
//! The shell never talks to a window, a renderer or a process directly. It asks
//! a [`Host`] for the page snapshot (URL, user agent, viewport, page identity,
//! colour preference) and delegates the few side effects it needs (applying a
//! theme, reloading, a blocking alert) back to it.
//!
//! [`HeadlessHost`] is a complete in-process implementation that records every
//! side effect; it backs tests and non-visual embeddings.

mod headless;

pub use headless::HeadlessHost;

use crate::domain::Theme;
use serde::{Deserialize, Serialize};

/// Page identity used when the host declares none.
pub const DEFAULT_PAGE: &str = "default";

/// Visible area of the page, in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Viewport {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Viewport {
    /// Creates a viewport of the given size.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Environment the shell runs inside.
///
/// Implementations must be cheap to call; the error handler snapshots
/// [`url`](Host::url), [`user_agent`](Host::user_agent) and
/// [`viewport`](Host::viewport) for every captured fault.
pub trait Host: Send + Sync {
    /// Current page URL.
    fn url(&self) -> String;

    /// User agent string of the client.
    fn user_agent(&self) -> String;

    /// Current viewport size.
    fn viewport(&self) -> Viewport;

    /// Page identity used to look up page modules and initializers.
    fn page(&self) -> String {
        DEFAULT_PAGE.to_string()
    }

    /// Whether the system colour scheme prefers dark.
    fn prefers_dark(&self) -> bool {
        false
    }

    /// Applies `theme` to the rendered page.
    fn apply_theme(&self, _theme: Theme) {}

    /// Performs a full page reload.
    fn reload(&self);

    /// Shows a blocking alert. Used when no notifier is available.
    fn alert(&self, message: &str);
}
