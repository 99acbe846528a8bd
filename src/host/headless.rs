use super::{Host, Viewport, DEFAULT_PAGE};
use crate::domain::Theme;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

/// [`Host`] without a screen.
///
/// Side effects are recorded instead of performed, so callers can inspect them:
///
/// ```
/// use pageshell::host::{HeadlessHost, Host};
///
/// let host = HeadlessHost::new().with_page("checkout");
/// host.alert("hello");
/// host.reload();
///
/// assert_eq!(host.page(), "checkout");
/// assert_eq!(host.alerts(), vec!["hello".to_string()]);
/// assert_eq!(host.reload_count(), 1);
/// ```
#[derive(Debug)]
pub struct HeadlessHost {
    url: String,
    user_agent: String,
    viewport: Viewport,
    page: String,
    prefers_dark: AtomicBool,
    alerts: Mutex<Vec<String>>,
    themes: Mutex<Vec<Theme>>,
    reloads: AtomicUsize,
}

impl Default for HeadlessHost {
    fn default() -> Self {
        Self {
            url: "about:blank".to_string(),
            user_agent: concat!("pageshell/", env!("CARGO_PKG_VERSION")).to_string(),
            viewport: Viewport::new(1280, 720),
            page: DEFAULT_PAGE.to_string(),
            prefers_dark: AtomicBool::new(false),
            alerts: Mutex::new(Vec::new()),
            themes: Mutex::new(Vec::new()),
            reloads: AtomicUsize::new(0),
        }
    }
}

impl HeadlessHost {
    /// Creates a host on `about:blank` with page identity `default`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the page identity.
    #[must_use]
    pub fn with_page(mut self, page: impl Into<String>) -> Self {
        self.page = page.into();
        self
    }

    /// Sets the page URL.
    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Sets the user agent.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Sets the viewport.
    #[must_use]
    pub fn with_viewport(mut self, viewport: Viewport) -> Self {
        self.viewport = viewport;
        self
    }

    /// Sets the initial system colour preference.
    #[must_use]
    pub fn with_prefers_dark(self, dark: bool) -> Self {
        self.prefers_dark.store(dark, Ordering::SeqCst);
        self
    }

    /// Changes the system colour preference reported from now on.
    pub fn set_prefers_dark(&self, dark: bool) {
        self.prefers_dark.store(dark, Ordering::SeqCst);
    }

    /// Every alert shown so far, oldest first.
    #[must_use]
    pub fn alerts(&self) -> Vec<String> {
        self.alerts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Every theme applied so far, oldest first.
    #[must_use]
    pub fn applied_themes(&self) -> Vec<Theme> {
        self.themes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of reloads requested.
    #[must_use]
    pub fn reload_count(&self) -> usize {
        self.reloads.load(Ordering::SeqCst)
    }
}

impl Host for HeadlessHost {
    fn url(&self) -> String {
        self.url.clone()
    }

    fn user_agent(&self) -> String {
        self.user_agent.clone()
    }

    fn viewport(&self) -> Viewport {
        self.viewport
    }

    fn page(&self) -> String {
        self.page.clone()
    }

    fn prefers_dark(&self) -> bool {
        self.prefers_dark.load(Ordering::SeqCst)
    }

    fn apply_theme(&self, theme: Theme) {
        tracing::debug!(%theme, "theme applied");
        self.themes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(theme);
    }

    fn reload(&self) {
        tracing::info!(url = %self.url, "reload requested");
        self.reloads.fetch_add(1, Ordering::SeqCst);
    }

    fn alert(&self, message: &str) {
        tracing::info!(message, "alert");
        self.alerts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message.to_string());
    }
}
