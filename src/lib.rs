//! Pageshell: the coordination core of a page-scoped front-end.
//!
//! Pageshell provides the plumbing every page of a multi-page application needs
//! before any feature code runs:
//! - A synchronous publish/subscribe [`EventBus`]
//! - A reactive key/value [`StateManager`] with persistent keys and change history
//! - A single fault funnel, the [`ErrorHandler`], that classifies, queues,
//!   throttles, notifies, reports and broadcasts
//! - A [`ModuleLoader`] that initializes feature modules exactly once, and a
//!   [`Shell`] that runs the page lifecycle around all of the above

#![allow(clippy::multiple_crate_versions)]

//!
//! # Architecture
//!
//! The crate follows a layered architecture pattern:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │  Application Layer (app/)                           │  ← Shell lifecycle
//! │  - init / destroy state machine                     │
//! │  - Host event → action dispatch                     │
//! │  - Page initializers                                │
//! └─────────────────────────────────────────────────────┘
//!         │                    │                    │
//! ┌───────────────┐   ┌───────────────┐   ┌───────────────┐
//! │ Modules       │   │ Errors        │   │ Host          │
//! │ (modules/)    │   │ (errors/)     │   │ (host/)       │
//! │ - Loader      │   │ - Classify    │   │ - Page info   │
//! │ - Teardown    │   │ - Notify      │   │ - Theme       │
//! │ - Toasts      │   │ - Report      │   │ - Reload      │
//! └───────────────┘   └───────────────┘   └───────────────┘
//!         │                    │                    │
//! ┌─────────────────────────────────────────────────────┐
//! │  Events (events/) and State (state/)                │
//! │  - Listener registry, FIFO delivery                 │
//! │  - Keyed values, subscribers, history               │
//! └─────────────────────────────────────────────────────┘
//!                        │
//! ┌─────────────────────────────────────────────────────┐
//! │  Storage, Infrastructure & Domain Layers            │
//! │  - Durable string store (storage/)                  │
//! │  - Paths, panic isolation (infrastructure/)         │
//! │  - Error type, theme (domain/)                      │
//! └─────────────────────────────────────────────────────┘
//!                        │
//! ┌─────────────────────────────────────────────────────┐
//! │  Observability (observability/)                     │
//! │  - tracing subscriber, rotating log file            │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`app`]: [`Shell`] lifecycle, host events and page initializers
//! - [`domain`]: Error type and theme
//! - [`errors`]: Fault classification and the [`ErrorHandler`] pipeline
//! - [`events`]: [`EventBus`] and well-known event names
//! - [`host`]: The embedding environment abstraction
//! - [`infrastructure`]: Data paths and callback isolation
//! - [`modules`]: Feature modules and the [`ModuleLoader`]
//! - [`observability`]: Tracing setup
//! - [`state`]: [`StateManager`] and change history
//! - [`storage`]: Durable stores for persistent state keys
//!
//! # Configuration
//!
//! A shell is configured from TOML:
//!
//! ```toml
//! storage_path = "state.json"
//!
//! [app]
//! name = "storefront"
//! version = "1.4.0"
//! debug = false
//!
//! [state]
//! persistent = ["cart", "user"]
//!
//! [errors]
//! report_endpoint = "errors.jsonl"
//! capture_panics = true
//!
//! [pages.home]
//! modules = ["analytics", "images"]
//!
//! [observability]
//! trace_level = "info"
//! log_file = "pageshell.log"
//! ```
//!
//! # Example
//!
//! ```rust
//! use pageshell::{Config, Shell, ShellState};
//! use pageshell::host::HeadlessHost;
//! use std::sync::Arc;
//!
//! # async fn run() -> pageshell::Result<()> {
//! let shell = Shell::builder(Config::default())
//!     .host(Arc::new(HeadlessHost::new()))
//!     .build()?;
//!
//! shell.init().await?;
//! assert_eq!(shell.lifecycle(), ShellState::Ready);
//!
//! shell.destroy();
//! assert_eq!(shell.lifecycle(), ShellState::Destroyed);
//! # Ok(())
//! # }
//! # tokio::runtime::Builder::new_current_thread()
//! #     .enable_all()
//! #     .build()
//! #     .unwrap()
//! #     .block_on(run())
//! #     .unwrap();
//! ```
//!
//! # Key Design Decisions
//!
//! ## Explicit wiring
//!
//! There is no global application object. A [`Shell`] owns one bus, one state
//! manager, one error handler and one loader, and hands them to modules and
//! page initializers explicitly, so independent shells never interfere.
//!
//! ## Capabilities instead of duck typing
//!
//! A loaded module is asked for [`Teardown`](modules::Teardown) and
//! [`Notifier`](errors::Notifier) capabilities through
//! [`FeatureModule`](modules::FeatureModule); anything else is cached as-is.
//!
//! ## Best-effort persistence
//!
//! Persistent state keys are mirrored to storage on every change. Storage
//! failures are logged and never roll back the in-memory value.

pub mod app;
pub mod domain;
pub mod errors;
pub mod events;
pub mod host;
pub mod infrastructure;
pub mod modules;
pub mod observability;
pub mod state;
pub mod storage;

pub use app::{HostEvent, PageContext, Shell, ShellBuilder, ShellState};
pub use domain::{PageShellError, Result, Theme};
pub use errors::{ErrorHandler, ErrorRecord, Fault};
pub use events::EventBus;
pub use modules::ModuleLoader;
pub use state::StateManager;

use crate::errors::ErrorHandlerOptions;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Deployment environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Local development.
    Development,
    /// Pre-production.
    Staging,
    /// Live.
    Production,
}

impl Environment {
    /// Guesses the environment from a hostname.
    ///
    /// `localhost` and `127.0.0.1` are development, hosts containing
    /// `staging` or `dev` are staging, everything else is production.
    ///
    /// ```
    /// use pageshell::Environment;
    ///
    /// assert_eq!(Environment::detect("localhost"), Environment::Development);
    /// assert_eq!(Environment::detect("staging.shop.test"), Environment::Staging);
    /// assert_eq!(Environment::detect("shop.test"), Environment::Production);
    /// ```
    #[must_use]
    pub fn detect(hostname: &str) -> Self {
        if hostname == "localhost" || hostname == "127.0.0.1" {
            Self::Development
        } else if hostname.contains("staging") || hostname.contains("dev") {
            Self::Staging
        } else {
            Self::Production
        }
    }

    /// Guesses the environment from a page URL.
    #[must_use]
    pub fn detect_from_url(url: &str) -> Self {
        Self::detect(hostname_of(url))
    }

    /// Lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Staging => "staging",
            Self::Production => "production",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = PageShellError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "staging" => Ok(Self::Staging),
            "production" | "prod" => Ok(Self::Production),
            other => Err(PageShellError::Config(format!("unknown environment: {other}"))),
        }
    }
}

fn hostname_of(url: &str) -> &str {
    let rest = url.split_once("://").map_or(url, |(_, rest)| rest);
    let authority = rest.split(['/', '?', '#']).next().unwrap_or(rest);
    let host = authority.rsplit_once('@').map_or(authority, |(_, host)| host);
    host.split(':').next().unwrap_or(host)
}

/// `[app]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Application name, used in logs.
    pub name: String,
    /// Version tag attached to error reports.
    pub version: String,
    /// Deployment environment; detected from the page URL when absent.
    pub environment: Option<Environment>,
    /// Debug mode: verbose logging, no remote error reports.
    pub debug: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            environment: None,
            debug: false,
        }
    }
}

/// `[state]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StateConfig {
    /// Keys mirrored into durable storage. The theme key is always added.
    pub persistent: Vec<String>,
    /// Change history capacity.
    pub max_history: usize,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            persistent: Vec::new(),
            max_history: state::DEFAULT_MAX_HISTORY,
        }
    }
}

/// `[events]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventsConfig {
    /// Listener count per event above which a leak warning is logged.
    pub max_listeners: usize,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            max_listeners: events::DEFAULT_MAX_LISTENERS,
        }
    }
}

/// `[pages.<id>]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageConfig {
    /// Modules loaded automatically when this page boots, in order.
    pub modules: Vec<String>,
}

/// `[observability]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Tracing filter directive, e.g. `info` or `pageshell=debug`.
    ///
    /// Options: `trace`, `debug`, `info`, `warn`, `error`. Default: `"info"`
    pub trace_level: Option<String>,
    /// Log file path; logs go to stderr when absent. Relative paths are
    /// anchored in the data directory.
    pub log_file: Option<String>,
}

/// Shell configuration.
///
/// Every section is optional; missing fields take their defaults.
///
/// # Example
///
/// ```rust
/// use pageshell::Config;
///
/// let config = Config::from_toml_str(r#"
///     [app]
///     debug = true
///
///     [pages.dashboard]
///     modules = ["analytics", "charts"]
/// "#)?;
///
/// assert!(config.app.debug);
/// assert_eq!(config.page_modules("dashboard"), ["analytics", "charts"]);
/// assert!(config.page_modules("unknown").is_empty());
/// # Ok::<(), pageshell::PageShellError>(())
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// File backing persistent state keys; in-memory storage when absent.
    ///
    /// Relative paths are anchored in the data directory.
    pub storage_path: Option<String>,
    /// Application metadata.
    pub app: AppConfig,
    /// State manager settings.
    pub state: StateConfig,
    /// Error handler settings. `app_version` and `environment` are filled
    /// from `[app]`.
    pub errors: ErrorHandlerOptions,
    /// Event bus settings.
    pub events: EventsConfig,
    /// Per-page module lists, keyed by page identity.
    pub pages: BTreeMap<String, PageConfig>,
    /// Logging settings.
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Parses a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`PageShellError::Config`] if the document is malformed or a
    /// field has the wrong type.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        toml::from_str(source).map_err(|e| PageShellError::Config(e.to_string()))
    }

    /// Reads and parses a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be read, or
    /// [`PageShellError::Config`] if it does not parse.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&source)?;
        tracing::debug!(path = %path.display(), pages = config.pages.len(), "config loaded");
        Ok(config)
    }

    /// Modules configured for `page`; empty for unknown pages.
    #[must_use]
    pub fn page_modules(&self, page: &str) -> &[String] {
        self.pages.get(page).map_or(&[], |p| p.modules.as_slice())
    }

    /// Error handler options with version, environment and debug applied.
    ///
    /// Remote reporting is disabled in debug mode.
    #[must_use]
    pub fn error_options(&self, environment: Environment) -> ErrorHandlerOptions {
        let mut options = self.errors.clone();
        options.app_version = self.app.version.clone();
        options.environment = environment.to_string();
        options.report_errors = options.report_errors && !self.app.debug;
        options
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_gives_defaults() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.errors.max_queue_size, 50);
        assert_eq!(config.events.max_listeners, 10);
        assert_eq!(config.state.max_history, 50);
    }

    #[test]
    fn parses_all_sections() {
        let config = Config::from_toml_str(
            r#"
            storage_path = "state.json"

            [app]
            name = "storefront"
            version = "2.0.0"
            environment = "staging"

            [state]
            persistent = ["cart"]

            [errors]
            report_throttle = 4
            critical_types = ["SecurityError"]

            [events]
            max_listeners = 3

            [pages.home]
            modules = ["analytics", "images"]

            [observability]
            trace_level = "debug"
            "#,
        )
        .unwrap();

        assert_eq!(config.storage_path.as_deref(), Some("state.json"));
        assert_eq!(config.app.environment, Some(Environment::Staging));
        assert_eq!(config.state.persistent, vec!["cart"]);
        assert_eq!(config.errors.report_throttle, 4);
        assert_eq!(config.errors.critical_types, vec!["SecurityError"]);
        assert_eq!(config.events.max_listeners, 3);
        assert_eq!(config.page_modules("home"), ["analytics", "images"]);
        assert_eq!(config.observability.trace_level.as_deref(), Some("debug"));
    }

    #[test]
    fn malformed_toml_is_a_config_error() {
        let err = Config::from_toml_str("[app\nname = 1").unwrap_err();
        assert!(matches!(err, PageShellError::Config(_)));
    }

    #[test]
    fn debug_disables_remote_reporting() {
        let mut config = Config::default();
        config.app.version = "3.1.0".to_string();
        assert!(config.error_options(Environment::Production).report_errors);

        config.app.debug = true;
        let options = config.error_options(Environment::Development);
        assert!(!options.report_errors);
        assert_eq!(options.app_version, "3.1.0");
        assert_eq!(options.environment, "development");
    }

    #[test]
    fn hostname_extraction() {
        assert_eq!(hostname_of("https://user@shop.test:8443/cart?x=1"), "shop.test");
        assert_eq!(hostname_of("http://localhost:3000"), "localhost");
        assert_eq!(hostname_of("about:blank"), "about");
        assert_eq!(
            Environment::detect_from_url("https://dev.shop.test/"),
            Environment::Staging
        );
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pageshell.toml");
        std::fs::write(&path, "[app]\nname = \"from-file\"\n").unwrap();
        assert_eq!(Config::load(&path).unwrap().app.name, "from-file");
    }
}
