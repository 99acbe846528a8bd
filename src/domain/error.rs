//! Error types for the page shell.
//!
//! This module defines the crate-wide error type [`PageShellError`] and a type alias
//! [`Result`] for convenient error handling. All errors are implemented with the
//! `thiserror` crate.
//!
//! Note that these are errors returned *to the caller*. Faults captured by the
//! [`ErrorHandler`](crate::errors::ErrorHandler) are described by
//! [`Fault`](crate::errors::Fault) and [`ErrorRecord`](crate::errors::ErrorRecord)
//! instead.

use thiserror::Error;

/// The main error type for page shell operations.
///
/// Most variants carry a human readable description. I/O and JSON failures wrap
/// the underlying error using `#[from]` so `?` converts them automatically.
///
/// # Examples
///
/// ```
/// use pageshell::PageShellError;
///
/// fn missing() -> Result<(), PageShellError> {
///     Err(PageShellError::ModuleNotFound("charts".to_string()))
/// }
///
/// assert!(missing().unwrap_err().to_string().contains("charts"));
/// ```
#[derive(Debug, Error)]
pub enum PageShellError {
    /// Durable storage read or write failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Filesystem or I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A value could not be serialized to or parsed from JSON.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration is invalid or missing.
    #[error("Configuration error: {0}")]
    Config(String),

    /// No factory is registered under the requested module name.
    #[error("Module not found: {0}")]
    ModuleNotFound(String),

    /// A module factory ran and failed.
    #[error("Failed to load module {name}: {reason}")]
    ModuleLoad {
        /// Name the module was requested under.
        name: String,
        /// Description of the failure reported by the factory.
        reason: String,
    },

    /// A module teardown hook failed.
    #[error("Teardown of module {name} failed: {reason}")]
    Teardown {
        /// Name of the module being torn down.
        name: String,
        /// Description of the failure.
        reason: String,
    },

    /// A lifecycle hook (pre-init, component registration, page initializer) failed.
    #[error("Hook {hook} failed: {reason}")]
    Hook {
        /// Which hook failed.
        hook: &'static str,
        /// Description of the failure.
        reason: String,
    },

    /// An operation was attempted in a lifecycle state that does not allow it.
    #[error("Cannot {operation} while shell is {state}")]
    InvalidState {
        /// The rejected operation.
        operation: &'static str,
        /// The state the shell was in.
        state: String,
    },

    /// A remote error report could not be delivered.
    #[error("Report error: {0}")]
    Report(String),
}

impl PageShellError {
    /// Convenience constructor for [`PageShellError::Hook`].
    pub fn hook(hook: &'static str, reason: impl Into<String>) -> Self {
        Self::Hook {
            hook,
            reason: reason.into(),
        }
    }

    /// Convenience constructor for [`PageShellError::ModuleLoad`].
    pub fn module_load(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ModuleLoad {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

/// A specialized `Result` type for page shell operations.
pub type Result<T> = std::result::Result<T, PageShellError>;
