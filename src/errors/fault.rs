//! Input model for captured faults.
//!
//! Anything handed to [`ErrorHandler::handle_error`](super::ErrorHandler::handle_error)
//! is first turned into a [`Fault`]. Classification rules:
//!
//! | Fault                         | type             | message                    |
//! |-------------------------------|------------------|----------------------------|
//! | `Missing` / `Value(Null)`     | `UnknownError`   | `Unknown error occurred`   |
//! | `Text(s)` / `Value(String s)` | `StringError`    | `s`                        |
//! | `Named { name, .. }`          | `name`           | `message`                  |
//! | `Value(object)` with `name`   | that name        | `message` field or JSON    |
//! | any other `Value`             | `GenericError`   | `message` field or JSON    |

use crate::infrastructure::isolation::panic_message;
use serde_json::Value;
use std::any::Any;
use std::fmt;

/// Type name assigned to missing faults.
pub const UNKNOWN_ERROR: &str = "UnknownError";
/// Type name assigned to bare string faults.
pub const STRING_ERROR: &str = "StringError";
/// Type name assigned to faults with neither a name nor a string form.
pub const GENERIC_ERROR: &str = "GenericError";
/// Type name assigned to caught panics.
pub const PANIC_ERROR: &str = "Panic";

const UNKNOWN_MESSAGE: &str = "Unknown error occurred";

/// Something that went wrong, as reported to the error handler.
#[derive(Debug, Clone, PartialEq)]
pub enum Fault {
    /// Nothing was supplied.
    Missing,
    /// A bare message with no type information.
    Text(String),
    /// A typed error.
    Named {
        /// Classification name, e.g. `ChunkLoadError`.
        name: String,
        /// Human readable message.
        message: String,
        /// Optional backtrace or cause chain.
        stack: Option<String>,
    },
    /// An arbitrary JSON value; `name`, `message` and `stack` fields are honoured.
    Value(Value),
}

impl Fault {
    /// Creates a [`Fault::Named`] without a stack.
    pub fn named(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Named {
            name: name.into(),
            message: message.into(),
            stack: None,
        }
    }

    /// Captures a Rust error. The type name is the last path segment of `E`
    /// and the `source()` chain becomes the stack.
    pub fn from_error<E: std::error::Error + ?Sized>(error: &E) -> Self {
        let mut chain = Vec::new();
        let mut source = error.source();
        while let Some(cause) = source {
            chain.push(format!("caused by: {cause}"));
            source = cause.source();
        }

        Self::Named {
            name: short_type_name::<E>().to_string(),
            message: error.to_string(),
            stack: (!chain.is_empty()).then(|| chain.join("\n")),
        }
    }

    /// Captures a panic payload.
    #[must_use]
    pub fn from_panic(payload: &(dyn Any + Send)) -> Self {
        Self::named(PANIC_ERROR, panic_message(payload))
    }

    /// Classified type name.
    #[must_use]
    pub fn type_name(&self) -> String {
        match self {
            Self::Missing | Self::Value(Value::Null) => UNKNOWN_ERROR.to_string(),
            Self::Text(_) | Self::Value(Value::String(_)) => STRING_ERROR.to_string(),
            Self::Named { name, .. } if !name.is_empty() => name.clone(),
            Self::Named { .. } => GENERIC_ERROR.to_string(),
            Self::Value(value) => non_empty_str(value, "name")
                .unwrap_or(GENERIC_ERROR)
                .to_string(),
        }
    }

    /// Extracted message.
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::Missing | Self::Value(Value::Null) => UNKNOWN_MESSAGE.to_string(),
            Self::Text(s) | Self::Value(Value::String(s)) => s.clone(),
            Self::Named { message, .. } => message.clone(),
            Self::Value(value) => non_empty_str(value, "message")
                .map_or_else(|| value.to_string(), ToString::to_string),
        }
    }

    /// Stack or cause chain, when one was captured.
    #[must_use]
    pub fn stack(&self) -> Option<String> {
        match self {
            Self::Named { stack, .. } => stack.clone(),
            Self::Value(value) => non_empty_str(value, "stack").map(ToString::to_string),
            Self::Missing | Self::Text(_) => None,
        }
    }
}

fn non_empty_str<'a>(value: &'a Value, field: &str) -> Option<&'a str> {
    value
        .get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

fn short_type_name<E: ?Sized>() -> &'static str {
    let full = std::any::type_name::<E>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.type_name(), self.message())
    }
}

impl From<&str> for Fault {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for Fault {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<Value> for Fault {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl From<crate::PageShellError> for Fault {
    fn from(error: crate::PageShellError) -> Self {
        Self::from_error(&error)
    }
}

impl From<&crate::PageShellError> for Fault {
    fn from(error: &crate::PageShellError) -> Self {
        Self::from_error(error)
    }
}
