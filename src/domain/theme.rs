//! Theme preference.
//!
//! The shell only tracks which palette is active; applying it to the rendered
//! page is the host's job (see [`Host::apply_theme`](crate::host::Host::apply_theme)).
//! The preference is persisted under the [`THEME_KEY`] state key.

use crate::domain::error::{PageShellError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// State key the active theme is stored under.
pub const THEME_KEY: &str = "theme";

/// Colour scheme of the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    /// Light palette.
    Light,
    /// Dark palette.
    Dark,
}

impl Theme {
    /// Picks the theme matching a system colour-scheme preference.
    #[must_use]
    pub const fn from_system(prefers_dark: bool) -> Self {
        if prefers_dark {
            Self::Dark
        } else {
            Self::Light
        }
    }

    /// Returns the lowercase name used in state and on the wire.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Dark => "dark",
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Theme {
    type Err = PageShellError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "light" => Ok(Self::Light),
            "dark" => Ok(Self::Dark),
            other => Err(PageShellError::Config(format!("unknown theme: {other}"))),
        }
    }
}

impl From<Theme> for serde_json::Value {
    fn from(theme: Theme) -> Self {
        Self::String(theme.as_str().to_string())
    }
}
