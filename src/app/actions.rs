//! Effects requested by host events.
//!
//! [`handle_event`](super::handle_event) turns a [`HostEvent`](super::HostEvent)
//! into a `Vec<Action>`; the [`Shell`](super::Shell) executes them in order.
//! Keeping the translation pure lets it be tested without a shell.

use crate::domain::Theme;
use crate::errors::Fault;
use serde_json::Value;

/// Side effect to be executed by the shell.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Emits `event` on the bus.
    Emit {
        /// Event name.
        event: &'static str,
        /// Payload; `Null` for none.
        payload: Value,
    },

    /// Routes a fault through the error handler.
    RouteError {
        /// What went wrong.
        fault: Fault,
        /// Where it was caught.
        context: &'static str,
    },

    /// Applies a theme without persisting it as the user's choice.
    ApplyTheme(Theme),

    /// Tears the shell down.
    Destroy,
}

impl Action {
    /// An [`Action::Emit`] without payload.
    #[must_use]
    pub const fn emit(event: &'static str) -> Self {
        Self::Emit {
            event,
            payload: Value::Null,
        }
    }
}
