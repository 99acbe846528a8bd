//! Lifecycle state of a [`Shell`](super::Shell).
//!
//! # State Machine
//!
//! ```text
//! Uninitialized ──init──► Initializing ──ok──► Ready
//!       │                      │                 │
//!       │                      └──fatal──► Failed│
//!       │                                    │   │
//!       └──────────────destroy───────────────┴───┴──► Destroyed
//! ```
//!
//! `Destroyed` is terminal. `init` is only accepted from `Uninitialized`.

use std::fmt;

/// Where a shell is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ShellState {
    /// Built, `init` not yet called.
    #[default]
    Uninitialized,
    /// `init` is running.
    Initializing,
    /// `init` completed; the page is usable.
    Ready,
    /// A boot step outside per-step isolation failed.
    Failed,
    /// Torn down. No further operations are accepted.
    Destroyed,
}

impl ShellState {
    /// Returns `true` if `init` may start from this state.
    #[must_use]
    pub const fn can_init(self) -> bool {
        matches!(self, Self::Uninitialized)
    }

    /// Returns `true` once the shell is destroyed.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Destroyed)
    }
}

impl fmt::Display for ShellState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Uninitialized => "Uninitialized",
            Self::Initializing => "Initializing",
            Self::Ready => "Ready",
            Self::Failed => "Failed",
            Self::Destroyed => "Destroyed",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_fresh_shells_can_init() {
        assert!(ShellState::Uninitialized.can_init());
        for state in [
            ShellState::Initializing,
            ShellState::Ready,
            ShellState::Failed,
            ShellState::Destroyed,
        ] {
            assert!(!state.can_init(), "{state}");
        }
        assert!(ShellState::Destroyed.is_terminal());
        assert_eq!(ShellState::default(), ShellState::Uninitialized);
    }
}
