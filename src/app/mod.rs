//! Application layer: the [`Shell`] and its page lifecycle.
//!
//! # Architecture
//!
//! Host notifications are translated into actions by a pure function, and the
//! shell executes them:
//!
//! ```text
//! Host → HostEvent → handle_event → Vec<Action> → Shell::execute
//!                                                   ├─ EventBus::emit
//!                                                   ├─ ErrorHandler::handle_error
//!                                                   ├─ Host::apply_theme
//!                                                   └─ Shell::destroy
//! ```
//!
//! # Modules
//!
//! - [`actions`]: Side effects requested by host events
//! - [`handler`]: Host event translation
//! - [`modes`]: Shell lifecycle state machine
//! - [`page`]: Page initializers and lifecycle hooks
//! - [`shell`]: The shell and its builder
//!
//! # Example
//!
//! ```rust
//! use pageshell::app::{handle_event, Action, HostEvent};
//!
//! let actions = handle_event(&HostEvent::Offline, false);
//! assert_eq!(actions, vec![Action::emit("network:offline")]);
//! ```

pub mod actions;
pub mod handler;
pub mod modes;
pub mod page;
pub mod shell;

pub use actions::Action;
pub use handler::{handle_event, HostEvent, GLOBAL_ERROR_CONTEXT};
pub use modes::ShellState;
pub use page::{ComponentRegistrar, PageContext, PageInitializer, PreInitHook};
pub use shell::{Shell, ShellBuilder, INIT_FAILED_CONTEXT};
