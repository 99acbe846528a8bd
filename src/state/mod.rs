//! Reactive state layer.
//!
//! - [`manager`]: the [`StateManager`] store and its subscriptions
//! - [`history`]: bounded [`ChangeRecord`] audit trail

pub mod history;
pub mod manager;

pub use history::{ChangeRecord, DEFAULT_MAX_HISTORY};
pub use manager::{StateCallback, StateManager, StateOptions, StateSubscription, DEFAULT_STORAGE_PREFIX};
