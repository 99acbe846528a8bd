//! Event layer: the in-process publish/subscribe bus.
//!
//! - [`bus`]: [`EventBus`] and its [`Subscription`] handles
//! - [`names`]: well-known event names used across the crate

pub mod bus;
pub mod names;

pub use bus::{EventBus, EventBusOptions, Listener, Subscription, DEFAULT_MAX_LISTENERS};
