//! Storage layer for persistent state keys.
//!
//! The [`StateManager`](crate::state::StateManager) mirrors its persistent keys
//! into a [`DurableStore`]. Two implementations ship with the crate.
//!
//! # Modules
//!
//! - `backend`: the [`DurableStore`] trait
//! - `json`: JSON file implementation with atomic writes
//! - `memory`: shared in-memory implementation

pub mod backend;
pub mod json;
pub mod memory;

pub use backend::DurableStore;
pub use json::JsonFileStore;
pub use memory::MemoryStore;
