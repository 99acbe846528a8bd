//! Infrastructure layer: filesystem locations and callback isolation.

pub mod isolation;
pub mod paths;

pub use isolation::{is_isolated, isolated, panic_message, run_isolated, Isolated, IsolationGuard};
pub use paths::{expand_tilde, get_data_dir, resolve_in_data_dir};
