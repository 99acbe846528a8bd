//! On-demand feature modules.
//!
//! - [`module`]: the [`FeatureModule`] capability traits and [`LoadedModule`] handle
//! - [`loader`]: [`ModuleLoader`], exactly-once initialization and cache
//! - [`notifications`]: the built-in [`NotificationCenter`] module

pub mod loader;
pub mod module;
pub mod notifications;

pub use loader::{module_factory, ModuleFactory, ModuleLoader};
pub use module::{FeatureModule, LoadedModule, ModuleContext, Teardown};
pub use notifications::{NotificationCenter, DEFAULT_MAX_VISIBLE, NOTIFICATIONS_MODULE};
