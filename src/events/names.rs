//! Well-known event names emitted by the shell and its components.

/// An error went through the [`ErrorHandler`](crate::errors::ErrorHandler). Payload: the `ErrorRecord`.
pub const ERROR_OCCURRED: &str = "error:occurred";

/// A module load started. Payload: `{"name": ..}`.
pub const MODULE_LOADING: &str = "module:loading";

/// A module finished loading. Payload: `{"name": ..}`.
pub const MODULE_LOADED: &str = "module:loaded";

/// A module failed to load. Payload: `{"name": .., "message": ..}`.
pub const MODULE_FAILED: &str = "module:failed";

/// `Shell::init` completed.
pub const APP_READY: &str = "app:ready";

/// The page became hidden.
pub const APP_HIDDEN: &str = "app:hidden";

/// The page became visible.
pub const APP_VISIBLE: &str = "app:visible";

/// Connectivity came back.
pub const NETWORK_ONLINE: &str = "network:online";

/// Connectivity was lost.
pub const NETWORK_OFFLINE: &str = "network:offline";

/// Request to switch theme. Payload: `"light"` or `"dark"`.
pub const THEME_CHANGE: &str = "theme:change";

/// In-app navigation. Payload: `{"url": ..}`.
pub const ROUTE_CHANGE: &str = "route:change";

/// A notification was displayed. Payload: the `Notification` fields plus its `id`.
pub const NOTIFICATION_SHOWN: &str = "notification:shown";

/// A notification was dismissed, by timeout or explicitly. Payload: `{"id"}`.
pub const NOTIFICATION_DISMISSED: &str = "notification:dismissed";
