//! Fault capture, classification and user notification.
//!
//! - [`fault`]: the [`Fault`] input model and classification rules
//! - [`record`]: [`ErrorRecord`] and related output types
//! - [`handler`]: the [`ErrorHandler`] pipeline
//! - [`notify`]: [`Notifier`] collaborator and message selection
//! - [`report`]: [`Reporter`] collaborator and the file-backed [`JsonlReporter`]

pub mod fault;
pub mod handler;
pub mod notify;
pub mod record;
pub mod report;

pub use fault::Fault;
pub use handler::{
    ErrorHandler, ErrorHandlerOptions, NETWORK_CONTEXT, REJECTION_CONTEXT, UNCAUGHT_CONTEXT,
};
pub use notify::{Notification, Notifier, Severity};
pub use record::{ErrorRecord, ErrorReport, ErrorStats, RequestInfo};
pub use report::{JsonlReporter, Reporter};
