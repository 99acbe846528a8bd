//! Logging pipeline.
//!
//! Every layer logs through `tracing` macros with structured fields. This
//! module owns the subscriber side:
//!
//! ```text
//! tracing macros → EnvFilter → fmt layer → stderr | rotating FileWriter
//! ```
//!
//! # Configuration
//!
//! The filter is resolved by [`trace_level`]:
//! 1. `RUST_LOG` environment variable (highest priority)
//! 2. `[observability] trace_level` in the config file
//! 3. `debug` if `[app] debug = true`, else `info`
//!
//! # Modules
//!
//! - `init`: subscriber setup
//! - `file_writer`: size-rotated file sink, shared with
//!   [`JsonlReporter`](crate::errors::JsonlReporter)

mod file_writer;
mod init;

pub use file_writer::{FileWriter, DEFAULT_MAX_BACKUP_FILES, DEFAULT_MAX_FILE_SIZE_BYTES};
pub use init::{init_tracing, trace_level};
