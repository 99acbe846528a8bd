//! Tracing initialization and subscriber setup.

use super::file_writer::FileWriter;
use crate::Config;
use std::sync::Arc;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Resolves the filter directive from configuration alone.
///
/// `[observability] trace_level` if set, else `debug` when `[app] debug` is
/// set, otherwise `info`. `RUST_LOG` is not consulted here; [`init_tracing`]
/// lets it override this value.
#[must_use]
pub fn trace_level(config: &Config) -> String {
    config.observability.trace_level.clone().unwrap_or_else(|| {
        if config.app.debug {
            "debug".to_string()
        } else {
            "info".to_string()
        }
    })
}

/// Installs the global tracing subscriber.
///
/// Sets up a `tracing-subscriber` registry with an [`EnvFilter`] and a fmt
/// layer. Output goes to stderr, or to a size-rotated file when
/// `[observability] log_file` is set (relative paths are anchored in the data
/// directory).
///
/// # Initialization Behavior
///
/// - Creates the log directory lazily, on the first write
/// - Idempotent: only the first call in a process takes effect
/// - Never fails; observability is optional
///
/// # Example
///
/// ```rust
/// use pageshell::observability::init_tracing;
/// use pageshell::Config;
///
/// let mut config = Config::default();
/// config.observability.trace_level = Some("debug".to_string());
///
/// init_tracing(&config);
/// tracing::debug!("tracing is now active");
/// ```
pub fn init_tracing(config: &Config) {
    let level = trace_level(config);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&level));

    let installed = match config.observability.log_file.as_deref() {
        Some(log_file) => {
            let path = crate::infrastructure::paths::resolve_in_data_dir(log_file);
            let writer = Arc::new(FileWriter::new(path));
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(writer).with_ansi(false))
                .try_init()
                .is_ok()
        }
        None => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr))
            .try_init()
            .is_ok(),
    };

    if installed {
        tracing::debug!(
            level = %level,
            log_file = ?config.observability.log_file,
            "tracing initialized"
        );
    }
}
