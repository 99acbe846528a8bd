//! Remote error reporting.

use super::record::ErrorReport;
use crate::domain::error::{PageShellError, Result};
use crate::observability::FileWriter;
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use std::path::PathBuf;
use std::sync::Arc;

/// Collector that receives error reports.
///
/// Reports are fire-and-forget: the handler spawns the returned future and
/// only logs its failure.
pub trait Reporter: Send + Sync {
    /// Delivers one report.
    fn report(&self, report: ErrorReport) -> BoxFuture<'static, Result<()>>;
}

/// [`Reporter`] appending each report as one JSON line to a size-rotated file.
///
/// ```
/// use pageshell::errors::JsonlReporter;
///
/// let reporter = JsonlReporter::new(std::env::temp_dir().join("pageshell-errors.jsonl"));
/// assert!(reporter.path().ends_with("pageshell-errors.jsonl"));
/// ```
#[derive(Debug, Clone)]
pub struct JsonlReporter {
    writer: Arc<FileWriter>,
}

impl JsonlReporter {
    /// Reports to `path` with default rotation limits.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_writer(FileWriter::new(path))
    }

    /// Reports through an existing writer.
    #[must_use]
    pub fn with_writer(writer: FileWriter) -> Self {
        Self {
            writer: Arc::new(writer),
        }
    }

    /// Path of the active report file.
    #[must_use]
    pub fn path(&self) -> &std::path::Path {
        self.writer.path()
    }
}

impl Reporter for JsonlReporter {
    fn report(&self, report: ErrorReport) -> BoxFuture<'static, Result<()>> {
        let writer = Arc::clone(&self.writer);
        async move {
            let line = serde_json::to_string(&report)?;
            writer
                .write_line(&line)
                .map_err(|e| PageShellError::Report(format!("{}: {e}", writer.path().display())))
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorRecord;
    use crate::host::Viewport;
    use chrono::Utc;
    use serde_json::Map;

    fn sample_report() -> ErrorReport {
        ErrorReport {
            error: ErrorRecord {
                id: "err_1_abcdefghi".into(),
                error_type: "TypeError".into(),
                message: "x is undefined".into(),
                context: "test".into(),
                metadata: Map::new(),
                stack: None,
                timestamp: Utc::now(),
                url: "about:blank".into(),
                user_agent: "test".into(),
                viewport: Viewport::new(1, 1),
                is_network_error: false,
            },
            app_version: "1.0.0".into(),
            environment: "test".into(),
        }
    }

    #[tokio::test]
    async fn appends_one_line_per_report() {
        let dir = tempfile::tempdir().unwrap();
        let reporter = JsonlReporter::new(dir.path().join("errors.jsonl"));

        reporter.report(sample_report()).await.unwrap();
        reporter.report(sample_report()).await.unwrap();

        let content = std::fs::read_to_string(reporter.path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);

        let parsed: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(parsed["appVersion"], "1.0.0");
        assert_eq!(parsed["error"]["type"], "TypeError");
    }
}
