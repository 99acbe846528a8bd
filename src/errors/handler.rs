//! The single funnel for every fault in the application.
//!
//! [`ErrorHandler::handle_error`] runs a fixed pipeline:
//!
//! 1. Build an [`ErrorRecord`] (classification + host snapshot)
//! 2. Log it
//! 3. Append it to the bounded queue (oldest evicted)
//! 4. Count it per type, warning once a type gets noisy
//! 5. Notify the user (notifier, or host alert as fallback); critical types
//!    also schedule a page reload
//! 6. Report it remotely, unless the type is past the report throttle
//! 7. Broadcast `error:occurred` on the bus
//! 8. Return the record
//!
//! Steps 1 to 4 and the return are synchronous. Reporting and the delayed
//! reload are fire-and-forget. Nothing in the pipeline propagates a failure
//! or a panic to the caller.

use super::fault::{Fault, PANIC_ERROR};
use super::notify::{user_message, Notification, Notifier};
use super::record::{generate_id, ErrorRecord, ErrorReport, ErrorStats, RequestInfo};
use super::report::{JsonlReporter, Reporter};
use crate::events::{names, EventBus};
use crate::host::{Host, Viewport};
use crate::infrastructure::isolation::{is_isolated, isolated, panic_message, run_isolated, IsolationGuard};
use chrono::Utc;
use futures_util::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

/// Context used for panics caught by the panic hook.
pub const UNCAUGHT_CONTEXT: &str = "Uncaught error";
/// Context used for failed or panicked watched futures.
pub const REJECTION_CONTEXT: &str = "Unhandled promise rejection";
/// Context used by [`ErrorHandler::handle_network_error`].
pub const NETWORK_CONTEXT: &str = "Network error";

const RECENT_ERRORS: usize = 10;

/// Tuning for [`ErrorHandler`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ErrorHandlerOptions {
    /// Send records to the reporter.
    pub report_errors: bool,
    /// Show a notification (or alert) for each fault.
    pub show_user_messages: bool,
    /// Log each fault at error level.
    pub log_errors: bool,
    /// Path of a JSON-lines report file, used when no reporter is set explicitly.
    ///
    /// Relative paths are anchored in the data directory.
    pub report_endpoint: Option<String>,
    /// Queue capacity.
    pub max_queue_size: usize,
    /// Per-type count above which a repeated-error warning is logged.
    pub noisy_threshold: u64,
    /// Per-type count up to which records are reported.
    pub report_throttle: u64,
    /// Delay before the automatic reload after a critical fault.
    #[serde(with = "duration_millis")]
    pub reload_delay: Duration,
    /// Type names that trigger the automatic reload.
    pub critical_types: Vec<String>,
    /// Version tag attached to reports.
    pub app_version: String,
    /// Environment tag attached to reports.
    pub environment: String,
    /// Install the panic hook when the shell boots.
    pub capture_panics: bool,
}

impl Default for ErrorHandlerOptions {
    fn default() -> Self {
        Self {
            report_errors: true,
            show_user_messages: true,
            log_errors: true,
            report_endpoint: None,
            max_queue_size: 50,
            noisy_threshold: 5,
            report_throttle: 10,
            reload_delay: Duration::from_secs(3),
            critical_types: vec![
                "ChunkLoadError".to_string(),
                "SecurityError".to_string(),
                "SyntaxError".to_string(),
            ],
            app_version: "unknown".to_string(),
            environment: "production".to_string(),
            capture_panics: false,
        }
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

#[derive(Default)]
struct ErrorLog {
    queue: VecDeque<ErrorRecord>,
    counts: HashMap<String, u64>,
}

struct HandlerInner {
    options: ErrorHandlerOptions,
    host: Arc<dyn Host>,
    bus: Option<EventBus>,
    log: Mutex<ErrorLog>,
    notifier: Mutex<Option<Arc<dyn Notifier>>>,
    reporter: Mutex<Option<Arc<dyn Reporter>>>,
}

impl HandlerInner {
    fn log(&self) -> MutexGuard<'_, ErrorLog> {
        self.log.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Fault funnel. Cheap to clone; clones share queue, counters and collaborators.
///
/// # Examples
///
/// ```
/// use pageshell::errors::{ErrorHandler, ErrorHandlerOptions};
/// use pageshell::host::HeadlessHost;
/// use serde_json::Map;
/// use std::sync::Arc;
///
/// let handler = ErrorHandler::new(ErrorHandlerOptions::default(), Arc::new(HeadlessHost::new()), None);
/// let record = handler.handle_error("boom", "checkout", Map::new());
///
/// assert_eq!(record.error_type, "StringError");
/// assert_eq!(handler.get_stats().total_errors, 1);
/// ```
#[derive(Clone)]
pub struct ErrorHandler {
    inner: Arc<HandlerInner>,
}

impl ErrorHandler {
    /// Creates a handler.
    ///
    /// When `options.report_endpoint` is set, a [`JsonlReporter`] writing to it
    /// is installed; [`ErrorHandler::set_reporter`] replaces it.
    ///
    /// No global interception is installed here. Host-level faults arrive as
    /// `HostEvent::UncaughtError` and `HostEvent::UnhandledRejection` through
    /// `Shell::dispatch`. Rust panics outside isolated callbacks are routed
    /// only after [`install_panic_hook`](Self::install_panic_hook), which the
    /// shell calls during `init` when `capture_panics` is set; the hook is
    /// process-wide, so it is opt-in.
    pub fn new(options: ErrorHandlerOptions, host: Arc<dyn Host>, bus: Option<EventBus>) -> Self {
        let reporter = options.report_endpoint.as_deref().map(|endpoint| {
            let path = crate::infrastructure::paths::resolve_in_data_dir(endpoint);
            Arc::new(JsonlReporter::new(path)) as Arc<dyn Reporter>
        });

        Self {
            inner: Arc::new(HandlerInner {
                options,
                host,
                bus,
                log: Mutex::new(ErrorLog::default()),
                notifier: Mutex::new(None),
                reporter: Mutex::new(reporter),
            }),
        }
    }

    /// Options this handler was built with.
    #[must_use]
    pub fn options(&self) -> &ErrorHandlerOptions {
        &self.inner.options
    }

    /// Replaces the reporter. `None` disables remote reporting.
    pub fn set_reporter(&self, reporter: Option<Arc<dyn Reporter>>) {
        *self
            .inner
            .reporter
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = reporter;
    }

    /// Replaces the notifier. `None` falls back to host alerts.
    pub fn set_notifier(&self, notifier: Option<Arc<dyn Notifier>>) {
        *self
            .inner
            .notifier
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = notifier;
    }

    /// Returns `true` if a notifier is registered.
    #[must_use]
    pub fn has_notifier(&self) -> bool {
        self.inner
            .notifier
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Captures a fault and runs the full pipeline.
    pub fn handle_error(
        &self,
        fault: impl Into<Fault>,
        context: &str,
        metadata: Map<String, Value>,
    ) -> ErrorRecord {
        let record = self.create_record(&fault.into(), context, metadata);
        self.process(record)
    }

    /// Captures a fault tagged as network-related, with request details as metadata.
    pub fn handle_network_error(&self, fault: impl Into<Fault>, request: RequestInfo) -> ErrorRecord {
        let mut record = self.create_record(&fault.into(), NETWORK_CONTEXT, request.into_metadata());
        record.is_network_error = true;
        self.process(record)
    }

    fn create_record(&self, fault: &Fault, context: &str, metadata: Map<String, Value>) -> ErrorRecord {
        let (url, user_agent, viewport) = host_snapshot(self.inner.host.as_ref());
        let timestamp = Utc::now();
        ErrorRecord {
            id: generate_id(timestamp),
            error_type: fault.type_name(),
            message: fault.message(),
            context: context.to_string(),
            metadata,
            stack: fault.stack(),
            timestamp,
            url,
            user_agent,
            viewport,
            is_network_error: false,
        }
    }

    fn process(&self, record: ErrorRecord) -> ErrorRecord {
        let options = &self.inner.options;
        let _span = tracing::debug_span!("handle_error", id = %record.id, error_type = %record.error_type).entered();

        if options.log_errors {
            log_record(&record);
        }

        let count = {
            let mut log = self.inner.log();
            log.queue.push_back(record.clone());
            while log.queue.len() > options.max_queue_size {
                log.queue.pop_front();
            }

            let count = log.counts.entry(record.error_type.clone()).or_insert(0);
            *count += 1;
            *count
        };

        if count > options.noisy_threshold {
            tracing::warn!(
                error_type = %record.error_type,
                count,
                "error type \"{}\" has occurred {} times",
                record.error_type,
                count
            );
        }

        if options.show_user_messages {
            self.show_user_message(&record);
        }

        if options.report_errors {
            if count <= options.report_throttle {
                self.report(&record);
            } else {
                tracing::trace!(error_type = %record.error_type, count, "report throttled");
            }
        }

        if let Some(bus) = &self.inner.bus {
            match serde_json::to_value(&record) {
                Ok(payload) => {
                    bus.emit(names::ERROR_OCCURRED, payload);
                }
                Err(e) => tracing::error!(error = %e, "failed to serialize error record"),
            }
        }

        record
    }

    fn is_critical(&self, record: &ErrorRecord) -> bool {
        self.inner
            .options
            .critical_types
            .iter()
            .any(|t| *t == record.error_type)
    }

    fn show_user_message(&self, record: &ErrorRecord) {
        let critical = self.is_critical(record);
        let (severity, message) = user_message(record.is_network_error, critical);

        let notifier = self
            .inner
            .notifier
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        match notifier {
            Some(notifier) => {
                run_isolated("notifier", || {
                    notifier.show(Notification::new(severity, "Error", message));
                });
            }
            None => {
                let host = &self.inner.host;
                run_isolated("alert", || host.alert(message));
            }
        }

        if critical {
            self.schedule_reload();
        }
    }

    fn schedule_reload(&self) {
        let host = Arc::clone(&self.inner.host);
        let delay = self.inner.options.reload_delay;
        tracing::warn!(delay_ms = delay.as_millis(), "critical error, scheduling reload");

        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            runtime.spawn(async move {
                tokio::time::sleep(delay).await;
                host.reload();
            });
            return;
        }

        let spawned = std::thread::Builder::new()
            .name("pageshell-reload".to_string())
            .spawn(move || {
                std::thread::sleep(delay);
                host.reload();
            });
        if let Err(e) = spawned {
            tracing::error!(error = %e, "failed to schedule reload");
        }
    }

    fn report(&self, record: &ErrorRecord) {
        let reporter = self
            .inner
            .reporter
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let Some(reporter) = reporter else {
            return;
        };

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(id = %record.id, "no async runtime, error report dropped");
            return;
        };

        let report = ErrorReport {
            error: record.clone(),
            app_version: self.inner.options.app_version.clone(),
            environment: self.inner.options.environment.clone(),
        };
        let id = record.id.clone();

        run_isolated("reporter", || {
            let delivery = reporter.report(report);
            runtime.spawn(async move {
                if let Err(e) = delivery.await {
                    tracing::error!(id = %id, error = %e, "failed to report error");
                }
            });
        });
    }

    /// Diagnostic snapshot.
    #[must_use]
    pub fn get_stats(&self) -> ErrorStats {
        let log = self.inner.log();
        let skip = log.queue.len().saturating_sub(RECENT_ERRORS);
        ErrorStats {
            total_errors: log.queue.len(),
            errors_by_type: log.counts.iter().map(|(k, v)| (k.clone(), *v)).collect(),
            recent_errors: log.queue.iter().skip(skip).cloned().collect(),
        }
    }

    /// Empties the queue and resets per-type counters.
    pub fn clear_queue(&self) {
        let mut log = self.inner.log();
        log.queue.clear();
        log.counts.clear();
        tracing::debug!("error queue cleared");
    }

    /// Routes panics outside isolated callbacks into [`handle_error`](Self::handle_error)
    /// with context `"Uncaught error"`.
    ///
    /// The previous hook still runs afterwards. The hook holds the handler
    /// weakly and becomes a pass-through once every handle is dropped.
    /// The [`Host`] must not panic while a panic is being processed: Rust
    /// aborts on a panic raised inside a panic hook.
    pub fn install_panic_hook(&self) {
        let handler: Weak<HandlerInner> = Arc::downgrade(&self.inner);
        let previous = std::panic::take_hook();

        std::panic::set_hook(Box::new(move |info| {
            if !is_isolated() {
                if let Some(inner) = handler.upgrade() {
                    let mut metadata = Map::new();
                    if let Some(location) = info.location() {
                        metadata.insert("filename".into(), Value::from(location.file()));
                        metadata.insert("lineno".into(), Value::from(location.line()));
                        metadata.insert("colno".into(), Value::from(location.column()));
                    }
                    let fault = Fault::named(PANIC_ERROR, panic_message(info.payload()));
                    let handler = Self { inner };
                    let _guard = IsolationGuard::enter();
                    handler.handle_error(fault, UNCAUGHT_CONTEXT, metadata);
                }
            }
            previous(info);
        }));

        tracing::debug!("panic hook installed");
    }

    /// Spawns `future` on the current Tokio runtime, routing an `Err` or a panic
    /// into [`handle_error`](Self::handle_error) under `context`.
    ///
    /// Returns `None` (and logs a warning) when called outside a runtime.
    pub fn watch<F, T, E>(
        &self,
        context: impl Into<String>,
        future: F,
    ) -> Option<tokio::task::JoinHandle<()>>
    where
        F: Future<Output = std::result::Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Into<Fault> + Send + 'static,
    {
        let context = context.into();
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(context = %context, "no async runtime, future not watched");
            return None;
        };

        let handler = self.clone();
        let guarded = isolated(AssertUnwindSafe(future).catch_unwind());

        Some(runtime.spawn(async move {
            let fault = match guarded.await {
                Ok(Ok(_)) => return,
                Ok(Err(e)) => e.into(),
                Err(payload) => Fault::from_panic(payload.as_ref()),
            };
            let mut metadata = Map::new();
            metadata.insert("task".into(), Value::String(context));
            handler.handle_error(fault, REJECTION_CONTEXT, metadata);
        }))
    }
}

impl std::fmt::Debug for ErrorHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErrorHandler")
            .field("options", &self.inner.options)
            .field("queued", &self.inner.log().queue.len())
            .field("has_notifier", &self.has_notifier())
            .finish_non_exhaustive()
    }
}

/// Page URL, user agent and viewport; empty defaults if the host panics.
fn host_snapshot(host: &dyn Host) -> (String, String, Viewport) {
    let mut snapshot = (String::new(), String::new(), Viewport::default());
    run_isolated("host snapshot", || {
        snapshot = (host.url(), host.user_agent(), host.viewport());
    });
    snapshot
}

fn log_record(record: &ErrorRecord) {
    if record.metadata.is_empty() {
        tracing::error!(
            error_type = %record.error_type,
            context = %record.context,
            stack = record.stack.as_deref(),
            "{}",
            record.message
        );
    } else {
        let metadata = Value::Object(record.metadata.clone());
        tracing::error!(
            error_type = %record.error_type,
            context = %record.context,
            metadata = %metadata,
            stack = record.stack.as_deref(),
            "{}",
            record.message
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::notify::{Severity, CRITICAL_MESSAGE, GENERIC_MESSAGE, NETWORK_MESSAGE};
    use crate::host::HeadlessHost;
    use crate::PageShellError;
    use futures_util::future::BoxFuture;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingReporter {
        calls: AtomicUsize,
        fail: bool,
    }

    impl Reporter for CountingReporter {
        fn report(&self, _report: ErrorReport) -> BoxFuture<'static, crate::Result<()>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let fail = self.fail;
            Box::pin(async move {
                if fail {
                    Err(PageShellError::Report("collector down".into()))
                } else {
                    Ok(())
                }
            })
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        shown: Mutex<Vec<Notification>>,
    }

    impl Notifier for RecordingNotifier {
        fn show(&self, notification: Notification) {
            self.shown.lock().unwrap().push(notification);
        }
    }

    fn quiet_options() -> ErrorHandlerOptions {
        ErrorHandlerOptions {
            show_user_messages: false,
            ..ErrorHandlerOptions::default()
        }
    }

    struct BrokenHost;

    impl Host for BrokenHost {
        fn url(&self) -> String {
            panic!("location unavailable")
        }

        fn user_agent(&self) -> String {
            "test-agent".into()
        }

        fn viewport(&self) -> Viewport {
            Viewport::new(800, 600)
        }

        fn reload(&self) {}

        fn alert(&self, _message: &str) {}
    }

    #[test]
    fn panicking_host_does_not_escape_handle_error() {
        let handler = ErrorHandler::new(quiet_options(), Arc::new(BrokenHost), None);

        let record = handler.handle_error("boom", "checkout", Map::new());

        assert_eq!(record.message, "boom");
        assert_eq!(record.url, "");
        assert_eq!(record.user_agent, "");
        assert_eq!(record.viewport, Viewport::default());
        assert_eq!(handler.get_stats().total_errors, 1);
    }

    #[test]
    fn logs_records_with_metadata() {
        let (handler, _host) = handler_with(quiet_options());
        assert!(handler.options().log_errors);

        let mut metadata = Map::new();
        metadata.insert("sku".into(), json!("A-1"));
        let record = handler.handle_error("out of stock", "cart", metadata);

        assert_eq!(record.metadata.get("sku"), Some(&json!("A-1")));
        assert_eq!(handler.get_stats().recent_errors[0].metadata.len(), 1);
    }

    fn handler_with(options: ErrorHandlerOptions) -> (ErrorHandler, Arc<HeadlessHost>) {
        let host = Arc::new(HeadlessHost::new().with_url("https://example.test/cart"));
        (ErrorHandler::new(options, host.clone(), None), host)
    }

    #[test]
    fn classifies_strings_and_missing() {
        let (handler, _) = handler_with(quiet_options());

        let record = handler.handle_error("boom", "", Map::new());
        assert_eq!(record.error_type, "StringError");
        assert_eq!(record.message, "boom");

        let record = handler.handle_error(Fault::Missing, "", Map::new());
        assert_eq!(record.error_type, "UnknownError");
        assert_eq!(record.message, "Unknown error occurred");
    }

    #[test]
    fn record_snapshots_host_and_context() {
        let (handler, _) = handler_with(quiet_options());
        let mut metadata = Map::new();
        metadata.insert("step".into(), json!(2));

        let record = handler.handle_error(Fault::named("TypeError", "bad"), "checkout", metadata);

        assert!(record.id.starts_with("err_"));
        assert_eq!(record.context, "checkout");
        assert_eq!(record.metadata["step"], json!(2));
        assert_eq!(record.url, "https://example.test/cart");
        assert!(!record.is_network_error);
    }

    #[test]
    fn queue_keeps_the_most_recent_records() {
        let (handler, _) = handler_with(quiet_options());
        for n in 0..60 {
            handler.handle_error(format!("error {n}"), "", Map::new());
        }

        let stats = handler.get_stats();
        assert_eq!(stats.total_errors, 50);
        assert_eq!(stats.errors_by_type["StringError"], 60);
        assert_eq!(stats.recent_errors.len(), 10);
        assert_eq!(stats.recent_errors[9].message, "error 59");
        assert_eq!(stats.recent_errors[0].message, "error 50");
    }

    #[test]
    fn clear_queue_resets_counts() {
        let (handler, _) = handler_with(quiet_options());
        handler.handle_error("x", "", Map::new());
        handler.clear_queue();

        let stats = handler.get_stats();
        assert_eq!(stats.total_errors, 0);
        assert!(stats.errors_by_type.is_empty());
    }

    #[tokio::test]
    async fn reports_are_throttled_per_type() {
        let (handler, _) = handler_with(quiet_options());
        let reporter = Arc::new(CountingReporter::default());
        handler.set_reporter(Some(reporter.clone()));

        for _ in 0..15 {
            handler.handle_error(Fault::named("TypeError", "same"), "", Map::new());
        }
        handler.handle_error(Fault::named("RangeError", "other"), "", Map::new());

        assert_eq!(reporter.calls.load(Ordering::SeqCst), 11);
        assert_eq!(handler.get_stats().errors_by_type["TypeError"], 15);
    }

    #[tokio::test]
    async fn report_failures_are_swallowed() {
        let (handler, _) = handler_with(quiet_options());
        let reporter = Arc::new(CountingReporter {
            fail: true,
            ..CountingReporter::default()
        });
        handler.set_reporter(Some(reporter.clone()));

        let record = handler.handle_error("x", "", Map::new());
        tokio::task::yield_now().await;

        assert_eq!(record.error_type, "StringError");
        assert_eq!(reporter.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn reporting_disabled_or_without_runtime_does_not_call_reporter() {
        let (handler, _) = handler_with(quiet_options());
        let reporter = Arc::new(CountingReporter::default());
        handler.set_reporter(Some(reporter.clone()));
        handler.handle_error("no runtime", "", Map::new());
        assert_eq!(reporter.calls.load(Ordering::SeqCst), 0);

        let (handler, _) = handler_with(ErrorHandlerOptions {
            report_errors: false,
            ..quiet_options()
        });
        handler.set_reporter(Some(reporter.clone()));
        handler.handle_error("disabled", "", Map::new());
        assert_eq!(reporter.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn falls_back_to_alert_without_notifier() {
        let (handler, host) = handler_with(ErrorHandlerOptions::default());
        handler.handle_error("x", "", Map::new());
        assert_eq!(host.alerts(), vec![GENERIC_MESSAGE.to_string()]);
    }

    #[test]
    fn network_errors_warn_through_notifier() {
        let (handler, host) = handler_with(ErrorHandlerOptions::default());
        let notifier = Arc::new(RecordingNotifier::default());
        handler.set_notifier(Some(notifier.clone()));

        let record = handler.handle_network_error(
            Fault::named("TypeError", "Failed to fetch"),
            RequestInfo::new("POST", "/api/cart").with_status(502, "Bad Gateway"),
        );

        assert!(record.is_network_error);
        assert_eq!(record.context, "Network error");
        assert_eq!(record.metadata["method"], json!("POST"));
        assert!(host.alerts().is_empty());

        let shown = notifier.shown.lock().unwrap();
        assert_eq!(shown.len(), 1);
        assert_eq!(shown[0].severity, Severity::Warning);
        assert_eq!(shown[0].message, NETWORK_MESSAGE);
        assert_eq!(shown[0].title, "Error");
    }

    #[tokio::test(start_paused = true)]
    async fn critical_errors_reload_after_delay() {
        let (handler, host) = handler_with(ErrorHandlerOptions::default());

        handler.handle_error(Fault::named("ChunkLoadError", "chunk 3 failed"), "", Map::new());
        assert_eq!(host.alerts(), vec![CRITICAL_MESSAGE.to_string()]);
        assert_eq!(host.reload_count(), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(host.reload_count(), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(host.reload_count(), 1);
    }

    #[test]
    fn emits_error_occurred_on_bus() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        bus.on(names::ERROR_OCCURRED, move |payload| {
            sink.lock().unwrap().push(payload.clone());
        });

        let handler = ErrorHandler::new(quiet_options(), Arc::new(HeadlessHost::new()), Some(bus));
        let record = handler.handle_error("boom", "ctx", Map::new());

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0]["id"], json!(record.id));
        assert_eq!(seen[0]["type"], json!("StringError"));
    }

    #[test]
    fn panicking_notifier_does_not_escape() {
        struct Exploding;
        impl Notifier for Exploding {
            fn show(&self, _: Notification) {
                panic!("toast failed");
            }
        }

        let (handler, _) = handler_with(ErrorHandlerOptions::default());
        handler.set_notifier(Some(Arc::new(Exploding)));
        let record = handler.handle_error("x", "", Map::new());
        assert_eq!(record.message, "x");
    }

    #[tokio::test]
    async fn watch_routes_errors_and_panics() {
        let (handler, _) = handler_with(quiet_options());

        let failed = handler
            .watch("sync", async { Err::<(), _>(PageShellError::Storage("offline".into())) })
            .unwrap();
        failed.await.unwrap();

        async fn render() -> crate::Result<()> {
            panic!("render loop")
        }
        let panicked = handler.watch("render", render()).unwrap();
        panicked.await.unwrap();

        let ok = handler.watch("noop", async { Ok::<_, PageShellError>(1) }).unwrap();
        ok.await.unwrap();

        let stats = handler.get_stats();
        assert_eq!(stats.total_errors, 2);
        assert_eq!(stats.recent_errors[0].context, REJECTION_CONTEXT);
        assert_eq!(stats.recent_errors[0].error_type, "PageShellError");
        assert_eq!(stats.recent_errors[1].error_type, "Panic");
        assert_eq!(stats.recent_errors[1].message, "render loop");
        assert_eq!(stats.recent_errors[1].metadata["task"], json!("render"));
    }

    #[test]
    fn options_round_trip_through_toml() {
        let options: ErrorHandlerOptions =
            toml::from_str("report_throttle = 3\nreload_delay = 1500\n").unwrap();
        assert_eq!(options.report_throttle, 3);
        assert_eq!(options.reload_delay, Duration::from_millis(1500));
        assert_eq!(options.max_queue_size, 50);
    }
}
