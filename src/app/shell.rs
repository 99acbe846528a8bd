//! The page shell: owns the shared components and runs the page lifecycle.
//!
//! # Boot sequence
//!
//! [`Shell::init`] runs these steps in order:
//!
//! 1. Pre-init hook (fatal on failure)
//! 2. Component registration (fatal on failure)
//! 3. Wire listeners: `theme:change`, host events, optional panic hook
//! 4. Initial theme: the saved choice, else the system preference
//! 5. Auto-load the modules configured for the current page (non-fatal)
//! 6. Page initializer (non-fatal)
//! 7. Emit `app:ready`
//!
//! A fatal failure is routed through the [`ErrorHandler`] with context
//! `App initialization failed`, the shell moves to [`ShellState::Failed`], and
//! the error is returned. Non-fatal failures are routed and boot continues.

use super::actions::Action;
use super::handler::{handle_event, HostEvent};
use super::modes::ShellState;
use super::page::{ComponentRegistrar, PageContext, PageInitializer, PreInitHook};
use crate::domain::error::{PageShellError, Result};
use crate::domain::theme::{Theme, THEME_KEY};
use crate::errors::{ErrorHandler, Fault, Notification, Notifier, Reporter};
use crate::events::{names, EventBus, EventBusOptions};
use crate::host::{HeadlessHost, Host};
use crate::infrastructure::{isolated, panic_message, resolve_in_data_dir, run_isolated};
use crate::modules::{
    module_factory, FeatureModule, LoadedModule, ModuleContext, ModuleLoader, NotificationCenter,
    DEFAULT_MAX_VISIBLE,
};
use crate::state::{StateManager, StateOptions};
use crate::storage::{DurableStore, JsonFileStore, MemoryStore};
use crate::{Config, Environment};
use futures_util::future::{BoxFuture, FutureExt};
use serde_json::{json, Map};
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use tracing::Instrument;

/// Context for fatal boot failures.
pub const INIT_FAILED_CONTEXT: &str = "App initialization failed";

#[derive(Default)]
struct Hooks {
    pre_init: Option<PreInitHook>,
    components: Option<ComponentRegistrar>,
    initializers: HashMap<String, PageInitializer>,
}

struct ShellInner {
    config: Config,
    environment: Environment,
    host: Arc<dyn Host>,
    bus: EventBus,
    state: StateManager,
    errors: ErrorHandler,
    loader: ModuleLoader,
    hooks: Hooks,
    lifecycle: Mutex<ShellState>,
    listeners_wired: AtomicBool,
    theme: Mutex<Option<Theme>>,
}

impl ShellInner {
    fn lifecycle(&self) -> MutexGuard<'_, ShellState> {
        self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Application shell for one page.
///
/// Cheap to clone; clones drive the same shell.
#[derive(Clone)]
pub struct Shell {
    inner: Arc<ShellInner>,
}

impl Shell {
    /// Starts building a shell from `config`.
    #[must_use]
    pub fn builder(config: Config) -> ShellBuilder {
        ShellBuilder::new(config)
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn lifecycle(&self) -> ShellState {
        *self.inner.lifecycle()
    }

    /// Identity of the current page, as reported by the host.
    #[must_use]
    pub fn page(&self) -> String {
        self.inner.host.page()
    }

    /// Deployment environment, configured or detected.
    #[must_use]
    pub fn environment(&self) -> Environment {
        self.inner.environment
    }

    /// Shared event bus.
    #[must_use]
    pub fn bus(&self) -> &EventBus {
        &self.inner.bus
    }

    /// Shared state store.
    #[must_use]
    pub fn state(&self) -> &StateManager {
        &self.inner.state
    }

    /// Shared error funnel.
    #[must_use]
    pub fn errors(&self) -> &ErrorHandler {
        &self.inner.errors
    }

    /// Module loader.
    #[must_use]
    pub fn loader(&self) -> &ModuleLoader {
        &self.inner.loader
    }

    /// Theme currently applied, `None` before `init` wires it.
    #[must_use]
    pub fn theme(&self) -> Option<Theme> {
        *self.inner.theme.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs the boot sequence.
    ///
    /// # Errors
    ///
    /// Returns [`PageShellError::InvalidState`] unless the shell is
    /// [`ShellState::Uninitialized`], or the error of a fatal boot step (the
    /// shell is then [`ShellState::Failed`]).
    pub async fn init(&self) -> Result<()> {
        self.begin_init()?;

        let page = self.page();
        let started = Instant::now();
        let span = tracing::info_span!("shell_init", page = %page);

        match self.boot(&page).instrument(span).await {
            Ok(()) => {
                if !self.finish_init(ShellState::Ready) {
                    tracing::warn!(page = %page, "shell destroyed during init");
                    return Ok(());
                }
                tracing::debug!(
                    page = %page,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    modules = ?self.inner.loader.loaded(),
                    "app initialized"
                );
                self.inner.bus.emit(names::APP_READY, json!({ "page": page }));
                Ok(())
            }
            Err(e) => {
                self.inner
                    .errors
                    .handle_error(&e, INIT_FAILED_CONTEXT, Map::new());
                self.finish_init(ShellState::Failed);
                Err(e)
            }
        }
    }

    fn begin_init(&self) -> Result<()> {
        let mut lifecycle = self.inner.lifecycle();
        if !lifecycle.can_init() {
            return Err(PageShellError::InvalidState {
                operation: "init",
                state: lifecycle.to_string(),
            });
        }
        *lifecycle = ShellState::Initializing;
        Ok(())
    }

    /// Moves `Initializing` to `next`. Returns `false` if the shell left
    /// `Initializing` in the meantime (destroyed mid-boot).
    fn finish_init(&self, next: ShellState) -> bool {
        let mut lifecycle = self.inner.lifecycle();
        if *lifecycle != ShellState::Initializing {
            return false;
        }
        *lifecycle = next;
        true
    }

    fn still_booting(&self) -> bool {
        self.lifecycle() == ShellState::Initializing
    }

    async fn boot(&self, page: &str) -> Result<()> {
        self.run_pre_init()?;
        self.register_components().await?;
        if !self.still_booting() {
            return Ok(());
        }

        self.wire_listeners();
        self.init_theme();

        self.auto_load_modules(page).await;
        if !self.still_booting() {
            return Ok(());
        }

        self.init_page(page).await;
        Ok(())
    }

    fn run_pre_init(&self) -> Result<()> {
        let Some(hook) = &self.inner.hooks.pre_init else {
            return Ok(());
        };

        let context = self.inner.loader.context();
        let mut outcome = Ok(());
        if !run_isolated("pre_init", || outcome = hook(context)) {
            return Err(PageShellError::hook("pre_init", "hook panicked"));
        }
        outcome.map_err(|e| PageShellError::hook("pre_init", e.to_string()))
    }

    async fn register_components(&self) -> Result<()> {
        let Some(registrar) = self.inner.hooks.components.clone() else {
            return Ok(());
        };

        let started = Instant::now();
        let run = registrar(self.inner.loader.context().clone());
        match isolated(AssertUnwindSafe(run).catch_unwind()).await {
            Ok(Ok(())) => {
                tracing::debug!(
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "components registered"
                );
                Ok(())
            }
            Ok(Err(e)) => Err(PageShellError::hook("components", e.to_string())),
            Err(payload) => Err(PageShellError::hook(
                "components",
                format!("registrar panicked: {}", panic_message(payload.as_ref())),
            )),
        }
    }

    fn wire_listeners(&self) {
        let shell = Arc::downgrade(&self.inner);
        self.inner.bus.on(names::THEME_CHANGE, move |payload| {
            let Some(inner) = shell.upgrade() else {
                return;
            };
            match payload.as_str().map(str::parse::<Theme>) {
                Some(Ok(theme)) => Shell { inner }.set_theme(theme),
                _ => tracing::warn!(payload = %payload, "ignoring invalid theme change"),
            }
        });

        if self.inner.config.errors.capture_panics {
            self.inner.errors.install_panic_hook();
        }

        self.inner.listeners_wired.store(true, Ordering::SeqCst);
        tracing::debug!("listeners wired");
    }

    fn saved_theme(&self) -> Option<Theme> {
        self.inner
            .state
            .get(THEME_KEY)
            .and_then(|value| value.as_str().and_then(|name| name.parse().ok()))
    }

    fn init_theme(&self) {
        match self.saved_theme() {
            Some(theme) => self.apply_theme(theme),
            None => self.apply_theme(Theme::from_system(self.inner.host.prefers_dark())),
        }
    }

    fn apply_theme(&self, theme: Theme) {
        self.inner.host.apply_theme(theme);
        *self.inner.theme.lock().unwrap_or_else(PoisonError::into_inner) = Some(theme);
        tracing::debug!(theme = %theme, "theme applied");
    }

    /// Applies `theme` and persists it as the user's explicit choice.
    ///
    /// Once a choice is saved, system theme changes are ignored.
    pub fn set_theme(&self, theme: Theme) {
        self.apply_theme(theme);
        self.inner.state.set(THEME_KEY, theme.into());
    }

    async fn auto_load_modules(&self, page: &str) {
        let modules = self.inner.config.page_modules(page).to_vec();
        if modules.is_empty() {
            return;
        }
        tracing::debug!(page, modules = ?modules, "loading page modules");

        for name in &modules {
            if !self.still_booting() {
                break;
            }
            // Failures are already routed by load_module.
            let _ = self.load_module(name).await;
        }
    }

    async fn init_page(&self, page: &str) {
        let Some(initializer) = self.inner.hooks.initializers.get(page).cloned() else {
            tracing::trace!(page, "no page initializer");
            return;
        };

        let run = initializer(PageContext::new(page, self.clone()));
        let fault = match isolated(AssertUnwindSafe(run).catch_unwind()).await {
            Ok(Ok(())) => {
                tracing::debug!(page, "page initialized");
                return;
            }
            Ok(Err(e)) => Fault::from(e),
            Err(payload) => Fault::from_panic(payload.as_ref()),
        };

        self.inner.errors.handle_error(
            fault,
            &format!("Page initialization failed: {page}"),
            Map::new(),
        );
    }

    /// Loads a module by name.
    ///
    /// Failures are routed through the error handler with context
    /// `Failed to load module: <name>` and also returned. The first loaded module
    /// exposing a notifier becomes the error handler's notifier.
    ///
    /// # Errors
    ///
    /// [`PageShellError::InvalidState`] if the shell is destroyed before or
    /// while the module loads, otherwise whatever [`ModuleLoader::load`] returns.
    pub async fn load_module(&self, name: &str) -> Result<LoadedModule> {
        let lifecycle = self.lifecycle();
        if lifecycle.is_terminal() {
            return Err(PageShellError::InvalidState {
                operation: "load module",
                state: lifecycle.to_string(),
            });
        }

        let outcome = self.inner.loader.load(name).await;

        // Destroyed while loading: the loader tore down anything that finished
        // after its cache was cleared.
        let lifecycle = self.lifecycle();
        if lifecycle.is_terminal() {
            tracing::debug!(module = name, "load finished after destroy");
            return Err(PageShellError::InvalidState {
                operation: "load module",
                state: lifecycle.to_string(),
            });
        }

        match outcome {
            Ok(module) => {
                self.adopt_notifier(&module);
                Ok(module)
            }
            Err(e) => {
                self.inner.errors.handle_error(
                    &e,
                    &format!("Failed to load module: {name}"),
                    Map::new(),
                );
                Err(e)
            }
        }
    }

    fn adopt_notifier(&self, module: &LoadedModule) {
        if module.instance().as_notifier().is_none() || self.inner.errors.has_notifier() {
            return;
        }
        self.inner
            .errors
            .set_notifier(Some(Arc::new(ModuleNotifier(module.clone()))));
        tracing::debug!(module = module.name(), "notifier registered");
    }

    /// Reacts to something that happened in the host.
    ///
    /// Ignored until `init` has wired listeners, and after `destroy`.
    pub fn dispatch(&self, event: HostEvent) {
        if !self.inner.listeners_wired.load(Ordering::SeqCst) {
            tracing::trace!(event = ?event, "host event ignored, listeners not wired");
            return;
        }

        for action in handle_event(&event, self.saved_theme().is_some()) {
            self.execute(action);
        }
    }

    fn execute(&self, action: Action) {
        match action {
            Action::Emit { event, payload } => {
                tracing::debug!(event, "host event forwarded");
                self.inner.bus.emit(event, payload);
            }
            Action::RouteError { fault, context } => {
                self.inner.errors.handle_error(fault, context, Map::new());
            }
            Action::ApplyTheme(theme) => self.apply_theme(theme),
            Action::Destroy => self.destroy(),
        }
    }

    /// Tears the shell down.
    ///
    /// Modules are torn down (failures logged, never propagated), listeners and
    /// in-memory state are dropped. Calling it again is a no-op.
    ///
    /// State goes through [`StateManager::reset`], not [`StateManager::clear`]:
    /// persisted copies of persistent keys (the theme included) are kept so the
    /// next page load can hydrate them. Call `state().clear()` first to erase
    /// them as well.
    pub fn destroy(&self) {
        let previous = {
            let mut lifecycle = self.inner.lifecycle();
            if lifecycle.is_terminal() {
                tracing::debug!("shell already destroyed");
                return;
            }
            std::mem::replace(&mut *lifecycle, ShellState::Destroyed)
        };
        self.inner.listeners_wired.store(false, Ordering::SeqCst);

        let failures = self.inner.loader.teardown_all();
        self.inner.errors.set_notifier(None);
        self.inner.bus.remove_all_listeners();
        self.inner.state.reset();

        tracing::info!(
            previous = %previous,
            teardown_failures = failures.len(),
            "shell destroyed"
        );
    }
}

impl std::fmt::Debug for Shell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Shell")
            .field("page", &self.page())
            .field("lifecycle", &self.lifecycle())
            .field("environment", &self.inner.environment)
            .field("theme", &self.theme())
            .finish_non_exhaustive()
    }
}

/// Forwards notifications to a loaded module's notifier capability.
struct ModuleNotifier(LoadedModule);

impl Notifier for ModuleNotifier {
    fn show(&self, notification: Notification) {
        if let Some(notifier) = self.0.instance().as_notifier() {
            notifier.show(notification);
        }
    }
}

/// Assembles a [`Shell`].
///
/// # Example
///
/// ```
/// use pageshell::{Config, Shell};
/// use pageshell::host::HeadlessHost;
/// use pageshell::modules::FeatureModule;
/// use std::sync::Arc;
///
/// struct Analytics;
/// impl FeatureModule for Analytics {}
///
/// let shell = Shell::builder(Config::default())
///     .host(Arc::new(HeadlessHost::new().with_page("home")))
///     .module("analytics", |_ctx| async { Ok(Analytics) })
///     .page("home", |page| async move {
///         page.load_module("analytics").await?;
///         Ok(())
///     })
///     .build()?;
///
/// assert!(shell.loader().is_registered("analytics"));
/// # Ok::<(), pageshell::PageShellError>(())
/// ```
pub struct ShellBuilder {
    config: Config,
    host: Option<Arc<dyn Host>>,
    store: Option<Box<dyn DurableStore>>,
    reporter: Option<Arc<dyn Reporter>>,
    hooks: Hooks,
    modules: Vec<(String, crate::modules::ModuleFactory)>,
}

impl ShellBuilder {
    fn new(config: Config) -> Self {
        Self {
            config,
            host: None,
            store: None,
            reporter: None,
            hooks: Hooks::default(),
            modules: Vec::new(),
        }
    }

    /// Embedding environment. Defaults to a [`HeadlessHost`].
    #[must_use]
    pub fn host(mut self, host: Arc<dyn Host>) -> Self {
        self.host = Some(host);
        self
    }

    /// Durable store for persistent keys, overriding `storage_path`.
    #[must_use]
    pub fn store(mut self, store: impl DurableStore + 'static) -> Self {
        self.store = Some(Box::new(store));
        self
    }

    /// Error reporter, overriding `errors.report_endpoint`.
    #[must_use]
    pub fn reporter(mut self, reporter: Arc<dyn Reporter>) -> Self {
        self.reporter = Some(reporter);
        self
    }

    /// Hook run first during `init`.
    #[must_use]
    pub fn pre_init<F>(mut self, hook: F) -> Self
    where
        F: Fn(&ModuleContext) -> Result<()> + Send + Sync + 'static,
    {
        self.hooks.pre_init = Some(Arc::new(hook));
        self
    }

    /// UI component registration, run after the pre-init hook.
    #[must_use]
    pub fn components<F, Fut>(mut self, registrar: F) -> Self
    where
        F: Fn(ModuleContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.hooks.components = Some(Arc::new(move |ctx| -> BoxFuture<'static, Result<()>> {
            registrar(ctx).boxed()
        }));
        self
    }

    /// Initializer for the page identified as `page`. Replaces an earlier one.
    #[must_use]
    pub fn page<F, Fut>(mut self, page: &str, initializer: F) -> Self
    where
        F: Fn(PageContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let initializer: PageInitializer = Arc::new(move |ctx| initializer(ctx).boxed());
        self.hooks.initializers.insert(page.to_string(), initializer);
        self
    }

    /// Registers a module factory under `name`. Registering `notifications`
    /// replaces the built-in notification center.
    #[must_use]
    pub fn module<T, F, Fut>(mut self, name: &str, factory: F) -> Self
    where
        T: FeatureModule,
        F: Fn(ModuleContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        self.modules
            .push((name.to_string(), module_factory(name, factory)));
        self
    }

    /// Creates the components and wires them together.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured storage file cannot be opened.
    pub fn build(self) -> Result<Shell> {
        let config = self.config;
        let host = self
            .host
            .unwrap_or_else(|| Arc::new(HeadlessHost::new()) as Arc<dyn Host>);
        let environment = config
            .app
            .environment
            .unwrap_or_else(|| Environment::detect_from_url(&host.url()));

        let store: Box<dyn DurableStore> = match (self.store, &config.storage_path) {
            (Some(store), _) => store,
            (None, Some(path)) => Box::new(JsonFileStore::open(resolve_in_data_dir(path))?),
            (None, None) => Box::new(MemoryStore::new()),
        };

        let mut persistent = config.state.persistent.clone();
        if !persistent.iter().any(|key| key == THEME_KEY) {
            persistent.push(THEME_KEY.to_string());
        }
        let state = StateManager::with_boxed_store(
            StateOptions {
                persistent,
                max_history: config.state.max_history,
                ..StateOptions::default()
            },
            store,
        );

        let bus = EventBus::with_options(EventBusOptions {
            max_listeners: config.events.max_listeners,
        });
        let errors = ErrorHandler::new(
            config.error_options(environment),
            Arc::clone(&host),
            Some(bus.clone()),
        );
        if let Some(reporter) = self.reporter {
            errors.set_reporter(Some(reporter));
        }

        let loader = ModuleLoader::new(ModuleContext {
            bus: bus.clone(),
            state: state.clone(),
            errors: errors.clone(),
        });
        NotificationCenter::register(&loader, DEFAULT_MAX_VISIBLE);
        for (name, factory) in self.modules {
            loader.register_factory(&name, factory);
        }

        tracing::info!(
            app = %config.app.name,
            version = %config.app.version,
            environment = %environment,
            page = %host.page(),
            "shell built"
        );

        Ok(Shell {
            inner: Arc::new(ShellInner {
                config,
                environment,
                host,
                bus,
                state,
                errors,
                loader,
                hooks: self.hooks,
                lifecycle: Mutex::new(ShellState::Uninitialized),
                listeners_wired: AtomicBool::new(false),
                theme: Mutex::new(None),
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::Teardown;
    use serde_json::Value;
    use std::sync::atomic::AtomicUsize;

    fn headless(page: &str) -> Arc<HeadlessHost> {
        Arc::new(HeadlessHost::new().with_page(page))
    }

    struct Counted(Arc<AtomicUsize>);

    impl Teardown for Counted {
        fn teardown(&self) -> Result<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    impl FeatureModule for Counted {
        fn as_teardown(&self) -> Option<&dyn Teardown> {
            Some(self)
        }
    }

    #[tokio::test]
    async fn boots_to_ready_and_emits_app_ready() {
        let shell = Shell::builder(Config::default())
            .host(headless("home"))
            .build()
            .unwrap();
        let ready = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&ready);
        shell.bus().on(names::APP_READY, move |payload| {
            seen.lock().unwrap().push(payload.clone());
        });

        shell.init().await.unwrap();

        assert_eq!(shell.lifecycle(), ShellState::Ready);
        assert_eq!(*ready.lock().unwrap(), vec![json!({ "page": "home" })]);
        assert_eq!(shell.theme(), Some(Theme::Light));
    }

    #[tokio::test]
    async fn init_twice_is_rejected() {
        let shell = Shell::builder(Config::default()).build().unwrap();
        shell.init().await.unwrap();

        let err = shell.init().await.unwrap_err();
        assert!(matches!(err, PageShellError::InvalidState { operation: "init", .. }));
        assert_eq!(shell.lifecycle(), ShellState::Ready);
    }

    #[tokio::test]
    async fn failing_pre_init_is_fatal() {
        let shell = Shell::builder(Config::default())
            .pre_init(|_| Err(PageShellError::Config("no locale".into())))
            .build()
            .unwrap();

        let err = shell.init().await.unwrap_err();

        assert!(matches!(err, PageShellError::Hook { hook: "pre_init", .. }));
        assert_eq!(shell.lifecycle(), ShellState::Failed);
        let stats = shell.errors().get_stats();
        assert_eq!(stats.total_errors, 1);
        assert_eq!(stats.recent_errors[0].context, INIT_FAILED_CONTEXT);
    }

    #[tokio::test]
    async fn panicking_registrar_is_fatal() {
        async fn register(_ctx: ModuleContext) -> Result<()> {
            panic!("bad component")
        }

        let shell = Shell::builder(Config::default())
            .components(register)
            .build()
            .unwrap();

        let err = shell.init().await.unwrap_err();

        assert!(err.to_string().contains("bad component"), "{err}");
        assert_eq!(shell.lifecycle(), ShellState::Failed);
    }

    #[tokio::test]
    async fn page_initializer_failure_is_not_fatal() {
        let shell = Shell::builder(Config::default())
            .host(headless("checkout"))
            .page("checkout", |_page| async {
                Err::<(), _>(PageShellError::Config("missing cart".into()))
            })
            .build()
            .unwrap();

        shell.init().await.unwrap();

        assert_eq!(shell.lifecycle(), ShellState::Ready);
        let stats = shell.errors().get_stats();
        assert_eq!(stats.total_errors, 1);
        assert_eq!(
            stats.recent_errors[0].context,
            "Page initialization failed: checkout"
        );
    }

    #[tokio::test]
    async fn initializer_only_runs_for_its_page() {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&runs);
        let shell = Shell::builder(Config::default())
            .host(headless("home"))
            .page("checkout", move |_page| {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Ok(()) }
            })
            .build()
            .unwrap();

        shell.init().await.unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unknown_module_is_routed_and_returned() {
        let shell = Shell::builder(Config::default()).build().unwrap();

        let err = shell.load_module("charts").await.unwrap_err();

        assert!(matches!(err, PageShellError::ModuleNotFound(_)));
        let stats = shell.errors().get_stats();
        assert_eq!(stats.recent_errors[0].context, "Failed to load module: charts");
    }

    #[tokio::test]
    async fn theme_change_event_persists_choice() {
        let shell = Shell::builder(Config::default()).build().unwrap();
        shell.init().await.unwrap();

        shell.bus().emit(names::THEME_CHANGE, json!("dark"));
        assert_eq!(shell.theme(), Some(Theme::Dark));
        assert_eq!(shell.state().get(THEME_KEY), Some(json!("dark")));

        shell.bus().emit(names::THEME_CHANGE, json!(42));
        assert_eq!(shell.theme(), Some(Theme::Dark));
    }

    #[tokio::test]
    async fn system_theme_applies_until_a_choice_is_saved() {
        let host = Arc::new(HeadlessHost::new().with_prefers_dark(true));
        let shell = Shell::builder(Config::default())
            .host(host.clone())
            .build()
            .unwrap();
        shell.init().await.unwrap();
        assert_eq!(shell.theme(), Some(Theme::Dark));
        assert!(!shell.state().has(THEME_KEY));

        shell.dispatch(HostEvent::SystemThemeChanged { dark: false });
        assert_eq!(shell.theme(), Some(Theme::Light));

        shell.set_theme(Theme::Dark);
        shell.dispatch(HostEvent::SystemThemeChanged { dark: false });
        assert_eq!(shell.theme(), Some(Theme::Dark));
        assert_eq!(
            host.applied_themes(),
            vec![Theme::Dark, Theme::Light, Theme::Dark]
        );
    }

    #[tokio::test]
    async fn host_events_before_init_are_ignored() {
        let shell = Shell::builder(Config::default()).build().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        shell.bus().on(names::NETWORK_OFFLINE, move |_: &Value| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        shell.dispatch(HostEvent::Offline);
        assert_eq!(hits.load(Ordering::SeqCst), 0);

        shell.init().await.unwrap();
        shell.dispatch(HostEvent::Offline);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn uncaught_errors_are_routed() {
        let shell = Shell::builder(Config::default()).build().unwrap();
        shell.init().await.unwrap();

        shell.dispatch(HostEvent::UncaughtError(Fault::from("boom")));

        let stats = shell.errors().get_stats();
        assert_eq!(stats.recent_errors[0].context, "Global error");
    }

    #[tokio::test]
    async fn destroy_tears_down_and_is_idempotent() {
        let torn = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&torn);
        let shell = Shell::builder(Config::default())
            .module("analytics", move |_ctx| {
                let counter = Arc::clone(&counter);
                async move { Ok(Counted(counter)) }
            })
            .build()
            .unwrap();
        shell.init().await.unwrap();
        shell.load_module("analytics").await.unwrap();
        shell.state().set("cart", json!([1]));

        shell.dispatch(HostEvent::BeforeUnload);
        shell.destroy();

        assert_eq!(shell.lifecycle(), ShellState::Destroyed);
        assert_eq!(torn.load(Ordering::SeqCst), 1);
        assert!(shell.loader().loaded().is_empty());
        assert!(shell.bus().event_names().is_empty());
        assert!(!shell.state().has("cart"));
        assert!(matches!(
            shell.load_module("analytics").await,
            Err(PageShellError::InvalidState { .. })
        ));
        assert!(shell.init().await.is_err());
    }

    struct SlowToasts(Arc<AtomicUsize>);

    impl Notifier for SlowToasts {
        fn show(&self, _notification: Notification) {}
    }

    impl Teardown for SlowToasts {
        fn teardown(&self) -> Result<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    impl FeatureModule for SlowToasts {
        fn as_teardown(&self) -> Option<&dyn Teardown> {
            Some(self)
        }

        fn as_notifier(&self) -> Option<&dyn Notifier> {
            Some(self)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn load_in_flight_during_destroy_is_torn_down() {
        let torn = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&torn);
        let shell = Shell::builder(Config::default())
            .module("toasts", move |_ctx| {
                let counter = Arc::clone(&counter);
                async move {
                    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
                    Ok(SlowToasts(counter))
                }
            })
            .build()
            .unwrap();
        shell.init().await.unwrap();

        let (loaded, ()) = tokio::join!(shell.load_module("toasts"), async {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            shell.destroy();
        });

        assert!(matches!(loaded, Err(PageShellError::InvalidState { .. })));
        assert_eq!(shell.lifecycle(), ShellState::Destroyed);
        assert_eq!(torn.load(Ordering::SeqCst), 1);
        assert!(shell.loader().loaded().is_empty());
        assert!(!shell.errors().has_notifier());
    }

    #[tokio::test]
    async fn notifications_module_becomes_the_notifier() {
        let host = headless("home");
        let shell = Shell::builder(Config::default())
            .host(host.clone())
            .build()
            .unwrap();
        shell.init().await.unwrap();
        assert!(!shell.errors().has_notifier());

        let module = shell
            .load_module(crate::modules::NOTIFICATIONS_MODULE)
            .await
            .unwrap();
        assert!(shell.errors().has_notifier());

        shell.errors().handle_error("boom", "test", Map::new());
        let center = module.downcast::<NotificationCenter>().unwrap();
        assert_eq!(center.visible().len(), 1);
        assert!(host.alerts().is_empty());
    }
}
