//! Name → module resolution with exactly-once initialization.
//!
//! Each registered name owns a [`OnceCell`] slot. Concurrent `load` calls for
//! one name share a single factory run; a failed run leaves the slot empty so a
//! later call may retry. Loaded modules are kept in load order, which is the
//! order they are torn down in.

use super::module::{FeatureModule, LoadedModule, ModuleContext};
use crate::domain::error::{PageShellError, Result};
use crate::events::names;
use crate::infrastructure::isolation::{isolated, panic_message, run_isolated};
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use serde_json::json;
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use tokio::sync::OnceCell;

/// Type-erased module factory.
pub type ModuleFactory =
    Arc<dyn Fn(ModuleContext) -> BoxFuture<'static, Result<LoadedModule>> + Send + Sync>;

/// Erases a typed factory into a [`ModuleFactory`] producing modules named `name`.
pub fn module_factory<T, F, Fut>(name: &str, factory: F) -> ModuleFactory
where
    T: FeatureModule,
    F: Fn(ModuleContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T>> + Send + 'static,
{
    let module_name = name.to_string();
    Arc::new(move |context| {
        let name = module_name.clone();
        let built = factory(context);
        async move { built.await.map(|module| LoadedModule::new(&name, module)) }.boxed()
    })
}

#[derive(Default)]
struct Registry {
    factories: HashMap<String, ModuleFactory>,
    slots: HashMap<String, Arc<OnceCell<LoadedModule>>>,
    load_order: Vec<String>,
}

struct LoaderInner {
    context: ModuleContext,
    registry: Mutex<Registry>,
}

impl LoaderInner {
    fn registry(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Resolves module names to cached, initialized instances.
///
/// Cheap to clone; clones share factories and cache.
#[derive(Clone)]
pub struct ModuleLoader {
    inner: Arc<LoaderInner>,
}

impl ModuleLoader {
    /// Creates an empty loader whose factories receive `context`.
    #[must_use]
    pub fn new(context: ModuleContext) -> Self {
        Self {
            inner: Arc::new(LoaderInner {
                context,
                registry: Mutex::new(Registry::default()),
            }),
        }
    }

    /// Collaborators handed to factories.
    #[must_use]
    pub fn context(&self) -> &ModuleContext {
        &self.inner.context
    }

    /// Registers `factory` under `name`, replacing any previous factory.
    ///
    /// An already loaded instance stays cached; the new factory is only used
    /// for loads that have not happened yet.
    pub fn register<T, F, Fut>(&self, name: &str, factory: F)
    where
        T: FeatureModule,
        F: Fn(ModuleContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        self.register_factory(name, module_factory(name, factory));
    }

    /// Registers an already type-erased factory.
    pub fn register_factory(&self, name: &str, factory: ModuleFactory) {
        let replaced = self
            .inner
            .registry()
            .factories
            .insert(name.to_string(), factory)
            .is_some();
        tracing::debug!(module = %name, replaced, "module registered");
    }

    /// Returns `true` if a factory exists for `name`.
    #[must_use]
    pub fn is_registered(&self, name: &str) -> bool {
        self.inner.registry().factories.contains_key(name)
    }

    /// Registered names, sorted.
    #[must_use]
    pub fn registered(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.registry().factories.keys().cloned().collect();
        names.sort();
        names
    }

    /// Loads `name`, initializing it on first use.
    ///
    /// Cached instances are returned immediately. Emits `module:loading`,
    /// then `module:loaded` or `module:failed`, around each factory run.
    ///
    /// # Errors
    ///
    /// - [`PageShellError::ModuleNotFound`] if no factory is registered
    /// - [`PageShellError::ModuleLoad`] if the factory fails or panics, or if
    ///   the cache was cleared before it finished (the module is torn down)
    pub async fn load(&self, name: &str) -> Result<LoadedModule> {
        let (slot, factory) = {
            let mut registry = self.inner.registry();
            let slot = match registry.slots.get(name) {
                Some(slot) => Arc::clone(slot),
                None => {
                    if !registry.factories.contains_key(name) {
                        return Err(PageShellError::ModuleNotFound(name.to_string()));
                    }
                    let slot = Arc::new(OnceCell::new());
                    registry.slots.insert(name.to_string(), Arc::clone(&slot));
                    slot
                }
            };
            (slot, registry.factories.get(name).cloned())
        };

        if let Some(module) = slot.get() {
            tracing::trace!(module = %name, "module cache hit");
            return Ok(module.clone());
        }

        let module = slot
            .get_or_try_init(|| self.initialize(name, factory, &slot))
            .await?
            .clone();
        Ok(module)
    }

    async fn initialize(
        &self,
        name: &str,
        factory: Option<ModuleFactory>,
        slot: &Arc<OnceCell<LoadedModule>>,
    ) -> Result<LoadedModule> {
        let factory = factory.ok_or_else(|| PageShellError::ModuleNotFound(name.to_string()))?;
        let bus = &self.inner.context.bus;
        bus.emit(names::MODULE_LOADING, json!({ "name": name }));

        let started = Instant::now();
        let run = factory(self.inner.context.clone());
        let outcome = match isolated(AssertUnwindSafe(run).catch_unwind()).await {
            Ok(Ok(module)) => Ok(module),
            Ok(Err(e @ PageShellError::ModuleLoad { .. })) => Err(e),
            Ok(Err(e)) => Err(PageShellError::module_load(name, e.to_string())),
            Err(payload) => Err(PageShellError::module_load(
                name,
                format!("factory panicked: {}", panic_message(payload.as_ref())),
            )),
        };

        // The cache may have been cleared while the factory ran.
        let outcome = outcome.and_then(|module| {
            let mut registry = self.inner.registry();
            if registry.slots.get(name).is_some_and(|current| Arc::ptr_eq(current, slot)) {
                registry.load_order.push(name.to_string());
                return Ok(module);
            }
            drop(registry);
            tracing::warn!(module = %name, "module finished loading after teardown, discarding");
            teardown_module(&module);
            Err(PageShellError::module_load(name, "module cache cleared while loading"))
        });

        match &outcome {
            Ok(_) => {
                tracing::debug!(
                    module = %name,
                    elapsed_ms = started.elapsed().as_millis(),
                    "module loaded"
                );
                bus.emit(names::MODULE_LOADED, json!({ "name": name }));
            }
            Err(e) => {
                tracing::warn!(module = %name, error = %e, "module failed to load");
                bus.emit(
                    names::MODULE_FAILED,
                    json!({ "name": name, "message": e.to_string() }),
                );
            }
        }
        outcome
    }

    /// Returns the cached instance for `name`, without loading.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<LoadedModule> {
        self.inner
            .registry()
            .slots
            .get(name)
            .and_then(|slot| slot.get().cloned())
    }

    /// Returns `true` if `name` has been loaded.
    #[must_use]
    pub fn is_loaded(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Names of loaded modules, in load order.
    #[must_use]
    pub fn loaded(&self) -> Vec<String> {
        self.inner.registry().load_order.clone()
    }

    /// Cached instances, in load order.
    #[must_use]
    pub fn loaded_modules(&self) -> Vec<LoadedModule> {
        let registry = self.inner.registry();
        registry
            .load_order
            .iter()
            .filter_map(|name| registry.slots.get(name).and_then(|slot| slot.get().cloned()))
            .collect()
    }

    /// Tears down every loaded module in load order, then empties the cache.
    ///
    /// Each teardown runs isolated: a failure or panic is logged and returned,
    /// and the remaining modules are still torn down. Factories stay registered.
    pub fn teardown_all(&self) -> Vec<PageShellError> {
        let modules = self.loaded_modules();
        let mut failures = Vec::new();

        for module in &modules {
            if let Some(failure) = teardown_module(module) {
                failures.push(failure);
            }
        }

        self.clear();
        tracing::debug!(modules = modules.len(), failures = failures.len(), "modules torn down");
        failures
    }

    /// Drops every cached instance without tearing it down.
    pub fn clear(&self) {
        let mut registry = self.inner.registry();
        registry.slots.clear();
        registry.load_order.clear();
    }
}

/// Runs the module's teardown hook, if any, isolated. Returns the failure.
fn teardown_module(module: &LoadedModule) -> Option<PageShellError> {
    let teardown = module.instance().as_teardown()?;

    let mut result = Ok(());
    let completed = run_isolated(module.name(), || result = teardown.teardown());
    let reason = match (completed, result) {
        (true, Ok(())) => {
            tracing::debug!(module = %module.name(), "module torn down");
            return None;
        }
        (true, Err(e)) => e.to_string(),
        (false, _) => "teardown panicked".to_string(),
    };

    tracing::error!(module = %module.name(), reason = %reason, "module teardown failed");
    Some(PageShellError::Teardown {
        name: module.name().to_string(),
        reason,
    })
}

impl std::fmt::Debug for ModuleLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let registry = self.inner.registry();
        f.debug_struct("ModuleLoader")
            .field("registered", &registry.factories.len())
            .field("loaded", &registry.load_order)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{ErrorHandler, ErrorHandlerOptions};
    use crate::events::EventBus;
    use crate::host::HeadlessHost;
    use crate::modules::Teardown;
    use crate::state::{StateManager, StateOptions};
    use serde_json::Value;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counter {
        torn_down: Arc<AtomicUsize>,
        fail: bool,
    }

    impl Teardown for Counter {
        fn teardown(&self) -> Result<()> {
            self.torn_down.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(PageShellError::Storage("flush failed".into()))
            } else {
                Ok(())
            }
        }
    }

    impl FeatureModule for Counter {
        fn as_teardown(&self) -> Option<&dyn Teardown> {
            Some(self)
        }
    }

    struct Inert;
    impl FeatureModule for Inert {}

    fn loader() -> ModuleLoader {
        let bus = EventBus::new();
        let errors = ErrorHandler::new(
            ErrorHandlerOptions::default(),
            Arc::new(HeadlessHost::new()),
            Some(bus.clone()),
        );
        ModuleLoader::new(ModuleContext {
            bus,
            state: StateManager::in_memory(StateOptions::default()),
            errors,
        })
    }

    fn record_events(loader: &ModuleLoader) -> Arc<Mutex<Vec<String>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        for event in [names::MODULE_LOADING, names::MODULE_LOADED, names::MODULE_FAILED] {
            let sink = Arc::clone(&seen);
            loader.context().bus.on(event, move |payload: &Value| {
                let name = payload["name"].as_str().unwrap_or_default();
                sink.lock().unwrap().push(format!("{event} {name}"));
            });
        }
        seen
    }

    #[tokio::test]
    async fn load_is_cached_and_runs_factory_once() {
        let loader = loader();
        let builds = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&builds);
        loader.register("inert", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Ok(Inert) }
        });

        let first = loader.load("inert").await.unwrap();
        let second = loader.load("inert").await.unwrap();

        assert!(first.ptr_eq(&second));
        assert_eq!(builds.load(Ordering::SeqCst), 1);
        assert_eq!(loader.loaded(), vec!["inert"]);
    }

    #[tokio::test(start_paused = true)]
    async fn load_finishing_after_teardown_is_discarded() {
        let loader = loader();
        let torn_down = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&torn_down);
        loader.register("slow", move |_| {
            let torn_down = Arc::clone(&counter);
            async move {
                tokio::time::sleep(std::time::Duration::from_millis(50)).await;
                Ok(Counter {
                    torn_down,
                    fail: false,
                })
            }
        });

        let (loaded, failures) = tokio::join!(loader.load("slow"), async {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            loader.teardown_all()
        });

        assert!(failures.is_empty());
        assert!(matches!(loaded, Err(PageShellError::ModuleLoad { .. })));
        assert_eq!(torn_down.load(Ordering::SeqCst), 1);
        assert!(loader.loaded().is_empty());
        assert!(!loader.is_loaded("slow"));

        // A fresh load after teardown works again.
        loader.load("slow").await.unwrap();
        assert_eq!(loader.loaded(), vec!["slow"]);
    }

    #[tokio::test]
    async fn concurrent_loads_share_one_initialization() {
        let loader = loader();
        let builds = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&builds);
        loader.register("slow", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            async {
                tokio::task::yield_now().await;
                Ok(Inert)
            }
        });

        let (a, b) = tokio::join!(loader.load("slow"), loader.load("slow"));
        assert!(a.unwrap().ptr_eq(&b.unwrap()));
        assert_eq!(builds.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unknown_module_is_not_found() {
        let loader = loader();
        let err = loader.load("ghost").await.unwrap_err();
        assert!(matches!(err, PageShellError::ModuleNotFound(name) if name == "ghost"));
        assert!(!loader.is_loaded("ghost"));
    }

    #[tokio::test]
    async fn failed_load_emits_and_allows_retry() {
        let loader = loader();
        let events = record_events(&loader);
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&attempts);
        loader.register("flaky", move |_| {
            let attempt = counter.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt == 0 {
                    Err(PageShellError::Storage("cdn timeout".into()))
                } else {
                    Ok(Inert)
                }
            }
        });

        let err = loader.load("flaky").await.unwrap_err();
        assert!(matches!(err, PageShellError::ModuleLoad { ref name, .. } if name == "flaky"));
        assert!(!loader.is_loaded("flaky"));

        loader.load("flaky").await.unwrap();
        assert!(loader.is_loaded("flaky"));
        assert_eq!(
            *events.lock().unwrap(),
            vec![
                "module:loading flaky",
                "module:failed flaky",
                "module:loading flaky",
                "module:loaded flaky",
            ]
        );
    }

    #[tokio::test]
    async fn panicking_factory_becomes_load_error() {
        let loader = loader();
        loader.register("broken", |_| async {
            if true {
                panic!("bad chunk");
            }
            Ok(Inert)
        });

        let err = loader.load("broken").await.unwrap_err();
        assert!(err.to_string().contains("bad chunk"));
    }

    #[tokio::test]
    async fn factories_receive_shared_context() {
        let loader = loader();
        loader.register("stateful", |ctx: ModuleContext| async move {
            ctx.state.set("stateful:ready", serde_json::json!(true));
            Ok(Inert)
        });

        loader.load("stateful").await.unwrap();
        assert_eq!(
            loader.context().state.get("stateful:ready"),
            Some(serde_json::json!(true))
        );
    }

    #[tokio::test]
    async fn teardown_all_isolates_failures_and_clears_cache() {
        let loader = loader();
        let torn_down = Arc::new(AtomicUsize::new(0));
        for (name, fail) in [("a", true), ("b", false)] {
            let torn_down = Arc::clone(&torn_down);
            loader.register(name, move |_| {
                let torn_down = Arc::clone(&torn_down);
                async move { Ok(Counter { torn_down, fail }) }
            });
        }
        loader.register("inert", |_| async { Ok(Inert) });

        for name in ["a", "b", "inert"] {
            loader.load(name).await.unwrap();
        }

        let failures = loader.teardown_all();
        assert_eq!(torn_down.load(Ordering::SeqCst), 2);
        assert_eq!(failures.len(), 1);
        assert!(matches!(&failures[0], PageShellError::Teardown { name, .. } if name == "a"));
        assert!(loader.loaded().is_empty());
        assert!(loader.is_registered("a"));
    }
}
