//! Feature module capabilities and the handle the loader hands out.

use crate::domain::error::Result;
use crate::errors::{ErrorHandler, Notifier};
use crate::events::EventBus;
use crate::state::StateManager;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Shutdown capability: modules implementing it are told when the shell is destroyed.
pub trait Teardown: Send + Sync {
    /// Releases whatever the module holds.
    ///
    /// # Errors
    ///
    /// A failure is logged by the shell; remaining modules are still torn down.
    fn teardown(&self) -> Result<()>;
}

/// A lazily loaded unit of page functionality.
///
/// Capabilities are opt-in: a module that does not override a method simply
/// does not have that capability.
///
/// # Example
///
/// ```
/// use pageshell::modules::{FeatureModule, Teardown};
/// use pageshell::Result;
///
/// struct Analytics;
///
/// impl Teardown for Analytics {
///     fn teardown(&self) -> Result<()> {
///         Ok(())
///     }
/// }
///
/// impl FeatureModule for Analytics {
///     fn as_teardown(&self) -> Option<&dyn Teardown> {
///         Some(self)
///     }
/// }
/// ```
pub trait FeatureModule: Any + Send + Sync {
    /// The teardown capability, if any.
    fn as_teardown(&self) -> Option<&dyn Teardown> {
        None
    }

    /// The notification capability, if any. The shell registers the first
    /// module exposing it with the error handler.
    fn as_notifier(&self) -> Option<&dyn Notifier> {
        None
    }
}

/// Collaborators handed to every module factory.
#[derive(Clone, Debug)]
pub struct ModuleContext {
    /// Shared event bus.
    pub bus: EventBus,
    /// Shared state store.
    pub state: StateManager,
    /// Shared error funnel.
    pub errors: ErrorHandler,
}

/// A loaded module instance, as cached by the loader.
///
/// Clones point at the same instance; [`LoadedModule::ptr_eq`] tells whether
/// two handles came from the same initialization.
#[derive(Clone)]
pub struct LoadedModule {
    name: Arc<str>,
    instance: Arc<dyn FeatureModule>,
    any: Arc<dyn Any + Send + Sync>,
}

impl LoadedModule {
    /// Wraps a freshly built module.
    pub fn new<T: FeatureModule>(name: &str, module: T) -> Self {
        let module = Arc::new(module);
        Self {
            name: Arc::from(name),
            instance: Arc::clone(&module) as Arc<dyn FeatureModule>,
            any: module,
        }
    }

    /// Name the module was loaded under.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The module's capability surface.
    #[must_use]
    pub fn instance(&self) -> &dyn FeatureModule {
        self.instance.as_ref()
    }

    /// The concrete module, if it is a `T`.
    #[must_use]
    pub fn downcast<T: FeatureModule>(&self) -> Option<Arc<T>> {
        Arc::clone(&self.any).downcast::<T>().ok()
    }

    /// Returns `true` if both handles refer to the same instance.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        std::ptr::eq(
            Arc::as_ptr(&self.any).cast::<u8>(),
            Arc::as_ptr(&other.any).cast::<u8>(),
        )
    }
}

impl fmt::Debug for LoadedModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedModule")
            .field("name", &self.name)
            .field("teardown", &self.instance.as_teardown().is_some())
            .field("notifier", &self.instance.as_notifier().is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Plain(u32);
    impl FeatureModule for Plain {}

    struct Other;
    impl FeatureModule for Other {}

    #[test]
    fn downcast_to_concrete_type() {
        let module = LoadedModule::new("plain", Plain(7));
        assert_eq!(module.downcast::<Plain>().map(|p| p.0), Some(7));
        assert!(module.downcast::<Other>().is_none());
        assert_eq!(module.name(), "plain");
    }

    #[test]
    fn clones_share_identity() {
        let a = LoadedModule::new("plain", Plain(1));
        let b = a.clone();
        let c = LoadedModule::new("plain", Plain(1));
        assert!(a.ptr_eq(&b));
        assert!(!a.ptr_eq(&c));
    }

    #[test]
    fn capabilities_default_to_absent() {
        let module = LoadedModule::new("plain", Plain(1));
        assert!(module.instance().as_teardown().is_none());
        assert!(module.instance().as_notifier().is_none());
    }
}
