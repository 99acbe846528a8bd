//! Page-level hooks and the context they receive.

use super::shell::Shell;
use crate::domain::error::Result;
use crate::errors::ErrorHandler;
use crate::events::EventBus;
use crate::modules::{LoadedModule, ModuleContext};
use crate::state::StateManager;
use futures_util::future::BoxFuture;
use std::sync::Arc;

/// Runs once, synchronously, before anything else in `init` (locale and
/// content setup belong here). A failure aborts boot.
pub type PreInitHook = Arc<dyn Fn(&ModuleContext) -> Result<()> + Send + Sync>;

/// Registers UI component definitions during `init`. A failure aborts boot.
pub type ComponentRegistrar =
    Arc<dyn Fn(ModuleContext) -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// Page-specific setup, run last in `init`. A failure is routed through the
/// error handler and does not abort boot.
pub type PageInitializer = Arc<dyn Fn(PageContext) -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// What a page initializer gets to work with.
#[derive(Clone, Debug)]
pub struct PageContext {
    page: String,
    shell: Shell,
}

impl PageContext {
    pub(crate) fn new(page: &str, shell: Shell) -> Self {
        Self {
            page: page.to_string(),
            shell,
        }
    }

    /// Identity of the page being initialized.
    #[must_use]
    pub fn page(&self) -> &str {
        &self.page
    }

    /// The shell running this page.
    #[must_use]
    pub fn shell(&self) -> &Shell {
        &self.shell
    }

    /// Shared event bus.
    #[must_use]
    pub fn bus(&self) -> &EventBus {
        self.shell.bus()
    }

    /// Shared state store.
    #[must_use]
    pub fn state(&self) -> &StateManager {
        self.shell.state()
    }

    /// Shared error funnel.
    #[must_use]
    pub fn errors(&self) -> &ErrorHandler {
        self.shell.errors()
    }

    /// Loads a module through the shell (failures are routed and returned).
    ///
    /// # Errors
    ///
    /// See [`Shell::load_module`].
    pub async fn load_module(&self, name: &str) -> Result<LoadedModule> {
        self.shell.load_module(name).await
    }
}
