//! Panic isolation for user callbacks.
//!
//! Listener and subscriber callbacks run inside [`run_isolated`]: a panic is
//! caught, logged and reported back as `false`, so one faulty callback cannot
//! stop its siblings or unwind into the emitter.
//!
//! A thread-local depth counter records whether the current thread is inside an
//! isolated call. The global panic hook installed by the
//! [`ErrorHandler`](crate::errors::ErrorHandler) consults [`is_isolated`] so that
//! panics which are about to be caught here are not double-reported as
//! "uncaught".

use std::any::Any;
use std::cell::Cell;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::task::{Context, Poll};

thread_local! {
    static DEPTH: Cell<usize> = const { Cell::new(0) };
}

/// Marks the current thread as isolated until dropped.
///
/// Used by code that catches panics by other means (e.g. a future wrapped in
/// `catch_unwind`) so the panic hook does not report them twice.
#[must_use = "isolation ends when the guard is dropped"]
pub struct IsolationGuard(());

impl IsolationGuard {
    /// Enters an isolated section.
    pub fn enter() -> Self {
        DEPTH.with(|d| d.set(d.get() + 1));
        Self(())
    }
}

impl Drop for IsolationGuard {
    fn drop(&mut self) {
        DEPTH.with(|d| d.set(d.get().saturating_sub(1)));
    }
}

/// Returns `true` while the current thread is executing inside [`run_isolated`].
#[must_use]
pub fn is_isolated() -> bool {
    DEPTH.with(|d| d.get() > 0)
}

/// Runs `f`, catching any panic.
///
/// Returns `true` if `f` completed normally. A panic is logged at error level
/// with `label` (typically the event name or state key) and swallowed.
pub fn run_isolated<F: FnOnce()>(label: &str, f: F) -> bool {
    let _guard = IsolationGuard::enter();
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(()) => true,
        Err(payload) => {
            tracing::error!(
                target: "pageshell::isolation",
                label = %label,
                panic = %panic_message(payload.as_ref()),
                "callback panicked"
            );
            false
        }
    }
}

/// Future that polls its inner future inside an isolated section.
///
/// Pair it with `catch_unwind` so panics raised while polling are reported
/// once, by whoever catches them, and not by the panic hook as well.
pub struct Isolated<F>(Pin<Box<F>>);

impl<F: Future> Future for Isolated<F> {
    type Output = F::Output;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let _guard = IsolationGuard::enter();
        self.0.as_mut().poll(cx)
    }
}

/// Wraps `future` so every poll runs inside an isolated section.
pub fn isolated<F: Future>(future: F) -> Isolated<F> {
    Isolated(Box::pin(future))
}

/// Extracts a readable message from a panic payload.
#[must_use]
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(ToString::to_string)
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string())
}
