//! Ambient context propagated around work running on the worker pool.

/// Restores whatever a [`ThreadContextSetup::setup`] call installed
pub trait TearDownHandle: Send {
    fn tear_down(self: Box<Self>);
}

/// Installs ambient context (locale, security principal, ...) before pooled work runs
pub trait ThreadContextSetup: Send + Sync {
    fn setup(&self) -> Box<dyn TearDownHandle>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpThreadContextSetup;

struct NoOpTearDown;

impl TearDownHandle for NoOpTearDown {
    fn tear_down(self: Box<Self>) {}
}

impl ThreadContextSetup for NoOpThreadContextSetup {
    fn setup(&self) -> Box<dyn TearDownHandle> {
        Box::new(NoOpTearDown)
    }
}

/// Tears the context down when dropped, so every exit path of the wrapped
/// work (completion, error, panic, cancellation) runs the teardown once.
pub(crate) struct ThreadContextGuard {
    handle: Option<Box<dyn TearDownHandle>>,
}

impl ThreadContextGuard {
    pub(crate) fn enter(setup: &dyn ThreadContextSetup) -> Self {
        Self {
            handle: Some(setup.setup()),
        }
    }
}

impl Drop for ThreadContextGuard {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.tear_down();
        }
    }
}
