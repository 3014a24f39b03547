use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures::future::BoxFuture;

use weave_core::context::Context;
use weave_core::error::{Result, WeaveError};
use weave_core::traits::Executor;
use weave_core::types::Input;

/// Sleeps before delegating, to force a completion order between branches.
pub struct Delay<E> {
    inner: E,
    delay: Duration,
}

impl<E: Executor> Delay<E> {
    pub fn new(inner: E, delay: Duration) -> Self {
        Self { inner, delay }
    }

    pub fn millis(inner: E, ms: u64) -> Self {
        Self::new(inner, Duration::from_millis(ms))
    }
}

impl<E: Executor> Executor for Delay<E> {
    fn invoke<'a>(&'a self, input: Input, ctx: &'a mut Context) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            tokio::time::sleep(self.delay).await;
            self.inner.invoke(input, ctx).await
        })
    }

    fn description(&self) -> Option<&str> {
        self.inner.description()
    }
}

/// Always fails with a handler error. Counts its invocations.
pub struct FailingExecutor {
    message: String,
    calls: AtomicUsize,
}

impl FailingExecutor {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Executor for FailingExecutor {
    fn invoke<'a>(&'a self, _input: Input, _ctx: &'a mut Context) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(WeaveError::handler(self.message.clone()))
        })
    }
}

/// Panics inside its handler.
pub struct PanickingExecutor;

impl Executor for PanickingExecutor {
    fn invoke<'a>(&'a self, _input: Input, _ctx: &'a mut Context) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move { explode() })
    }
}

/// Panics while building its future, before anything is polled.
pub struct EagerPanickingExecutor;

impl Executor for EagerPanickingExecutor {
    fn invoke<'a>(&'a self, input: Input, _ctx: &'a mut Context) -> BoxFuture<'a, Result<()>> {
        let sizes: Vec<usize> = Vec::new();
        let first = sizes[input.summary(8).len()];
        Box::pin(async move {
            let _ = first;
            Ok(())
        })
    }
}

fn explode() -> Result<()> {
    panic!("executor panicked on purpose")
}
