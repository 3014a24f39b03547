use std::future::Future;

use futures::future::BoxFuture;

use weave_core::context::Context;
use weave_core::error::Result;
use weave_core::traits::Executor;
use weave_core::types::{Input, Outcome, Payload};

type SyncFn = dyn Fn(Input) -> Result<Outcome> + Send + Sync;

/// Executor backed by a plain synchronous function.
pub struct FnExecutor {
    func: Box<SyncFn>,
    description: Option<String>,
}

impl FnExecutor {
    pub fn new<F>(func: F) -> Self
    where
        F: Fn(Input) -> Result<Outcome> + Send + Sync + 'static,
    {
        Self {
            func: Box::new(func),
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

impl Executor for FnExecutor {
    fn invoke<'a>(&'a self, input: Input, ctx: &'a mut Context) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let outcome = (self.func)(input)?;
            ctx.apply(outcome);
            Ok(())
        })
    }

    fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }
}

/// Transform a single payload and forward the result.
pub fn forward<F>(func: F) -> FnExecutor
where
    F: Fn(Payload) -> Result<Payload> + Send + Sync + 'static,
{
    FnExecutor::new(move |input| Ok(Outcome::forward(func(input.into_single()?)?)))
}

/// Transform a single payload and yield it as the run output.
pub fn output<F>(func: F) -> FnExecutor
where
    F: Fn(Payload) -> Result<Payload> + Send + Sync + 'static,
{
    FnExecutor::new(move |input| Ok(Outcome::yield_output(func(input.into_single()?)?)))
}

/// Pick a label for a single payload and route it unchanged.
pub fn router<F>(label: F) -> FnExecutor
where
    F: Fn(&Payload) -> Result<String> + Send + Sync + 'static,
{
    FnExecutor::new(move |input| {
        let payload = input.into_single()?;
        let chosen = label(&payload)?;
        Ok(Outcome::route(chosen, payload))
    })
}

/// Executor backed by an async closure.
pub struct AsyncFnExecutor<F> {
    func: F,
    description: Option<String>,
}

impl<F, Fut> AsyncFnExecutor<F>
where
    F: Fn(Input) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Outcome>> + Send + 'static,
{
    pub fn new(func: F) -> Self {
        Self {
            func,
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

impl<F, Fut> Executor for AsyncFnExecutor<F>
where
    F: Fn(Input) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Outcome>> + Send + 'static,
{
    fn invoke<'a>(&'a self, input: Input, ctx: &'a mut Context) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let outcome = (self.func)(input).await?;
            ctx.apply(outcome);
            Ok(())
        })
    }

    fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }
}
