use futures::future::BoxFuture;

use crate::context::Context;
use crate::error::Result;
use crate::types::Input;

/// A named unit of work in a workflow graph.
///
/// The handler reports what it produced through the `Context`:
/// forward with `send`, route with `send_to`, or finish with
/// `yield_output`. Returning an error fails the invocation.
pub trait Executor: Send + Sync + 'static {
    fn invoke<'a>(&'a self, input: Input, ctx: &'a mut Context) -> BoxFuture<'a, Result<()>>;

    /// Human-readable description, shown in topology exports.
    fn description(&self) -> Option<&str> {
        None
    }
}

/// Boundary to an external reasoning service.
///
/// Executors receive agents through their constructors; the engine
/// never talks to one directly.
pub trait Agent: Send + Sync + 'static {
    /// Agent name, used in events and error messages.
    fn name(&self) -> &str;

    /// Send a prompt and receive the response text.
    fn run(&self, prompt: String) -> BoxFuture<'_, Result<String>>;
}
