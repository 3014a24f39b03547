pub mod engine;
pub mod executors;
pub mod graph;

pub use engine::{Engine, RunHandle, RunOutcome, RunReport};
pub use executors::{forward, output, router, AgentExecutor, AsyncFnExecutor, FnExecutor};
pub use graph::{
    Delivery, Edge, EdgeKind, ExecutorOptions, Topology, ValidationWarning, WorkflowBuilder,
    WorkflowGraph,
};

use weave_core::error::Result;
use weave_core::event::EventStream;
use weave_core::types::Payload;

/// Start a run with the default engine configuration.
pub fn run(graph: &WorkflowGraph, input: impl Into<Payload>) -> RunHandle {
    Engine::default().run(graph, input)
}

/// Run with the default configuration and return the output.
pub async fn run_to_completion(graph: &WorkflowGraph, input: impl Into<Payload>) -> Result<Payload> {
    Engine::default().run_to_completion(graph, input).await
}

/// Start a run with the default configuration and return only its events.
pub fn stream(graph: &WorkflowGraph, input: impl Into<Payload>) -> EventStream {
    Engine::default().stream(graph, input)
}
