//! Workflow graphs: executors connected by typed edges.
//!
//! A graph is assembled with `WorkflowBuilder`, validated once in
//! `build()`, and is immutable afterwards. Clones share the same
//! underlying state, so one graph can back any number of concurrent runs.

pub mod builder;
pub mod edge;
pub mod node;
pub(crate) mod routing;
pub mod topology;
pub(crate) mod validate;

use std::collections::HashMap;
use std::sync::Arc;

pub use builder::WorkflowBuilder;
pub use edge::{Edge, EdgeKind};
pub use node::{ExecutorNode, ExecutorOptions};
pub use routing::Delivery;
pub use topology::{Topology, TopologyEdge, TopologyNode};
pub use validate::ValidationWarning;

use weave_core::error::ExecutionError;
use weave_core::types::{ExecutorId, InputMode, Outcome};

pub(crate) struct GraphInner {
    pub(crate) start: ExecutorId,
    /// Executor ids in registration order.
    pub(crate) order: Vec<ExecutorId>,
    pub(crate) nodes: HashMap<ExecutorId, ExecutorNode>,
    pub(crate) edges: Vec<Edge>,
    pub(crate) routes: HashMap<ExecutorId, routing::Routes>,
    /// Fan-in target -> declared sources.
    pub(crate) fan_in: HashMap<ExecutorId, Vec<ExecutorId>>,
    pub(crate) warnings: Vec<ValidationWarning>,
}

/// A validated, immutable workflow graph.
#[derive(Clone)]
pub struct WorkflowGraph {
    pub(crate) inner: Arc<GraphInner>,
}

impl WorkflowGraph {
    pub fn builder() -> WorkflowBuilder {
        WorkflowBuilder::new()
    }

    pub fn start(&self) -> &ExecutorId {
        &self.inner.start
    }

    pub fn executor_ids(&self) -> &[ExecutorId] {
        &self.inner.order
    }

    pub fn contains(&self, id: &ExecutorId) -> bool {
        self.inner.nodes.contains_key(id)
    }

    pub fn node(&self, id: &ExecutorId) -> Option<&ExecutorNode> {
        self.inner.nodes.get(id)
    }

    pub fn input_mode(&self, id: &ExecutorId) -> Option<InputMode> {
        self.inner.nodes.get(id).map(|n| n.mode)
    }

    pub fn edges(&self) -> &[Edge] {
        &self.inner.edges
    }

    /// Declared sources of a fan-in target, in slot order.
    pub fn fan_in_sources(&self, target: &ExecutorId) -> Option<&[ExecutorId]> {
        self.inner.fan_in.get(target).map(Vec::as_slice)
    }

    /// True when `id` has no outgoing edge of any kind.
    pub fn is_sink(&self, id: &ExecutorId) -> bool {
        !self.inner.routes.contains_key(id)
    }

    pub fn warnings(&self) -> &[ValidationWarning] {
        &self.inner.warnings
    }

    pub fn topology(&self) -> Topology {
        Topology::of(self)
    }

    /// Route an invocation outcome from `from` along the graph's edges.
    pub fn resolve(&self, from: &ExecutorId, outcome: Outcome) -> Result<Vec<Delivery>, ExecutionError> {
        routing::resolve(self.inner.routes.get(from), from, outcome)
    }
}

impl std::fmt::Debug for WorkflowGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowGraph")
            .field("start", &self.inner.start)
            .field("executors", &self.inner.order)
            .field("edges", &self.inner.edges)
            .finish()
    }
}
