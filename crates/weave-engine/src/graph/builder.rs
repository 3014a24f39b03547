use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use weave_core::error::GraphValidationError;
use weave_core::traits::Executor;
use weave_core::types::{ExecutorId, InputMode};

use super::edge::Edge;
use super::node::{ExecutorNode, ExecutorOptions};
use super::{routing, validate};
use super::{GraphInner, WorkflowGraph};

/// Fluent construction of a `WorkflowGraph`.
///
/// Nothing is checked until `build()`, which either returns a complete,
/// immutable graph or the first validation error.
#[derive(Default)]
pub struct WorkflowBuilder {
    executors: Vec<(ExecutorId, Arc<dyn Executor>, ExecutorOptions)>,
    start: Option<ExecutorId>,
    edges: Vec<Edge>,
}

impl WorkflowBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an executor under `id`.
    pub fn add_executor(self, id: impl Into<ExecutorId>, executor: impl Executor) -> Self {
        self.add_executor_with(id, executor, ExecutorOptions::default())
    }

    /// Register an executor with per-executor options.
    pub fn add_executor_with(
        mut self,
        id: impl Into<ExecutorId>,
        executor: impl Executor,
        options: ExecutorOptions,
    ) -> Self {
        let executor: Arc<dyn Executor> = Arc::new(executor);
        self.executors.push((id.into(), executor, options));
        self
    }

    /// Register an already shared executor.
    pub fn add_shared_executor(mut self, id: impl Into<ExecutorId>, executor: Arc<dyn Executor>) -> Self {
        self.executors
            .push((id.into(), executor, ExecutorOptions::default()));
        self
    }

    pub fn set_start(mut self, id: impl Into<ExecutorId>) -> Self {
        self.start = Some(id.into());
        self
    }

    /// Direct edge `from -> to`.
    pub fn add_edge(mut self, from: impl Into<ExecutorId>, to: impl Into<ExecutorId>) -> Self {
        self.edges.push(Edge::direct(from, to));
        self
    }

    pub fn add_fan_out<I, T>(mut self, from: impl Into<ExecutorId>, to: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<ExecutorId>,
    {
        self.edges.push(Edge::fan_out(from, to));
        self
    }

    /// Fan-in edge. The target receives payloads in the order `from` lists them.
    pub fn add_fan_in<I, T>(mut self, from: I, to: impl Into<ExecutorId>) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<ExecutorId>,
    {
        self.edges.push(Edge::fan_in(from, to));
        self
    }

    pub fn add_conditional<I, L, T>(mut self, from: impl Into<ExecutorId>, routes: I) -> Self
    where
        I: IntoIterator<Item = (L, T)>,
        L: Into<String>,
        T: Into<ExecutorId>,
    {
        self.edges.push(Edge::conditional(from, routes));
        self
    }

    /// Conditional edge whose unmapped labels go to `default_to`.
    pub fn add_conditional_with_default<I, L, T>(
        mut self,
        from: impl Into<ExecutorId>,
        routes: I,
        default_to: impl Into<ExecutorId>,
    ) -> Self
    where
        I: IntoIterator<Item = (L, T)>,
        L: Into<String>,
        T: Into<ExecutorId>,
    {
        self.edges
            .push(Edge::conditional(from, routes).with_default(default_to));
        self
    }

    /// Add a prebuilt edge.
    pub fn add(mut self, edge: Edge) -> Self {
        self.edges.push(edge);
        self
    }

    /// Validate the topology and freeze it.
    pub fn build(self) -> Result<WorkflowGraph, GraphValidationError> {
        let ids: Vec<ExecutorId> = self.executors.iter().map(|(id, _, _)| id.clone()).collect();
        let warnings = validate::validate(&ids, self.start.as_ref(), &self.edges)?;
        let start = self.start.ok_or(GraphValidationError::MissingStart)?;

        let mut fan_in: HashMap<ExecutorId, Vec<ExecutorId>> = HashMap::new();
        for edge in &self.edges {
            if let Edge::FanIn { from, to } = edge {
                fan_in.insert(to.clone(), from.clone());
            }
        }

        let nodes: HashMap<ExecutorId, ExecutorNode> = self
            .executors
            .into_iter()
            .map(|(id, executor, options)| {
                let mode = if fan_in.contains_key(&id) {
                    InputMode::Collected
                } else {
                    InputMode::Single
                };
                let node = ExecutorNode {
                    id: id.clone(),
                    mode,
                    executor,
                    options,
                };
                (id, node)
            })
            .collect();

        for warning in &warnings {
            warn!(warning = %warning, "Workflow graph warning");
        }
        debug!(
            start = %start,
            executors = nodes.len(),
            edges = self.edges.len(),
            "Workflow graph built"
        );

        Ok(WorkflowGraph {
            inner: Arc::new(GraphInner {
                start,
                order: ids,
                nodes,
                routes: routing::index(&self.edges),
                edges: self.edges,
                fan_in,
                warnings,
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executors::FnExecutor;
    use crate::graph::ValidationWarning;
    use weave_core::types::Outcome;

    fn noop() -> FnExecutor {
        FnExecutor::new(|_| Ok(Outcome::none()))
    }

    #[test]
    fn test_build_sequential() {
        let graph = WorkflowBuilder::new()
            .add_executor("A", noop())
            .add_executor("B", noop())
            .set_start("A")
            .add_edge("A", "B")
            .build()
            .unwrap();
        assert_eq!(graph.start(), "A");
        assert_eq!(graph.executor_ids().len(), 2);
        assert_eq!(graph.input_mode(&"B".into()), Some(InputMode::Single));
        assert!(graph.warnings().is_empty());
    }

    #[test]
    fn test_missing_start() {
        let err = WorkflowBuilder::new()
            .add_executor("A", noop())
            .build()
            .unwrap_err();
        assert_eq!(err, GraphValidationError::MissingStart);
    }

    #[test]
    fn test_unknown_start() {
        let err = WorkflowBuilder::new()
            .add_executor("A", noop())
            .set_start("Z")
            .build()
            .unwrap_err();
        assert!(matches!(err, GraphValidationError::UnknownExecutor { ref id, .. } if id == "Z"));
    }

    #[test]
    fn test_duplicate_executor() {
        let err = WorkflowBuilder::new()
            .add_executor("A", noop())
            .add_executor("A", noop())
            .set_start("A")
            .build()
            .unwrap_err();
        assert_eq!(err, GraphValidationError::DuplicateExecutor("A".into()));
    }

    #[test]
    fn test_fan_in_target_is_collected() {
        let graph = WorkflowBuilder::new()
            .add_executor("S", noop())
            .add_executor("L", noop())
            .add_executor("R", noop())
            .add_executor("J", noop())
            .set_start("S")
            .add_fan_out("S", ["L", "R"])
            .add_fan_in(["L", "R"], "J")
            .build()
            .unwrap();
        assert_eq!(graph.input_mode(&"J".into()), Some(InputMode::Collected));
        let expected: Vec<ExecutorId> = vec!["L".into(), "R".into()];
        assert_eq!(graph.fan_in_sources(&"J".into()), Some(expected.as_slice()));
    }

    #[test]
    fn test_conditional_without_default_warns() {
        let graph = WorkflowBuilder::new()
            .add_executor("Router", noop())
            .add_executor("Big", noop())
            .add_executor("Small", noop())
            .set_start("Router")
            .add_conditional("Router", [("big", "Big"), ("small", "Small")])
            .build()
            .unwrap();
        assert_eq!(
            graph.warnings(),
            &[ValidationWarning::ConditionalWithoutDefault {
                executor: "Router".into(),
                labels: vec!["big".into(), "small".into()],
            }]
        );
    }

    #[test]
    fn test_graph_clones_share_state() {
        let graph = WorkflowBuilder::new()
            .add_executor("A", noop())
            .set_start("A")
            .build()
            .unwrap();
        let other = graph.clone();
        assert!(Arc::ptr_eq(&graph.inner, &other.inner));
    }
}
