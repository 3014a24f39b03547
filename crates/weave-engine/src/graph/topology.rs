use serde::Serialize;

use weave_core::types::{ExecutorId, InputMode};

use super::edge::{Edge, EdgeKind};
use super::WorkflowGraph;

/// Read-only node/edge projection of a graph, for inspection and export.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Topology {
    pub start: ExecutorId,
    pub nodes: Vec<TopologyNode>,
    pub edges: Vec<TopologyEdge>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopologyNode {
    pub id: ExecutorId,
    pub input_mode: InputMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// One source-target pair. Conditional routes carry their label;
/// the default route has none.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopologyEdge {
    pub from: ExecutorId,
    pub to: ExecutorId,
    pub kind: EdgeKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl TopologyEdge {
    fn new(from: &ExecutorId, to: &ExecutorId, kind: EdgeKind, label: Option<&str>) -> Self {
        Self {
            from: from.clone(),
            to: to.clone(),
            kind,
            label: label.map(str::to_string),
        }
    }
}

impl Topology {
    pub(crate) fn of(graph: &WorkflowGraph) -> Self {
        let nodes = graph
            .executor_ids()
            .iter()
            .filter_map(|id| graph.node(id))
            .map(|node| TopologyNode {
                id: node.id.clone(),
                input_mode: node.mode,
                description: node.description().map(str::to_string),
            })
            .collect();

        let mut edges = Vec::new();
        for edge in graph.edges() {
            match edge {
                Edge::Direct { from, to } => {
                    edges.push(TopologyEdge::new(from, to, EdgeKind::Direct, None));
                }
                Edge::FanOut { from, to } => {
                    for target in to {
                        edges.push(TopologyEdge::new(from, target, EdgeKind::FanOut, None));
                    }
                }
                Edge::FanIn { from, to } => {
                    for source in from {
                        edges.push(TopologyEdge::new(source, to, EdgeKind::FanIn, None));
                    }
                }
                Edge::Conditional {
                    from,
                    routes,
                    default,
                } => {
                    for (label, target) in routes {
                        edges.push(TopologyEdge::new(
                            from,
                            target,
                            EdgeKind::Conditional,
                            Some(label),
                        ));
                    }
                    if let Some(target) = default {
                        edges.push(TopologyEdge::new(from, target, EdgeKind::Conditional, None));
                    }
                }
            }
        }

        Self {
            start: graph.start().clone(),
            nodes,
            edges,
        }
    }

    /// Edges leaving `id`.
    pub fn outgoing<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a TopologyEdge> + 'a {
        self.edges.iter().filter(move |e| e.from == id)
    }
}

#[cfg(test)]
mod tests {
    use crate::executors::{forward, FnExecutor};
    use crate::graph::WorkflowBuilder;
    use weave_core::types::Outcome;

    use super::*;

    #[test]
    fn test_projection() {
        let graph = WorkflowBuilder::new()
            .add_executor("S", forward(|p| Ok(p)).with_description("splitter"))
            .add_executor("L", FnExecutor::new(|_| Ok(Outcome::none())))
            .add_executor("R", FnExecutor::new(|_| Ok(Outcome::none())))
            .add_executor("J", FnExecutor::new(|_| Ok(Outcome::none())))
            .add_executor("Other", FnExecutor::new(|_| Ok(Outcome::none())))
            .set_start("S")
            .add_fan_out("S", ["L", "R"])
            .add_fan_in(["L", "R"], "J")
            .add_conditional_with_default("J", [("again", "S")], "Other")
            .build()
            .unwrap();

        let topo = graph.topology();
        assert_eq!(topo.start, "S");
        assert_eq!(topo.nodes.len(), 5);
        assert_eq!(topo.nodes[0].description.as_deref(), Some("splitter"));
        assert_eq!(topo.nodes[3].input_mode, InputMode::Collected);

        let kinds: Vec<EdgeKind> = topo.edges.iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![
                EdgeKind::FanOut,
                EdgeKind::FanOut,
                EdgeKind::FanIn,
                EdgeKind::FanIn,
                EdgeKind::Conditional,
                EdgeKind::Conditional,
            ]
        );

        let from_j: Vec<Option<&str>> = topo.outgoing("J").map(|e| e.label.as_deref()).collect();
        assert_eq!(from_j, vec![Some("again"), None]);

        let json = serde_json::to_value(&topo).unwrap();
        assert_eq!(json["edges"][0]["kind"], "fan_out");
        assert_eq!(json["nodes"][3]["input_mode"], "collected");
        assert!(json["edges"][0].get("label").is_none());
    }
}
