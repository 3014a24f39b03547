use std::collections::{HashMap, HashSet};

use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::Dfs;
use serde::Serialize;

use weave_core::error::GraphValidationError;
use weave_core::types::ExecutorId;

use super::edge::Edge;

/// A topology issue that does not prevent the graph from running.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValidationWarning {
    /// Labels outside `labels` fail the run with a routing error.
    ConditionalWithoutDefault {
        executor: ExecutorId,
        labels: Vec<String>,
    },
    /// No path leads from the start executor to this one.
    Unreachable { executor: ExecutorId },
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ConditionalWithoutDefault { executor, labels } => write!(
                f,
                "conditional edge from '{}' has no default route; labels other than [{}] will fail the run",
                executor,
                labels.join(", ")
            ),
            Self::Unreachable { executor } => {
                write!(f, "executor '{}' is unreachable from the start", executor)
            }
        }
    }
}

/// Run every structural check in order and return the non-fatal warnings.
pub(crate) fn validate(
    ids: &[ExecutorId],
    start: Option<&ExecutorId>,
    edges: &[Edge],
) -> Result<Vec<ValidationWarning>, GraphValidationError> {
    let known = check_unique(ids)?;

    let start = start.ok_or(GraphValidationError::MissingStart)?;
    if !known.contains(start) {
        return Err(GraphValidationError::UnknownExecutor {
            id: start.clone(),
            context: "set_start".to_string(),
        });
    }

    for edge in edges {
        for id in edge.sources().into_iter().chain(edge.targets()) {
            if !known.contains(id) {
                return Err(GraphValidationError::UnknownExecutor {
                    id: id.clone(),
                    context: edge.describe(),
                });
            }
        }
    }

    check_non_empty(edges)?;
    check_fan_in(edges)?;
    check_conditionals(edges)?;
    check_arity(start, edges)?;
    check_cycles(ids, edges)?;

    Ok(collect_warnings(ids, start, edges))
}

fn check_unique(ids: &[ExecutorId]) -> Result<HashSet<&ExecutorId>, GraphValidationError> {
    let mut seen = HashSet::with_capacity(ids.len());
    for id in ids {
        if !seen.insert(id) {
            return Err(GraphValidationError::DuplicateExecutor(id.clone()));
        }
    }
    Ok(seen)
}

fn check_non_empty(edges: &[Edge]) -> Result<(), GraphValidationError> {
    for edge in edges {
        match edge {
            Edge::FanIn { from, to } if from.is_empty() => {
                return Err(GraphValidationError::EmptyFanIn { target: to.clone() });
            }
            Edge::FanOut { from, to } if to.is_empty() => {
                return Err(GraphValidationError::EmptyFanOut { from: from.clone() });
            }
            Edge::Conditional { from, routes, .. } if routes.is_empty() => {
                return Err(GraphValidationError::EmptyConditional { from: from.clone() });
            }
            _ => {}
        }
    }
    Ok(())
}

fn check_fan_in(edges: &[Edge]) -> Result<(), GraphValidationError> {
    let mut targets = HashSet::new();
    for edge in edges {
        if let Edge::FanIn { from, to } = edge {
            let mut seen = HashSet::new();
            for source in from {
                if !seen.insert(source) {
                    return Err(GraphValidationError::DuplicateFanInSource {
                        target: to.clone(),
                        from: source.clone(),
                    });
                }
            }
            if !targets.insert(to) {
                return Err(GraphValidationError::DuplicateFanIn { target: to.clone() });
            }
        }
    }
    Ok(())
}

/// A conditional executor routes only through its single conditional edge.
fn check_conditionals(edges: &[Edge]) -> Result<(), GraphValidationError> {
    let mut conditional = HashSet::new();
    for edge in edges {
        if let Edge::Conditional { from, .. } = edge {
            if !conditional.insert(from) {
                return Err(GraphValidationError::ConflictingRoutes {
                    executor: from.clone(),
                    reason: "more than one conditional edge".to_string(),
                });
            }
        }
    }

    for edge in edges {
        if edge.kind() == super::EdgeKind::Conditional {
            continue;
        }
        if let Some(source) = edge.sources().into_iter().find(|s| conditional.contains(s)) {
            return Err(GraphValidationError::ConflictingRoutes {
                executor: source.clone(),
                reason: format!("conditional edge combined with {}", edge.describe()),
            });
        }
    }
    Ok(())
}

fn check_arity(start: &ExecutorId, edges: &[Edge]) -> Result<(), GraphValidationError> {
    let fan_in_targets: HashSet<&ExecutorId> = edges
        .iter()
        .filter_map(|edge| match edge {
            Edge::FanIn { to, .. } => Some(to),
            _ => None,
        })
        .collect();

    if fan_in_targets.contains(start) {
        return Err(GraphValidationError::MixedArity {
            executor: start.clone(),
        });
    }

    for edge in edges {
        if matches!(edge, Edge::FanIn { .. }) {
            continue;
        }
        if let Some(target) = edge.targets().into_iter().find(|t| fan_in_targets.contains(t)) {
            return Err(GraphValidationError::MixedArity {
                executor: target.clone(),
            });
        }
    }
    Ok(())
}

/// Build a petgraph view of the edges, optionally leaving out conditional ones.
fn to_digraph<'a>(
    ids: &'a [ExecutorId],
    edges: &[Edge],
    include_conditional: bool,
) -> (DiGraph<usize, ()>, HashMap<&'a ExecutorId, NodeIndex>) {
    let mut graph = DiGraph::new();
    let mut indices = HashMap::new();
    for (pos, id) in ids.iter().enumerate() {
        indices.insert(id, graph.add_node(pos));
    }

    for edge in edges {
        if !include_conditional && edge.kind() == super::EdgeKind::Conditional {
            continue;
        }
        for from in edge.sources() {
            for to in edge.targets() {
                if let (Some(a), Some(b)) = (indices.get(from), indices.get(to)) {
                    graph.add_edge(*a, *b, ());
                }
            }
        }
    }
    (graph, indices)
}

/// Every cycle must pass through at least one conditional edge.
fn check_cycles(ids: &[ExecutorId], edges: &[Edge]) -> Result<(), GraphValidationError> {
    let (graph, _) = to_digraph(ids, edges, false);

    let mut cycles: Vec<Vec<usize>> = tarjan_scc(&graph)
        .into_iter()
        .filter(|scc| scc.len() > 1 || graph.contains_edge(scc[0], scc[0]))
        .map(|scc| {
            let mut members: Vec<usize> = scc.iter().map(|idx| graph[*idx]).collect();
            members.sort_unstable();
            members
        })
        .collect();
    cycles.sort();

    match cycles.into_iter().next() {
        Some(members) => Err(GraphValidationError::UnconditionalCycle {
            executors: members.into_iter().map(|pos| ids[pos].clone()).collect(),
        }),
        None => Ok(()),
    }
}

fn collect_warnings(ids: &[ExecutorId], start: &ExecutorId, edges: &[Edge]) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();

    for edge in edges {
        if let Edge::Conditional {
            from,
            routes,
            default: None,
        } = edge
        {
            warnings.push(ValidationWarning::ConditionalWithoutDefault {
                executor: from.clone(),
                labels: routes.keys().cloned().collect(),
            });
        }
    }

    let (graph, indices) = to_digraph(ids, edges, true);
    let mut reachable = HashSet::new();
    if let Some(root) = indices.get(start) {
        let mut dfs = Dfs::new(&graph, *root);
        while let Some(idx) = dfs.next(&graph) {
            reachable.insert(graph[idx]);
        }
    }
    for (pos, id) in ids.iter().enumerate() {
        if !reachable.contains(&pos) {
            warnings.push(ValidationWarning::Unreachable {
                executor: id.clone(),
            });
        }
    }

    warnings
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(names: &[&str]) -> Vec<ExecutorId> {
        names.iter().map(|n| ExecutorId::from(*n)).collect()
    }

    fn check(names: &[&str], start: &str, edges: &[Edge]) -> Result<Vec<ValidationWarning>, GraphValidationError> {
        validate(&ids(names), Some(&ExecutorId::from(start)), edges)
    }

    #[test]
    fn test_unknown_edge_endpoint() {
        let err = check(&["A"], "A", &[Edge::direct("A", "B")]).unwrap_err();
        assert_eq!(
            err,
            GraphValidationError::UnknownExecutor {
                id: "B".into(),
                context: "direct edge A -> B".into(),
            }
        );
    }

    #[test]
    fn test_empty_edge_sets() {
        let empty: [&str; 0] = [];
        assert_eq!(
            check(&["A"], "A", &[Edge::fan_in(empty, "A")]).unwrap_err(),
            GraphValidationError::EmptyFanIn { target: "A".into() }
        );
        assert_eq!(
            check(&["A"], "A", &[Edge::fan_out("A", empty)]).unwrap_err(),
            GraphValidationError::EmptyFanOut { from: "A".into() }
        );
        let no_routes: [(&str, &str); 0] = [];
        assert_eq!(
            check(&["A"], "A", &[Edge::conditional("A", no_routes)]).unwrap_err(),
            GraphValidationError::EmptyConditional { from: "A".into() }
        );
    }

    #[test]
    fn test_fan_in_rules() {
        let err = check(&["A", "B", "J"], "A", &[Edge::fan_in(["A", "A"], "J")]).unwrap_err();
        assert!(matches!(err, GraphValidationError::DuplicateFanInSource { .. }));

        let err = check(
            &["A", "B", "J"],
            "A",
            &[Edge::fan_in(["A", "B"], "J"), Edge::fan_in(["B"], "J")],
        )
        .unwrap_err();
        assert_eq!(err, GraphValidationError::DuplicateFanIn { target: "J".into() });
    }

    #[test]
    fn test_conditional_conflicts() {
        let err = check(
            &["R", "X", "Y"],
            "R",
            &[Edge::conditional("R", [("x", "X")]), Edge::direct("R", "Y")],
        )
        .unwrap_err();
        assert!(matches!(err, GraphValidationError::ConflictingRoutes { ref executor, .. } if executor == "R"));

        let err = check(
            &["R", "X", "Y"],
            "R",
            &[
                Edge::conditional("R", [("x", "X")]),
                Edge::conditional("R", [("y", "Y")]),
            ],
        )
        .unwrap_err();
        assert!(matches!(err, GraphValidationError::ConflictingRoutes { .. }));
    }

    #[test]
    fn test_mixed_arity() {
        let err = check(
            &["S", "L", "R", "J"],
            "S",
            &[
                Edge::fan_out("S", ["L", "R"]),
                Edge::fan_in(["L", "R"], "J"),
                Edge::direct("S", "J"),
            ],
        )
        .unwrap_err();
        assert_eq!(err, GraphValidationError::MixedArity { executor: "J".into() });

        let err = check(&["S", "J"], "J", &[Edge::fan_in(["S"], "J")]).unwrap_err();
        assert_eq!(err, GraphValidationError::MixedArity { executor: "J".into() });
    }

    #[test]
    fn test_unconditional_cycle_rejected() {
        let err = check(
            &["A", "B", "C"],
            "A",
            &[Edge::direct("A", "B"), Edge::direct("B", "C"), Edge::direct("C", "A")],
        )
        .unwrap_err();
        assert_eq!(
            err,
            GraphValidationError::UnconditionalCycle {
                executors: ids(&["A", "B", "C"]),
            }
        );

        let err = check(&["A"], "A", &[Edge::direct("A", "A")]).unwrap_err();
        assert!(matches!(err, GraphValidationError::UnconditionalCycle { .. }));
    }

    #[test]
    fn test_cycle_through_conditional_allowed() {
        let warnings = check(
            &["Attempt", "Check", "Done"],
            "Attempt",
            &[
                Edge::direct("Attempt", "Check"),
                Edge::conditional("Check", [("retry", "Attempt"), ("ok", "Done")]),
            ],
        )
        .unwrap();
        assert_eq!(warnings.len(), 1);
        assert!(matches!(warnings[0], ValidationWarning::ConditionalWithoutDefault { .. }));
    }

    #[test]
    fn test_unreachable_warning() {
        let warnings = check(&["A", "B", "C"], "A", &[Edge::direct("A", "B")]).unwrap();
        assert_eq!(
            warnings,
            vec![ValidationWarning::Unreachable { executor: "C".into() }]
        );
        assert_eq!(
            warnings[0].to_string(),
            "executor 'C' is unreachable from the start"
        );
    }

    #[test]
    fn test_default_route_silences_warning() {
        let warnings = check(
            &["R", "X", "Y"],
            "R",
            &[Edge::conditional("R", [("x", "X")]).with_default("Y")],
        )
        .unwrap();
        assert!(warnings.is_empty());
    }
}
