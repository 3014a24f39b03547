use std::collections::{BTreeMap, HashMap};

use weave_core::error::ExecutionError;
use weave_core::types::{ExecutorId, Outcome, Payload};

use super::edge::Edge;

/// Where one produced message goes.
#[derive(Debug, Clone, PartialEq)]
pub enum Delivery {
    /// Invoke `target` with a single payload.
    To { target: ExecutorId, payload: Payload },
    /// Fill slot `slot` of `target`'s fan-in set.
    Collect {
        target: ExecutorId,
        slot: usize,
        payload: Payload,
    },
    /// Commit the run output.
    Output(Payload),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Hop {
    Single(ExecutorId),
    Collect { target: ExecutorId, slot: usize },
}

/// Outgoing routes of one executor.
#[derive(Debug, Clone)]
pub(crate) enum Routes {
    Unlabeled(Vec<Hop>),
    Labeled {
        routes: BTreeMap<String, ExecutorId>,
        default: Option<ExecutorId>,
    },
}

/// Index the edges by source executor, in declaration order.
pub(crate) fn index(edges: &[Edge]) -> HashMap<ExecutorId, Routes> {
    let mut table: HashMap<ExecutorId, Routes> = HashMap::new();

    for edge in edges {
        match edge {
            Edge::Conditional {
                from,
                routes,
                default,
            } => {
                table.insert(
                    from.clone(),
                    Routes::Labeled {
                        routes: routes.clone(),
                        default: default.clone(),
                    },
                );
            }
            Edge::Direct { from, to } => push_hop(&mut table, from, Hop::Single(to.clone())),
            Edge::FanOut { from, to } => {
                for target in to {
                    push_hop(&mut table, from, Hop::Single(target.clone()));
                }
            }
            Edge::FanIn { from, to } => {
                for (slot, source) in from.iter().enumerate() {
                    push_hop(
                        &mut table,
                        source,
                        Hop::Collect {
                            target: to.clone(),
                            slot,
                        },
                    );
                }
            }
        }
    }
    table
}

fn push_hop(table: &mut HashMap<ExecutorId, Routes>, from: &ExecutorId, hop: Hop) {
    let entry = table
        .entry(from.clone())
        .or_insert_with(|| Routes::Unlabeled(Vec::new()));
    // Validation rejects conditional executors with other edges.
    if let Routes::Unlabeled(hops) = entry {
        hops.push(hop);
    }
}

/// Turn an invocation outcome into deliveries.
///
/// Unlabeled sends from an executor without outgoing edges resolve to
/// nothing; the caller decides how to report the drop.
pub(crate) fn resolve(
    routes: Option<&Routes>,
    from: &ExecutorId,
    outcome: Outcome,
) -> Result<Vec<Delivery>, ExecutionError> {
    match outcome {
        Outcome::Yield(payload) => Ok(vec![Delivery::Output(payload)]),

        Outcome::Forward(payloads) => match routes {
            _ if payloads.is_empty() => Ok(Vec::new()),
            None => Ok(Vec::new()),
            Some(Routes::Labeled { .. }) => Err(ExecutionError::routing(
                None,
                format!("'{}' routes conditionally and must send with a label", from),
            )),
            Some(Routes::Unlabeled(hops)) => {
                let mut deliveries = Vec::with_capacity(payloads.len() * hops.len());
                for payload in payloads {
                    for hop in hops {
                        deliveries.push(match hop {
                            Hop::Single(target) => Delivery::To {
                                target: target.clone(),
                                payload: payload.clone(),
                            },
                            Hop::Collect { target, slot } => Delivery::Collect {
                                target: target.clone(),
                                slot: *slot,
                                payload: payload.clone(),
                            },
                        });
                    }
                }
                Ok(deliveries)
            }
        },

        Outcome::Route(labeled) => {
            let (table, default) = match routes {
                Some(Routes::Labeled { routes, default }) => (routes, default),
                _ => {
                    let label = labeled.first().map(|(label, _)| label.as_str());
                    return Err(ExecutionError::routing(
                        label,
                        format!("'{}' has no conditional edge to route labels through", from),
                    ));
                }
            };

            labeled
                .into_iter()
                .map(|(label, payload)| {
                    match table.get(&label).or(default.as_ref()) {
                        Some(target) => Ok(Delivery::To {
                            target: target.clone(),
                            payload,
                        }),
                        None => Err(ExecutionError::routing(
                            Some(label.as_str()),
                            format!("no route for label '{}' from '{}'", label, from),
                        )),
                    }
                })
                .collect()
        }
    }
}
