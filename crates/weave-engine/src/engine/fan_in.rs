use std::collections::{HashMap, VecDeque};

use tracing::debug;

use weave_core::types::{ExecutorId, Payload};

use crate::graph::WorkflowGraph;

/// Pending fan-in inputs for one run.
///
/// Each target has one FIFO per declared source. A target fires when
/// every FIFO holds at least one payload, taking the head of each in
/// declared order. Extra arrivals from the same source wait for the
/// next firing.
#[derive(Debug, Default)]
pub(crate) struct FanInTable {
    slots: HashMap<ExecutorId, Vec<VecDeque<Payload>>>,
}

impl FanInTable {
    pub(crate) fn new(graph: &WorkflowGraph) -> Self {
        let slots = graph
            .executor_ids()
            .iter()
            .filter_map(|id| {
                graph
                    .fan_in_sources(id)
                    .map(|sources| (id.clone(), vec![VecDeque::new(); sources.len()]))
            })
            .collect();
        Self { slots }
    }

    /// Buffer `payload` in `slot` of `target`. Returns the collected
    /// inputs when this arrival completes a set.
    pub(crate) fn offer(
        &mut self,
        target: &ExecutorId,
        slot: usize,
        payload: Payload,
    ) -> Option<Vec<Payload>> {
        let queues = self.slots.get_mut(target)?;
        queues.get_mut(slot)?.push_back(payload);

        if queues.iter().any(VecDeque::is_empty) {
            debug!(
                target = %target,
                slot,
                filled = queues.iter().filter(|q| !q.is_empty()).count(),
                expected = queues.len(),
                "Fan-in slot filled"
            );
            return None;
        }

        queues.iter_mut().map(VecDeque::pop_front).collect()
    }

    pub(crate) fn clear(&mut self) {
        for queues in self.slots.values_mut() {
            queues.iter_mut().for_each(VecDeque::clear);
        }
    }

    /// Targets with buffered payloads that never formed a complete set,
    /// with the number of payloads left behind.
    pub(crate) fn leftovers(&self) -> Vec<(ExecutorId, usize)> {
        let mut left: Vec<(ExecutorId, usize)> = self
            .slots
            .iter()
            .map(|(target, queues)| (target.clone(), queues.iter().map(VecDeque::len).sum()))
            .filter(|(_, buffered)| *buffered > 0)
            .collect();
        left.sort();
        left
    }
}
