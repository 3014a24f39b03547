use std::collections::VecDeque;

use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use weave_core::config::EngineConfig;
use weave_core::error::{ExecutionError, RunFailed};
use weave_core::event::EventSink;
use weave_core::types::{
    ExecutorId, Input, MessageEnvelope, Payload, RunId, RunPhase, WorkflowEvent,
};

use super::fan_in::FanInTable;
use super::handle::{RunOutcome, RunReport};
use super::invoke::{Invocation, InvocationResult};
use crate::graph::{Delivery, WorkflowGraph};

/// Work ready to be dispatched.
#[derive(Debug)]
enum Ready {
    Message(MessageEnvelope),
    Collected {
        target: ExecutorId,
        payloads: Vec<Payload>,
    },
}

impl Ready {
    fn into_parts(self) -> (ExecutorId, Input) {
        match self {
            Self::Message(envelope) => (envelope.target, Input::Single(envelope.payload)),
            Self::Collected { target, payloads } => (target, Input::Collected(payloads)),
        }
    }
}

/// The run coordinator.
///
/// Owns all mutable run state. Invocations run as independent tasks and
/// hand their deliveries back here, so no state is shared between them.
pub(crate) struct Coordinator {
    graph: WorkflowGraph,
    config: EngineConfig,
    run_id: RunId,
    sink: EventSink,
    cancel: CancellationToken,
    phase: watch::Sender<RunPhase>,

    pending: VecDeque<Ready>,
    fan_in: FanInTable,
    in_flight: JoinSet<InvocationResult>,
    output: Option<(ExecutorId, Payload)>,
    failure: Option<RunFailed>,
    cancelled: bool,
    invocations: usize,
}

impl Coordinator {
    pub(crate) fn new(
        graph: WorkflowGraph,
        config: EngineConfig,
        run_id: RunId,
        sink: EventSink,
        cancel: CancellationToken,
        phase: watch::Sender<RunPhase>,
    ) -> Self {
        let fan_in = FanInTable::new(&graph);
        Self {
            graph,
            config,
            run_id,
            sink,
            cancel,
            phase,
            pending: VecDeque::new(),
            fan_in,
            in_flight: JoinSet::new(),
            output: None,
            failure: None,
            cancelled: false,
            invocations: 0,
        }
    }

    /// Drive the run from `input` to a terminal state.
    pub(crate) async fn run(mut self, input: Payload) -> RunReport {
        let started_at = Utc::now();
        let start = self.graph.start().clone();
        self.phase.send_replace(RunPhase::Running);

        info!(run_id = %self.run_id, start = %start, "Run started");
        self.sink
            .emit(WorkflowEvent::RunStarted {
                run_id: self.run_id.clone(),
                start: start.clone(),
            })
            .await;

        self.pending.push_back(Ready::Message(MessageEnvelope {
            payload: input,
            source: None,
            target: start,
            run_id: self.run_id.clone(),
        }));

        loop {
            if !self.cancelled && self.cancel.is_cancelled() {
                self.on_cancel();
            }
            self.dispatch_ready();

            if self.in_flight.is_empty() {
                break;
            }

            let cancel = self.cancel.clone();
            tokio::select! {
                _ = cancel.cancelled(), if !self.cancelled => self.on_cancel(),
                joined = self.in_flight.join_next() => match joined {
                    Some(Ok(result)) => self.on_result(result).await,
                    Some(Err(join_err)) => {
                        error!(run_id = %self.run_id, error = %join_err, "Invocation task aborted");
                        self.fail(None, ExecutionError::executor(join_err.to_string()));
                    }
                    None => {}
                },
            }
        }

        let outcome = self.settle().await;
        let phase = outcome.phase();
        self.phase.send_replace(phase);

        let report = RunReport {
            run_id: self.run_id.clone(),
            outcome,
            started_at,
            finished_at: Utc::now(),
            invocations: self.invocations,
        };
        info!(
            run_id = %self.run_id,
            phase = ?phase,
            invocations = report.invocations,
            elapsed_ms = report.elapsed_ms(),
            "Run finished"
        );
        report
    }

    fn stopping(&self) -> bool {
        self.cancelled || self.failure.is_some()
    }

    fn dispatch_ready(&mut self) {
        if self.stopping() {
            return;
        }
        let cap = self.config.max_concurrency.unwrap_or(usize::MAX).max(1);

        while self.in_flight.len() < cap {
            let Some(ready) = self.pending.pop_front() else {
                break;
            };
            let (target, input) = ready.into_parts();
            let Some(node) = self.graph.node(&target).cloned() else {
                // Deliveries are resolved against this graph, so targets always exist.
                warn!(run_id = %self.run_id, executor_id = %target, "Dropping message for unknown executor");
                continue;
            };

            debug!(
                run_id = %self.run_id,
                executor_id = %target,
                mode = ?input.mode(),
                in_flight = self.in_flight.len() + 1,
                "Dispatching invocation"
            );
            self.invocations += 1;
            self.in_flight.spawn(
                Invocation {
                    graph: self.graph.clone(),
                    node,
                    input,
                    run_id: self.run_id.clone(),
                    sink: self.sink.clone(),
                    cancel: self.cancel.clone(),
                    default_timeout: self.config.timeout(),
                    summary_chars: self.config.summary_chars,
                }
                .run(),
            );
        }
    }

    async fn on_result(&mut self, result: InvocationResult) {
        let InvocationResult {
            executor_id,
            result,
        } = result;

        let deliveries = match result {
            Ok(deliveries) => deliveries,
            Err(error) => {
                self.fail(Some(executor_id), error);
                return;
            }
        };

        if self.stopping() {
            debug!(
                run_id = %self.run_id,
                executor_id = %executor_id,
                discarded = deliveries.len(),
                "Discarding deliveries from draining invocation"
            );
            return;
        }

        for delivery in deliveries {
            match delivery {
                Delivery::To { target, payload } => {
                    self.pending.push_back(Ready::Message(MessageEnvelope {
                        payload,
                        source: Some(executor_id.clone()),
                        target,
                        run_id: self.run_id.clone(),
                    }));
                }
                Delivery::Collect {
                    target,
                    slot,
                    payload,
                } => {
                    if let Some(payloads) = self.fan_in.offer(&target, slot, payload) {
                        debug!(run_id = %self.run_id, target = %target, "Fan-in set complete");
                        self.pending.push_back(Ready::Collected { target, payloads });
                    }
                }
                Delivery::Output(payload) => {
                    if let Some((first, _)) = &self.output {
                        let first = first.clone();
                        self.fail(
                            Some(executor_id.clone()),
                            ExecutionError::DuplicateOutput { first },
                        );
                        return;
                    }
                    info!(run_id = %self.run_id, executor_id = %executor_id, "Output produced");
                    self.sink
                        .emit(WorkflowEvent::OutputProduced {
                            executor_id: executor_id.clone(),
                            payload: payload.clone(),
                        })
                        .await;
                    self.output = Some((executor_id.clone(), payload));
                }
            }
        }
    }

    /// Record the first failure and stop dispatching.
    fn fail(&mut self, executor_id: Option<ExecutorId>, error: ExecutionError) {
        if self.stopping() {
            debug!(run_id = %self.run_id, error = %error, "Ignoring failure while draining");
            return;
        }
        warn!(
            run_id = %self.run_id,
            executor_id = ?executor_id.as_ref().map(ExecutorId::as_str),
            error = %error,
            pending = self.pending.len(),
            in_flight = self.in_flight.len(),
            "Run failing, draining in-flight invocations"
        );
        self.pending.clear();
        self.failure = Some(RunFailed { executor_id, error });
    }

    fn on_cancel(&mut self) {
        info!(
            run_id = %self.run_id,
            pending = self.pending.len(),
            in_flight = self.in_flight.len(),
            "Run cancelled, draining in-flight invocations"
        );
        self.cancelled = true;
        self.pending.clear();
        self.fan_in.clear();
    }

    /// Emit the terminal events and decide the outcome.
    async fn settle(&mut self) -> RunOutcome {
        if let Some(failure) = self.failure.take() {
            return self.emit_failed(failure).await;
        }
        if self.cancelled {
            self.sink.emit(WorkflowEvent::RunCancelled).await;
            return RunOutcome::Cancelled;
        }

        for (target, buffered) in self.fan_in.leftovers() {
            warn!(
                run_id = %self.run_id,
                executor_id = %target,
                buffered,
                "Run ended with an incomplete fan-in set"
            );
            self.sink
                .emit(WorkflowEvent::Warning {
                    executor_id: Some(target.clone()),
                    message: format!(
                        "fan-in into '{}' never completed; {} buffered payload(s) discarded",
                        target, buffered
                    ),
                })
                .await;
        }

        match self.output.take() {
            Some((_, output)) => RunOutcome::Completed { output },
            None => {
                self.emit_failed(RunFailed {
                    executor_id: None,
                    error: ExecutionError::NoOutput,
                })
                .await
            }
        }
    }

    async fn emit_failed(&self, failure: RunFailed) -> RunOutcome {
        error!(run_id = %self.run_id, error = %failure, "Run failed");
        self.sink
            .emit(WorkflowEvent::RunFailed {
                failure: failure.clone(),
            })
            .await;
        RunOutcome::Failed { failure }
    }
}
