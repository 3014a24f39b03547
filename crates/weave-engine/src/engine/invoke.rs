use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::{Duration, Instant};

use futures::FutureExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use weave_core::context::Context;
use weave_core::error::{ExecutionError, WeaveError};
use weave_core::event::EventSink;
use weave_core::types::{ExecutorId, Input, Outcome, RunId, WorkflowEvent};

use crate::graph::{Delivery, ExecutorNode, WorkflowGraph};

/// Everything one invocation task needs. Owned, so the task is `'static`.
pub(crate) struct Invocation {
    pub graph: WorkflowGraph,
    pub node: ExecutorNode,
    pub input: Input,
    pub run_id: RunId,
    pub sink: EventSink,
    pub cancel: CancellationToken,
    pub default_timeout: Option<Duration>,
    pub summary_chars: usize,
}

/// What an invocation reports back to the coordinator.
#[derive(Debug)]
pub(crate) struct InvocationResult {
    pub executor_id: ExecutorId,
    pub result: Result<Vec<Delivery>, ExecutionError>,
}

impl Invocation {
    /// Run the handler and route its outcome.
    ///
    /// Emits `ExecutorInvoked` first and exactly one of `ExecutorCompleted`
    /// or `ExecutorFailed` last.
    pub(crate) async fn run(self) -> InvocationResult {
        let Invocation {
            graph,
            node,
            input,
            run_id,
            sink,
            cancel,
            default_timeout,
            summary_chars,
        } = self;
        let id = node.id.clone();

        sink.emit(WorkflowEvent::ExecutorInvoked {
            executor_id: id.clone(),
            input_summary: input.summary(summary_chars),
        })
        .await;
        debug!(run_id = %run_id, executor_id = %id, "Executor invoked");

        let started = Instant::now();
        let mut ctx = Context::new(run_id.clone(), id.clone(), sink.clone(), cancel);
        let limit = node.timeout(default_timeout);

        let handled = {
            // Guards both building the future and polling it.
            let executor = &node.executor;
            let ctx_ref = &mut ctx;
            match std::panic::catch_unwind(AssertUnwindSafe(move || executor.invoke(input, ctx_ref))) {
                Err(panic) => Some(Err(panic)),
                Ok(future) => {
                    let handler = AssertUnwindSafe(future).catch_unwind();
                    match limit {
                        Some(limit) => tokio::time::timeout(limit, handler).await.ok(),
                        None => Some(handler.await),
                    }
                }
            }
        };

        let outcome = match handled {
            None => Err(ExecutionError::Timeout {
                timeout_ms: limit.map(|l| l.as_millis() as u64).unwrap_or_default(),
            }),
            Some(Err(panic)) => Err(ExecutionError::executor(format!(
                "handler panicked: {}",
                panic_message(panic.as_ref())
            ))),
            Some(Ok(Err(e))) => Err(ExecutionError::executor(handler_message(e))),
            Some(Ok(Ok(()))) => ctx.into_outcome(),
        };

        let routed = outcome.and_then(|outcome| {
            let summary = outcome.summary(summary_chars);
            let dropped = match &outcome {
                Outcome::Forward(payloads) if graph.is_sink(&id) => payloads.len(),
                _ => 0,
            };
            graph
                .resolve(&id, outcome)
                .map(|deliveries| (deliveries, summary, dropped))
        });
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match routed {
            Ok((deliveries, output_summary, dropped)) => {
                if dropped > 0 {
                    warn!(
                        run_id = %run_id,
                        executor_id = %id,
                        dropped,
                        "Executor sent messages but has no outgoing edges"
                    );
                    sink.emit(WorkflowEvent::Warning {
                        executor_id: Some(id.clone()),
                        message: format!(
                            "dropped {} message(s): '{}' has no outgoing edges",
                            dropped, id
                        ),
                    })
                    .await;
                }
                debug!(
                    run_id = %run_id,
                    executor_id = %id,
                    deliveries = deliveries.len(),
                    elapsed_ms,
                    "Executor completed"
                );
                sink.emit(WorkflowEvent::ExecutorCompleted {
                    executor_id: id.clone(),
                    output_summary,
                })
                .await;
                InvocationResult {
                    executor_id: id,
                    result: Ok(deliveries),
                }
            }
            Err(err) => {
                error!(
                    run_id = %run_id,
                    executor_id = %id,
                    kind = %err.kind(),
                    error = %err,
                    elapsed_ms,
                    "Executor failed"
                );
                sink.emit(WorkflowEvent::ExecutorFailed {
                    executor_id: id.clone(),
                    error: err.clone(),
                })
                .await;
                InvocationResult {
                    executor_id: id,
                    result: Err(err),
                }
            }
        }
    }
}

/// Handler errors carry their own message; anything else is rendered whole.
fn handler_message(err: WeaveError) -> String {
    match err {
        WeaveError::Handler(message) => message,
        other => other.to_string(),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
