//! Run execution.
//!
//! Every run gets its own coordinator task, event channel and
//! cancellation token. Runs over the same graph share nothing else.

mod fan_in;
mod handle;
mod invoke;
mod run;

pub use handle::{RunHandle, RunOutcome, RunReport};

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use weave_core::config::EngineConfig;
use weave_core::error::Result;
use weave_core::event::{event_channel, EventStream};
use weave_core::types::{Payload, RunId, RunPhase};

use crate::graph::WorkflowGraph;
use run::Coordinator;

/// Starts runs over workflow graphs.
#[derive(Debug, Clone, Default)]
pub struct Engine {
    config: EngineConfig,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Start a run and return immediately.
    ///
    /// Must be called from within a tokio runtime.
    pub fn run(&self, graph: &WorkflowGraph, input: impl Into<Payload>) -> RunHandle {
        let run_id = RunId::new();
        let (sink, events) = event_channel(self.config.event_buffer);
        let (phase_tx, phase_rx) = watch::channel(RunPhase::Ready);
        let cancel = CancellationToken::new();

        let coordinator = Coordinator::new(
            graph.clone(),
            self.config.clone(),
            run_id.clone(),
            sink,
            cancel.clone(),
            phase_tx,
        );
        let join = tokio::spawn(coordinator.run(input.into()));

        RunHandle {
            run_id,
            events,
            phase: phase_rx,
            cancel,
            join,
        }
    }

    /// Start a run and keep only its event stream.
    pub fn stream(&self, graph: &WorkflowGraph, input: impl Into<Payload>) -> EventStream {
        self.run(graph, input).into_events()
    }

    /// Run to the end and return the output.
    pub async fn run_to_completion(
        &self,
        graph: &WorkflowGraph,
        input: impl Into<Payload>,
    ) -> Result<Payload> {
        self.run(graph, input).finish().await?.into_result()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::executors::{forward, output, router, AsyncFnExecutor, FnExecutor};
    use crate::graph::WorkflowBuilder;
    use serde_json::json;
    use weave_core::error::{ErrorKind, WeaveError};
    use weave_core::types::{Outcome, WorkflowEvent};

    fn sequential() -> WorkflowGraph {
        WorkflowBuilder::new()
            .add_executor("A", forward(|p| Ok(json!(p.as_i64().unwrap_or(0) * 2))))
            .add_executor("B", output(|p| Ok(json!(p.as_i64().unwrap_or(0) + 1))))
            .set_start("A")
            .add_edge("A", "B")
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_sequential_event_order() {
        let engine = Engine::default();
        let mut handle = engine.run(&sequential(), 5);
        let mut names = Vec::new();
        while let Some(event) = handle.events().recv().await {
            names.push(format!(
                "{}:{}",
                event.name(),
                event.executor_id().map(|id| id.as_str()).unwrap_or("-")
            ));
        }
        assert_eq!(
            names,
            vec![
                "run_started:-",
                "executor_invoked:A",
                "executor_completed:A",
                "executor_invoked:B",
                "executor_completed:B",
                "output_produced:B",
            ]
        );

        let report = handle.finish().await.unwrap();
        assert_eq!(report.output(), Some(&json!(11)));
        assert_eq!(report.invocations, 2);
    }

    #[tokio::test]
    async fn test_phase_reaches_completed() {
        let mut handle = Engine::default().run(&sequential(), 1);
        assert_eq!(handle.terminated().await, RunPhase::Completed);
        assert_eq!(handle.phase(), RunPhase::Completed);
    }

    #[tokio::test]
    async fn test_no_output_fails_run() {
        let graph = WorkflowBuilder::new()
            .add_executor("A", FnExecutor::new(|_| Ok(Outcome::none())))
            .set_start("A")
            .build()
            .unwrap();
        let err = Engine::default().run_to_completion(&graph, 1).await.unwrap_err();
        match err {
            WeaveError::RunFailed(failure) => {
                assert_eq!(failure.kind(), ErrorKind::NoOutput);
                assert!(failure.executor_id.is_none());
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_duplicate_output_fails_run() {
        let graph = WorkflowBuilder::new()
            .add_executor("S", forward(Ok))
            .add_executor("X", output(Ok))
            .add_executor("Y", output(Ok))
            .set_start("S")
            .add_fan_out("S", ["X", "Y"])
            .build()
            .unwrap();
        let err = Engine::default().run_to_completion(&graph, "v").await.unwrap_err();
        match err {
            WeaveError::RunFailed(failure) => {
                assert_eq!(failure.kind(), ErrorKind::DuplicateOutput);
                assert!(failure.executor_id.is_some());
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_routing_error_reported_after_invoked() {
        let graph = WorkflowBuilder::new()
            .add_executor("R", router(|_| Ok("huge".to_string())))
            .add_executor("Big", output(Ok))
            .set_start("R")
            .add_conditional("R", [("big", "Big")])
            .build()
            .unwrap();

        let events = Engine::default().stream(&graph, 20).collect_all().await;
        let names: Vec<&str> = events.iter().map(|e| e.name()).collect();
        assert_eq!(
            names,
            vec!["run_started", "executor_invoked", "executor_failed", "run_failed"]
        );
        match &events[2] {
            WorkflowEvent::ExecutorFailed { error, .. } => assert_eq!(error.kind(), ErrorKind::Routing),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_executor_timeout() {
        let graph = WorkflowBuilder::new()
            .add_executor(
                "Slow",
                AsyncFnExecutor::new(|_input| async {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    Ok(Outcome::yield_output("late"))
                }),
            )
            .set_start("Slow")
            .build()
            .unwrap();
        let engine = Engine::new(EngineConfig {
            executor_timeout_ms: Some(20),
            ..EngineConfig::default()
        });
        let err = engine.run_to_completion(&graph, json!(null)).await.unwrap_err();
        assert!(matches!(err, WeaveError::RunFailed(ref f) if f.kind() == ErrorKind::Timeout));
    }

    #[tokio::test]
    async fn test_cancel_before_dispatch() {
        let handle = Engine::default().run(&sequential(), 1);
        handle.cancel();
        let report = handle.finish().await.unwrap();
        assert_eq!(report.outcome, RunOutcome::Cancelled);
    }

    #[tokio::test]
    async fn test_max_concurrency_one_still_completes() {
        let graph = WorkflowBuilder::new()
            .add_executor("S", forward(Ok))
            .add_executor("L", forward(Ok))
            .add_executor("R", forward(Ok))
            .add_executor(
                "J",
                FnExecutor::new(|input| Ok(Outcome::yield_output(json!(input.into_collected()?.len())))),
            )
            .set_start("S")
            .add_fan_out("S", ["L", "R"])
            .add_fan_in(["L", "R"], "J")
            .build()
            .unwrap();
        let engine = Engine::new(EngineConfig {
            max_concurrency: Some(1),
            ..EngineConfig::default()
        });
        assert_eq!(engine.run_to_completion(&graph, "x").await.unwrap(), json!(2));
    }

    #[tokio::test]
    async fn test_zero_concurrency_cap_still_dispatches() {
        let graph = WorkflowBuilder::new()
            .add_executor("Only", output(Ok))
            .set_start("Only")
            .build()
            .unwrap();
        let engine = Engine::new(EngineConfig {
            max_concurrency: Some(0),
            ..EngineConfig::default()
        });
        assert_eq!(engine.run_to_completion(&graph, "v").await.unwrap(), json!("v"));
    }
}
