use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use weave_core::error::{Result, RunFailed, WeaveError};
use weave_core::event::EventStream;
use weave_core::types::{Payload, RunId, RunPhase};

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunOutcome {
    Completed { output: Payload },
    Failed { failure: RunFailed },
    Cancelled,
}

impl RunOutcome {
    pub fn phase(&self) -> RunPhase {
        match self {
            Self::Completed { .. } => RunPhase::Completed,
            Self::Failed { .. } => RunPhase::Failed,
            Self::Cancelled => RunPhase::Cancelled,
        }
    }
}

/// Summary of a finished run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: RunId,
    pub outcome: RunOutcome,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Number of executor invocations dispatched.
    pub invocations: usize,
}

impl RunReport {
    pub fn is_completed(&self) -> bool {
        matches!(self.outcome, RunOutcome::Completed { .. })
    }

    pub fn elapsed_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }

    pub fn output(&self) -> Option<&Payload> {
        match &self.outcome {
            RunOutcome::Completed { output } => Some(output),
            _ => None,
        }
    }

    /// The output, or the failure as an error.
    pub fn into_result(self) -> Result<Payload> {
        match self.outcome {
            RunOutcome::Completed { output } => Ok(output),
            RunOutcome::Failed { failure } => Err(WeaveError::RunFailed(failure)),
            RunOutcome::Cancelled => Err(WeaveError::Cancelled),
        }
    }
}

/// Handle to a run in progress.
///
/// Dropping the handle detaches the run; it keeps going until it drains.
pub struct RunHandle {
    pub(crate) run_id: RunId,
    pub(crate) events: EventStream,
    pub(crate) phase: watch::Receiver<RunPhase>,
    pub(crate) cancel: CancellationToken,
    pub(crate) join: JoinHandle<RunReport>,
}

impl RunHandle {
    pub fn run_id(&self) -> &RunId {
        &self.run_id
    }

    pub fn phase(&self) -> RunPhase {
        *self.phase.borrow()
    }

    /// Resolves once the run reaches a terminal phase.
    pub async fn terminated(&mut self) -> RunPhase {
        let reached = self
            .phase
            .wait_for(RunPhase::is_terminal)
            .await
            .map(|phase| *phase);
        // Coordinator gone: report whatever it last published.
        reached.unwrap_or_else(|_| *self.phase.borrow())
    }

    pub fn events(&mut self) -> &mut EventStream {
        &mut self.events
    }

    /// Take the event stream and detach the run.
    pub fn into_events(self) -> EventStream {
        self.events
    }

    /// Request cancellation. In-flight executors observe it through their context.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Wait for the run to finish.
    ///
    /// Unread events are discarded so a full buffer cannot stall the run.
    pub async fn finish(self) -> Result<RunReport> {
        let Self { events, join, .. } = self;
        drop(events);
        join.await
            .map_err(|e| WeaveError::RunAborted(e.to_string()))
    }
}

impl std::fmt::Debug for RunHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunHandle")
            .field("run_id", &self.run_id)
            .field("phase", &self.phase())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use weave_core::error::ExecutionError;

    fn report(outcome: RunOutcome) -> RunReport {
        let now = Utc::now();
        RunReport {
            run_id: RunId::new(),
            outcome,
            started_at: now,
            finished_at: now,
            invocations: 0,
        }
    }

    #[test]
    fn test_into_result() {
        let ok = report(RunOutcome::Completed { output: json!(11) });
        assert!(ok.is_completed());
        assert_eq!(ok.output(), Some(&json!(11)));
        assert_eq!(ok.into_result().unwrap(), json!(11));

        let failed = report(RunOutcome::Failed {
            failure: RunFailed::at("V".into(), ExecutionError::executor("boom")),
        });
        assert_eq!(failed.outcome.phase(), RunPhase::Failed);
        assert!(matches!(failed.into_result(), Err(WeaveError::RunFailed(_))));

        let cancelled = report(RunOutcome::Cancelled);
        assert!(matches!(cancelled.into_result(), Err(WeaveError::Cancelled)));
    }

    #[test]
    fn test_outcome_serializes_with_status() {
        let json = serde_json::to_value(RunOutcome::Completed { output: json!("x") }).unwrap();
        assert_eq!(json["status"], "completed");
        assert_eq!(json["output"], "x");
    }
}
