use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ExecutionError, Result, RunFailed, WeaveError};

/// The data carried along edges. Opaque to the engine.
pub type Payload = serde_json::Value;

/// Unique executor identifier within a graph.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExecutorId(String);

impl ExecutorId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ExecutorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ExecutorId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ExecutorId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&ExecutorId> for ExecutorId {
    fn from(id: &ExecutorId) -> Self {
        id.clone()
    }
}

impl PartialEq<str> for ExecutorId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for ExecutorId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// Unique run identifier.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(String);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// How an executor receives its input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputMode {
    /// One payload per invocation.
    Single,
    /// One ordered list per completed fan-in set.
    Collected,
}

/// Input handed to an executor invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    Single(Payload),
    /// Fan-in payloads in declared source order.
    Collected(Vec<Payload>),
}

impl Input {
    pub fn mode(&self) -> InputMode {
        match self {
            Self::Single(_) => InputMode::Single,
            Self::Collected(_) => InputMode::Collected,
        }
    }

    pub fn into_single(self) -> Result<Payload> {
        match self {
            Self::Single(payload) => Ok(payload),
            Self::Collected(_) => Err(WeaveError::InputMismatch { expected: "single" }),
        }
    }

    pub fn into_collected(self) -> Result<Vec<Payload>> {
        match self {
            Self::Collected(payloads) => Ok(payloads),
            Self::Single(_) => Err(WeaveError::InputMismatch {
                expected: "collected",
            }),
        }
    }

    pub fn as_single(&self) -> Option<&Payload> {
        match self {
            Self::Single(payload) => Some(payload),
            Self::Collected(_) => None,
        }
    }

    /// Short human-readable rendering for events.
    pub fn summary(&self, max_chars: usize) -> String {
        match self {
            Self::Single(payload) => summarize(payload, max_chars),
            Self::Collected(payloads) => {
                let parts: Vec<String> = payloads.iter().map(render).collect();
                truncate(&format!("[{}]", parts.join(", ")), max_chars)
            }
        }
    }
}

/// What one executor invocation produced.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Zero or more messages along the executor's outgoing edges.
    Forward(Vec<Payload>),
    /// Labeled messages along a conditional edge.
    Route(Vec<(String, Payload)>),
    /// Terminal output for the run.
    Yield(Payload),
}

impl Outcome {
    pub fn none() -> Self {
        Self::Forward(Vec::new())
    }

    pub fn forward(payload: impl Into<Payload>) -> Self {
        Self::Forward(vec![payload.into()])
    }

    pub fn route(label: impl Into<String>, payload: impl Into<Payload>) -> Self {
        Self::Route(vec![(label.into(), payload.into())])
    }

    pub fn yield_output(payload: impl Into<Payload>) -> Self {
        Self::Yield(payload.into())
    }

    pub fn summary(&self, max_chars: usize) -> String {
        match self {
            Self::Forward(payloads) if payloads.is_empty() => "(no messages)".to_string(),
            Self::Forward(payloads) => {
                let parts: Vec<String> = payloads.iter().map(render).collect();
                truncate(&parts.join(", "), max_chars)
            }
            Self::Route(routes) => {
                let parts: Vec<String> = routes
                    .iter()
                    .map(|(label, payload)| format!("{} => {}", label, render(payload)))
                    .collect();
                truncate(&parts.join(", "), max_chars)
            }
            Self::Yield(payload) => summarize(payload, max_chars),
        }
    }
}

/// A message in flight between executors.
#[derive(Debug, Clone)]
pub struct MessageEnvelope {
    pub payload: Payload,
    /// `None` for the seed message carrying the run input.
    pub source: Option<ExecutorId>,
    pub target: ExecutorId,
    pub run_id: RunId,
}

/// Lifecycle phase of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    Ready,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl RunPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

/// Event emitted on a run's event stream.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkflowEvent {
    /// Run accepted its input and began dispatching.
    RunStarted { run_id: RunId, start: ExecutorId },
    /// An executor invocation began.
    ExecutorInvoked {
        executor_id: ExecutorId,
        input_summary: String,
    },
    /// An executor invocation finished and its messages were routed.
    ExecutorCompleted {
        executor_id: ExecutorId,
        output_summary: String,
    },
    /// An executor invocation raised, timed out, or routed nowhere.
    ExecutorFailed {
        executor_id: ExecutorId,
        error: ExecutionError,
    },
    /// Custom event published by an executor body.
    ExecutorEvent {
        executor_id: ExecutorId,
        name: String,
        data: Payload,
    },
    /// The run's terminal output was committed.
    OutputProduced {
        executor_id: ExecutorId,
        payload: Payload,
    },
    /// Something the run tolerated but an observer should know about.
    Warning {
        executor_id: Option<ExecutorId>,
        message: String,
    },
    /// The run failed.
    RunFailed { failure: RunFailed },
    /// The run was cancelled.
    RunCancelled,
}

impl WorkflowEvent {
    /// Stable short name, used for logging and assertions.
    pub fn name(&self) -> &'static str {
        match self {
            Self::RunStarted { .. } => "run_started",
            Self::ExecutorInvoked { .. } => "executor_invoked",
            Self::ExecutorCompleted { .. } => "executor_completed",
            Self::ExecutorFailed { .. } => "executor_failed",
            Self::ExecutorEvent { .. } => "executor_event",
            Self::OutputProduced { .. } => "output_produced",
            Self::Warning { .. } => "warning",
            Self::RunFailed { .. } => "run_failed",
            Self::RunCancelled => "run_cancelled",
        }
    }

    pub fn executor_id(&self) -> Option<&ExecutorId> {
        match self {
            Self::ExecutorInvoked { executor_id, .. }
            | Self::ExecutorCompleted { executor_id, .. }
            | Self::ExecutorFailed { executor_id, .. }
            | Self::ExecutorEvent { executor_id, .. }
            | Self::OutputProduced { executor_id, .. } => Some(executor_id),
            Self::Warning { executor_id, .. } => executor_id.as_ref(),
            Self::RunFailed { failure } => failure.executor_id.as_ref(),
            Self::RunStarted { .. } | Self::RunCancelled => None,
        }
    }
}

/// Render a payload for an event summary, truncated to `max_chars`.
pub fn summarize(payload: &Payload, max_chars: usize) -> String {
    truncate(&render(payload), max_chars)
}

fn render(payload: &Payload) -> String {
    match payload {
        Payload::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}…", &text[..idx]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_summarize_strings_raw_and_values_as_json() {
        assert_eq!(summarize(&json!("hello"), 10), "hello");
        assert_eq!(summarize(&json!({"n": 1}), 20), r#"{"n":1}"#);
        assert_eq!(summarize(&json!(42), 10), "42");
    }

    #[test]
    fn test_summarize_truncates_on_char_boundary() {
        assert_eq!(summarize(&json!("ñandú salvaje"), 5), "ñandú…");
        assert_eq!(summarize(&json!("abc"), 3), "abc");
    }

    #[test]
    fn test_input_arity_accessors() {
        let single = Input::Single(json!(5));
        assert_eq!(single.mode(), InputMode::Single);
        assert_eq!(single.as_single(), Some(&json!(5)));
        assert!(matches!(
            single.clone().into_collected(),
            Err(WeaveError::InputMismatch { expected: "collected" })
        ));
        assert_eq!(single.into_single().unwrap(), json!(5));

        let many = Input::Collected(vec![json!("a"), json!("b")]);
        assert_eq!(many.summary(50), "[a, b]");
        assert!(many.clone().into_single().is_err());
        assert_eq!(many.into_collected().unwrap().len(), 2);
    }

    #[test]
    fn test_outcome_summary() {
        assert_eq!(Outcome::none().summary(20), "(no messages)");
        assert_eq!(Outcome::forward(json!(10)).summary(20), "10");
        assert_eq!(Outcome::route("big", json!(20)).summary(20), "big => 20");
        assert_eq!(Outcome::yield_output(json!("done")).summary(20), "done");
    }

    #[test]
    fn test_run_ids_unique() {
        assert_ne!(RunId::new(), RunId::new());
    }

    #[test]
    fn test_executor_id_comparisons() {
        let id = ExecutorId::from("A");
        assert_eq!(id, "A");
        assert_eq!(id.to_string(), "A");
        assert_eq!(ExecutorId::from(String::from("A")), id);
    }

    #[test]
    fn test_event_names_and_serialization() {
        let event = WorkflowEvent::ExecutorInvoked {
            executor_id: "A".into(),
            input_summary: "5".into(),
        };
        assert_eq!(event.name(), "executor_invoked");
        assert_eq!(event.executor_id().map(|id| id.as_str()), Some("A"));

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "executor_invoked");
        assert_eq!(json["executor_id"], "A");

        assert_eq!(WorkflowEvent::RunCancelled.name(), "run_cancelled");
        assert!(WorkflowEvent::RunCancelled.executor_id().is_none());
    }

    #[test]
    fn test_terminal_phases() {
        assert!(!RunPhase::Ready.is_terminal());
        assert!(!RunPhase::Running.is_terminal());
        assert!(RunPhase::Completed.is_terminal());
        assert!(RunPhase::Failed.is_terminal());
        assert!(RunPhase::Cancelled.is_terminal());
    }
}
