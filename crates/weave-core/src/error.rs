use serde::Serialize;
use thiserror::Error;

use crate::types::ExecutorId;

#[derive(Debug, Error)]
pub enum WeaveError {
    // Build-time errors
    #[error("Graph validation failed: {0}")]
    GraphValidation(#[from] GraphValidationError),

    // Executor body errors
    #[error("Executor error: {0}")]
    Handler(String),

    #[error("Executor expected {expected} input")]
    InputMismatch { expected: &'static str },

    #[error("Agent request failed: {agent}: {message}")]
    Agent { agent: String, message: String },

    // Run errors
    #[error("{0}")]
    RunFailed(RunFailed),

    #[error("Run cancelled")]
    Cancelled,

    #[error("Run coordinator aborted: {0}")]
    RunAborted(String),

    // Config errors
    #[error("Config error: {0}")]
    Config(String),

    #[error("Config file not found: {0}")]
    ConfigNotFound(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl WeaveError {
    /// Shorthand for an error raised inside an executor body.
    pub fn handler(message: impl Into<String>) -> Self {
        Self::Handler(message.into())
    }
}

impl From<RunFailed> for WeaveError {
    fn from(failure: RunFailed) -> Self {
        Self::RunFailed(failure)
    }
}

pub type Result<T> = std::result::Result<T, WeaveError>;

/// Topology problems detected by `WorkflowBuilder::build`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphValidationError {
    #[error("no start executor set")]
    MissingStart,

    #[error("executor id registered twice: {0}")]
    DuplicateExecutor(ExecutorId),

    #[error("unknown executor '{id}' referenced by {context}")]
    UnknownExecutor { id: ExecutorId, context: String },

    #[error("fan-in edge into '{target}' declares no sources")]
    EmptyFanIn { target: ExecutorId },

    #[error("fan-out edge from '{from}' declares no targets")]
    EmptyFanOut { from: ExecutorId },

    #[error("conditional edge from '{from}' declares no routes")]
    EmptyConditional { from: ExecutorId },

    #[error("fan-in edge into '{target}' lists source '{from}' more than once")]
    DuplicateFanInSource { target: ExecutorId, from: ExecutorId },

    #[error("executor '{target}' is the target of more than one fan-in edge")]
    DuplicateFanIn { target: ExecutorId },

    #[error("conflicting outgoing routes on '{executor}': {reason}")]
    ConflictingRoutes { executor: ExecutorId, reason: String },

    #[error("executor '{executor}' is a fan-in target and cannot also take single inputs")]
    MixedArity { executor: ExecutorId },

    #[error("cycle without a conditional edge through: {}", join_ids(.executors))]
    UnconditionalCycle { executors: Vec<ExecutorId> },
}

fn join_ids(ids: &[ExecutorId]) -> String {
    ids.iter()
        .map(|id| id.as_str())
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Coarse classification of a run-time failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Executor,
    Routing,
    Timeout,
    DuplicateOutput,
    NoOutput,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Executor => "executor",
            Self::Routing => "routing",
            Self::Timeout => "timeout",
            Self::DuplicateOutput => "duplicate_output",
            Self::NoOutput => "no_output",
        };
        f.write_str(s)
    }
}

/// Errors raised while a run is in progress.
///
/// These travel inside `WorkflowEvent`s, so they are cloneable and
/// serializable rather than wrapping foreign error types.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExecutionError {
    #[error("executor error: {message}")]
    Executor { message: String },

    #[error("routing error: {message}")]
    Routing {
        label: Option<String>,
        message: String,
    },

    #[error("timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("run output was already produced by '{first}'")]
    DuplicateOutput { first: ExecutorId },

    #[error("run finished without producing an output")]
    NoOutput,
}

impl ExecutionError {
    pub fn executor(message: impl Into<String>) -> Self {
        Self::Executor {
            message: message.into(),
        }
    }

    pub fn routing(label: Option<&str>, message: impl Into<String>) -> Self {
        Self::Routing {
            label: label.map(str::to_string),
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Executor { .. } => ErrorKind::Executor,
            Self::Routing { .. } => ErrorKind::Routing,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::DuplicateOutput { .. } => ErrorKind::DuplicateOutput,
            Self::NoOutput => ErrorKind::NoOutput,
        }
    }
}

/// Terminal run failure: the originating error and the executor it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunFailed {
    pub executor_id: Option<ExecutorId>,
    pub error: ExecutionError,
}

impl RunFailed {
    pub fn at(executor_id: ExecutorId, error: ExecutionError) -> Self {
        Self {
            executor_id: Some(executor_id),
            error,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.error.kind()
    }
}

impl std::fmt::Display for RunFailed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.executor_id {
            Some(id) => write!(f, "Run failed at '{}': {}", id, self.error),
            None => write!(f, "Run failed: {}", self.error),
        }
    }
}

impl std::error::Error for RunFailed {}
