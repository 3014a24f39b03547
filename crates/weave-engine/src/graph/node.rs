use std::sync::Arc;
use std::time::Duration;

use weave_core::traits::Executor;
use weave_core::types::{ExecutorId, InputMode};

/// Per-executor settings that override the engine defaults.
#[derive(Debug, Clone, Default)]
pub struct ExecutorOptions {
    /// Invocation deadline for this executor only.
    pub timeout: Option<Duration>,
}

impl ExecutorOptions {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// A registered executor in a built graph.
///
/// The input mode is derived from the edges at build time: fan-in
/// targets receive collected input, everything else single payloads.
#[derive(Clone)]
pub struct ExecutorNode {
    pub id: ExecutorId,
    pub mode: InputMode,
    pub executor: Arc<dyn Executor>,
    pub options: ExecutorOptions,
}

impl ExecutorNode {
    /// Effective deadline: the executor's own, else the engine default.
    pub fn timeout(&self, default: Option<Duration>) -> Option<Duration> {
        self.options.timeout.or(default)
    }

    pub fn description(&self) -> Option<&str> {
        self.executor.description()
    }
}

impl std::fmt::Debug for ExecutorNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutorNode")
            .field("id", &self.id)
            .field("mode", &self.mode)
            .field("options", &self.options)
            .finish()
    }
}
