//! Ready-made executors for common handler shapes.

pub mod agent;
pub mod func;

pub use agent::AgentExecutor;
pub use func::{forward, output, router, AsyncFnExecutor, FnExecutor};
