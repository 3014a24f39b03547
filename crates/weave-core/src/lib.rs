pub mod config;
pub mod context;
pub mod error;
pub mod event;
pub mod traits;
pub mod types;

pub use config::AppConfig;
pub use context::Context;
pub use error::{ExecutionError, GraphValidationError, Result, RunFailed, WeaveError};
pub use event::{event_channel, EventSink, EventStream};
pub use traits::{Agent, Executor};
pub use types::*;
