//! Mocks and fixtures shared by the weave test suites.

pub mod events;
pub mod executors;
pub mod fixtures;
pub mod mock_agent;

pub use events::{collect_events, event_names, events_for};
pub use executors::{Delay, EagerPanickingExecutor, FailingExecutor, PanickingExecutor};
pub use fixtures::write_config;
pub use mock_agent::MockAgent;
