use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, WeaveError};

/// Top-level weave configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub log: LogConfig,
}

/// Execution engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Capacity of each run's event stream before backpressure applies.
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
    /// Default per-invocation deadline in milliseconds (none = unbounded).
    #[serde(default)]
    pub executor_timeout_ms: Option<u64>,
    /// Cap on simultaneously running invocations per run (none = no cap).
    #[serde(default)]
    pub max_concurrency: Option<usize>,
    /// Maximum characters in event input/output summaries.
    #[serde(default = "default_summary_chars")]
    pub summary_chars: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            event_buffer: default_event_buffer(),
            executor_timeout_ms: None,
            max_concurrency: None,
            summary_chars: default_summary_chars(),
        }
    }
}

impl EngineConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.executor_timeout_ms.map(Duration::from_millis)
    }
}

/// Logging configuration for the CLI subscriber.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

fn default_event_buffer() -> usize {
    256
}

fn default_summary_chars() -> usize {
    120
}

fn default_log_filter() -> String {
    "weave=info,warn".to_string()
}

impl AppConfig {
    /// Load config from a TOML file, with env var expansion.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|_| WeaveError::ConfigNotFound(path.display().to_string()))?;

        // Expand ${ENV_VAR} references
        let expanded = expand_env_vars(&content);

        let config: Self =
            toml::from_str(&expanded).map_err(|e| WeaveError::Config(e.to_string()))?;
        config.validate()?;
        debug!(path = %path.display(), "Loaded config");
        Ok(config)
    }

    /// Load from `path` if it exists, otherwise fall back to defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            debug!(path = %path.display(), "Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.engine.event_buffer == 0 {
            return Err(WeaveError::Config("engine.event_buffer must be at least 1".into()));
        }
        if self.engine.max_concurrency == Some(0) {
            return Err(WeaveError::Config("engine.max_concurrency must be at least 1".into()));
        }
        if self.engine.summary_chars == 0 {
            return Err(WeaveError::Config("engine.summary_chars must be at least 1".into()));
        }
        Ok(())
    }
}

/// Expand `${ENV_VAR}` patterns in a string.
fn expand_env_vars(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '$' && chars.peek() == Some(&'{') {
            chars.next(); // consume '{'
            let mut var_name = String::new();
            for c in chars.by_ref() {
                if c == '}' {
                    break;
                }
                var_name.push(c);
            }
            match std::env::var(&var_name) {
                Ok(val) => result.push_str(&val),
                Err(_) => {
                    // Keep original if env var not set
                    result.push_str(&format!("${{{}}}", var_name));
                }
            }
        } else {
            result.push(c);
        }
    }
    result
}
