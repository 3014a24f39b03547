use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::json;
use tracing::debug;

use weave_core::context::Context;
use weave_core::error::{Result, WeaveError};
use weave_core::traits::{Agent, Executor};
use weave_core::types::{Input, Payload};

/// Placeholder replaced by the rendered input in prompt templates.
pub const INPUT_PLACEHOLDER: &str = "{input}";

/// Executor that turns its input into a prompt for an injected agent.
///
/// The response text is forwarded, or yielded as the run output when
/// built with `yielding()`. Collected inputs are joined with blank lines.
pub struct AgentExecutor {
    agent: Arc<dyn Agent>,
    template: Option<String>,
    yields: bool,
    description: Option<String>,
}

impl AgentExecutor {
    pub fn new(agent: Arc<dyn Agent>) -> Self {
        Self {
            agent,
            template: None,
            yields: false,
            description: None,
        }
    }

    /// Wrap the input in a template containing `{input}`.
    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = Some(template.into());
        self
    }

    /// Yield the response instead of forwarding it.
    pub fn yielding(mut self) -> Self {
        self.yields = true;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn build_prompt(&self, input: &Input) -> String {
        let rendered = match input {
            Input::Single(payload) => render(payload),
            Input::Collected(payloads) => payloads
                .iter()
                .map(render)
                .collect::<Vec<_>>()
                .join("\n\n"),
        };
        match &self.template {
            Some(template) if template.contains(INPUT_PLACEHOLDER) => {
                template.replace(INPUT_PLACEHOLDER, &rendered)
            }
            Some(template) => format!("{}\n\n{}", template, rendered),
            None => rendered,
        }
    }
}

fn render(payload: &Payload) -> String {
    match payload {
        Payload::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl Executor for AgentExecutor {
    fn invoke<'a>(&'a self, input: Input, ctx: &'a mut Context) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let prompt = self.build_prompt(&input);
            let agent = self.agent.name().to_string();
            debug!(
                executor_id = %ctx.executor_id(),
                agent = %agent,
                prompt_chars = prompt.len(),
                "Calling agent"
            );

            let response = tokio::select! {
                response = self.agent.run(prompt) => response.map_err(|e| match e {
                    WeaveError::Agent { .. } => e,
                    other => WeaveError::Agent { agent: agent.clone(), message: other.to_string() },
                })?,
                _ = ctx.cancelled() => return Err(WeaveError::Cancelled),
            };

            ctx.emit(
                "agent_response",
                json!({ "agent": agent, "chars": response.chars().count() }),
            )
            .await;

            if self.yields {
                ctx.yield_output(response);
            } else {
                ctx.send(response);
            }
            Ok(())
        })
    }

    fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }
}
