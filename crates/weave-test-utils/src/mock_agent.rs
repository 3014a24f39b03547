use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use futures::future::BoxFuture;

use weave_core::error::{Result, WeaveError};
use weave_core::traits::Agent;

/// Scripted stand-in for a reasoning service.
///
/// Responses are returned in order; once the script runs out the last
/// one repeats. With no script the agent echoes `"<name>: <prompt>"`.
/// Every prompt is recorded.
pub struct MockAgent {
    name: String,
    responses: Mutex<VecDeque<String>>,
    last: Mutex<Option<String>>,
    error: Option<String>,
    latency: Option<Duration>,
    prompts: Mutex<Vec<String>>,
}

impl MockAgent {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            responses: Mutex::new(VecDeque::new()),
            last: Mutex::new(None),
            error: None,
            latency: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn with_response(self, response: impl Into<String>) -> Self {
        self.responses.lock().unwrap().push_back(response.into());
        self
    }

    /// Fail every call with `message`.
    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.error = Some(message.into());
        self
    }

    /// Sleep before answering.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    fn next_response(&self, prompt: &str) -> String {
        let scripted = self.responses.lock().unwrap().pop_front();
        let mut last = self.last.lock().unwrap();
        match scripted {
            Some(response) => {
                *last = Some(response.clone());
                response
            }
            None => last
                .clone()
                .unwrap_or_else(|| format!("{}: {}", self.name, prompt)),
        }
    }
}

impl Agent for MockAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn run(&self, prompt: String) -> BoxFuture<'_, Result<String>> {
        Box::pin(async move {
            self.prompts.lock().unwrap().push(prompt.clone());
            if let Some(latency) = self.latency {
                tokio::time::sleep(latency).await;
            }
            if let Some(message) = &self.error {
                return Err(WeaveError::Agent {
                    agent: self.name.clone(),
                    message: message.clone(),
                });
            }
            Ok(self.next_response(&prompt))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_script_then_repeat() {
        let agent = MockAgent::new("a").with_response("one").with_response("two");
        assert_eq!(agent.run("p1".into()).await.unwrap(), "one");
        assert_eq!(agent.run("p2".into()).await.unwrap(), "two");
        assert_eq!(agent.run("p3".into()).await.unwrap(), "two");
        assert_eq!(agent.prompts(), vec!["p1", "p2", "p3"]);
    }

    #[tokio::test]
    async fn test_echo_without_script() {
        let agent = MockAgent::new("echo");
        assert_eq!(agent.run("hi".into()).await.unwrap(), "echo: hi");
        assert_eq!(agent.call_count(), 1);
    }
}
