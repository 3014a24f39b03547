use tokio_util::sync::CancellationToken;

use crate::error::ExecutionError;
use crate::event::EventSink;
use crate::types::{ExecutorId, Outcome, Payload, RunId, WorkflowEvent};

/// Handle given to an executor for the duration of one invocation.
///
/// Sends and yields are recorded and routed by the engine once the
/// invocation returns; `emit` publishes immediately.
pub struct Context {
    run_id: RunId,
    executor_id: ExecutorId,
    sink: EventSink,
    cancel: CancellationToken,
    sends: Vec<Payload>,
    routes: Vec<(String, Payload)>,
    output: Option<Payload>,
    yields: usize,
}

impl Context {
    pub fn new(
        run_id: RunId,
        executor_id: ExecutorId,
        sink: EventSink,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            run_id,
            executor_id,
            sink,
            cancel,
            sends: Vec::new(),
            routes: Vec::new(),
            output: None,
            yields: 0,
        }
    }

    /// Forward a message along this executor's outgoing edges.
    pub fn send(&mut self, payload: impl Into<Payload>) {
        self.sends.push(payload.into());
    }

    /// Forward a message along the conditional edge selected by `label`.
    pub fn send_to(&mut self, label: impl Into<String>, payload: impl Into<Payload>) {
        self.routes.push((label.into(), payload.into()));
    }

    /// Mark the terminal output of the run.
    pub fn yield_output(&mut self, payload: impl Into<Payload>) {
        self.yields += 1;
        self.output = Some(payload.into());
    }

    /// Record an outcome computed by a plain function.
    pub fn apply(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Forward(payloads) => self.sends.extend(payloads),
            Outcome::Route(routes) => self.routes.extend(routes),
            Outcome::Yield(payload) => self.yield_output(payload),
        }
    }

    /// Publish a custom event on the run's event stream.
    pub async fn emit(&self, name: impl Into<String>, data: Payload) {
        self.sink
            .emit(WorkflowEvent::ExecutorEvent {
                executor_id: self.executor_id.clone(),
                name: name.into(),
                data,
            })
            .await;
    }

    pub fn run_id(&self) -> &RunId {
        &self.run_id
    }

    pub fn executor_id(&self) -> &ExecutorId {
        &self.executor_id
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves once the run has been cancelled.
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Collapse the recorded actions into a single outcome.
    ///
    /// An invocation ends in exactly one of forward, route, or yield.
    pub fn into_outcome(self) -> std::result::Result<Outcome, ExecutionError> {
        if self.yields > 1 {
            return Err(ExecutionError::executor(format!(
                "yielded {} outputs in one invocation",
                self.yields
            )));
        }

        match (self.output, self.sends.is_empty(), self.routes.is_empty()) {
            (Some(payload), true, true) => Ok(Outcome::Yield(payload)),
            (Some(_), _, _) => Err(ExecutionError::executor(
                "yielded an output and also sent messages",
            )),
            (None, false, false) => Err(ExecutionError::executor(
                "mixed labeled and unlabeled sends",
            )),
            (None, _, false) => Ok(Outcome::Route(self.routes)),
            (None, _, true) => Ok(Outcome::Forward(self.sends)),
        }
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("run_id", &self.run_id)
            .field("executor_id", &self.executor_id)
            .field("sends", &self.sends.len())
            .field("routes", &self.routes.len())
            .field("output", &self.output.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::event_channel;
    use serde_json::json;

    fn ctx() -> Context {
        let (sink, _stream) = event_channel(4);
        Context::new(RunId::new(), "A".into(), sink, CancellationToken::new())
    }

    #[test]
    fn test_empty_invocation_forwards_nothing() {
        assert_eq!(ctx().into_outcome().unwrap(), Outcome::none());
    }

    #[test]
    fn test_sends_collapse_to_forward() {
        let mut c = ctx();
        c.send(json!(1));
        c.send(json!(2));
        assert_eq!(
            c.into_outcome().unwrap(),
            Outcome::Forward(vec![json!(1), json!(2)])
        );
    }

    #[test]
    fn test_labeled_sends_collapse_to_route() {
        let mut c = ctx();
        c.send_to("big", json!(20));
        assert_eq!(c.into_outcome().unwrap(), Outcome::route("big", json!(20)));
    }

    #[test]
    fn test_several_labeled_sends_keep_their_order() {
        let mut c = ctx();
        c.send_to("small", json!(3));
        c.send_to("big", json!(20));
        assert_eq!(
            c.into_outcome().unwrap(),
            Outcome::Route(vec![
                ("small".to_string(), json!(3)),
                ("big".to_string(), json!(20)),
            ])
        );
    }

    #[test]
    fn test_yield_with_sends_is_rejected() {
        let mut c = ctx();
        c.send(json!(1));
        c.yield_output(json!(2));
        let err = c.into_outcome().unwrap_err();
        assert!(err.to_string().contains("also sent messages"));
    }

    #[test]
    fn test_double_yield_is_rejected() {
        let mut c = ctx();
        c.yield_output(json!(1));
        c.yield_output(json!(2));
        assert!(c.into_outcome().is_err());
    }

    #[test]
    fn test_mixed_labels_rejected() {
        let mut c = ctx();
        c.send(json!(1));
        c.send_to("retry", json!(1));
        assert!(c.into_outcome().is_err());
    }

    #[test]
    fn test_apply_outcome() {
        let mut c = ctx();
        c.apply(Outcome::yield_output("done"));
        assert_eq!(c.into_outcome().unwrap(), Outcome::yield_output("done"));
    }

    #[tokio::test]
    async fn test_emit_publishes_executor_event() {
        let (sink, mut stream) = event_channel(4);
        let c = Context::new(RunId::new(), "agent".into(), sink, CancellationToken::new());
        c.emit("agent_response", json!({"chars": 12})).await;

        match stream.recv().await {
            Some(WorkflowEvent::ExecutorEvent {
                executor_id,
                name,
                data,
            }) => {
                assert_eq!(executor_id, "agent");
                assert_eq!(name, "agent_response");
                assert_eq!(data["chars"], 12);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_cancellation_visible_through_context() {
        let token = CancellationToken::new();
        let (sink, _stream) = event_channel(1);
        let c = Context::new(RunId::new(), "A".into(), sink, token.clone());
        assert!(!c.is_cancelled());
        token.cancel();
        assert!(c.is_cancelled());
        assert!(c.cancellation_token().is_cancelled());
    }
}
