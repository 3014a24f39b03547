use weave_core::event::EventStream;
use weave_core::types::WorkflowEvent;

/// Drain a stream until the run closes it.
pub async fn collect_events(stream: EventStream) -> Vec<WorkflowEvent> {
    stream.collect_all().await
}

/// `name` or `name:executor` for each event, for compact order assertions.
pub fn event_names(events: &[WorkflowEvent]) -> Vec<String> {
    events
        .iter()
        .map(|event| match event.executor_id() {
            Some(id) => format!("{}:{}", event.name(), id),
            None => event.name().to_string(),
        })
        .collect()
}

/// Events concerning one executor.
pub fn events_for<'a>(events: &'a [WorkflowEvent], executor: &str) -> Vec<&'a WorkflowEvent> {
    events
        .iter()
        .filter(|event| event.executor_id().is_some_and(|id| id == executor))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_names_include_executor() {
        let events = vec![
            WorkflowEvent::ExecutorInvoked {
                executor_id: "A".into(),
                input_summary: "5".into(),
            },
            WorkflowEvent::RunCancelled,
        ];
        assert_eq!(event_names(&events), vec!["executor_invoked:A", "run_cancelled"]);
        assert_eq!(events_for(&events, "A").len(), 1);
    }
}
