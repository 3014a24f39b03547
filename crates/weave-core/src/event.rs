use std::pin::Pin;
use std::task::{Context as TaskContext, Poll};

use futures::Stream;
use tokio::sync::mpsc;

use crate::types::WorkflowEvent;

/// Create a bounded event channel for a single run.
///
/// A slow consumer applies backpressure to the run once `capacity`
/// events are buffered.
pub fn event_channel(capacity: usize) -> (EventSink, EventStream) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (EventSink { tx }, EventStream { rx })
}

/// Producer half of a run's event stream. Cheap to clone.
#[derive(Clone)]
pub struct EventSink {
    tx: mpsc::Sender<WorkflowEvent>,
}

impl EventSink {
    pub async fn emit(&self, event: WorkflowEvent) {
        // Ignore error if the consumer went away
        let _ = self.tx.send(event).await;
    }

    /// Whether the consumer has dropped its stream.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl std::fmt::Debug for EventSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventSink")
            .field("closed", &self.tx.is_closed())
            .finish()
    }
}

/// Consumer half of a run's event stream.
///
/// Ends once the run has finished and every sink has been dropped.
pub struct EventStream {
    rx: mpsc::Receiver<WorkflowEvent>,
}

impl EventStream {
    /// Receive the next event, or `None` when the run is over.
    pub async fn recv(&mut self) -> Option<WorkflowEvent> {
        self.rx.recv().await
    }

    /// Drain the stream until the run is over.
    pub async fn collect_all(mut self) -> Vec<WorkflowEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.rx.recv().await {
            events.push(event);
        }
        events
    }
}

impl Stream for EventStream {
    type Item = WorkflowEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn test_events_arrive_in_emit_order() {
        let (sink, stream) = event_channel(8);
        sink.emit(WorkflowEvent::RunCancelled).await;
        sink.emit(WorkflowEvent::Warning {
            executor_id: None,
            message: "late".into(),
        })
        .await;
        drop(sink);

        let names: Vec<_> = stream.map(|e| e.name()).collect().await;
        assert_eq!(names, vec!["run_cancelled", "warning"]);
    }

    #[tokio::test]
    async fn test_emit_after_consumer_dropped_is_ignored() {
        let (sink, stream) = event_channel(1);
        drop(stream);
        assert!(sink.is_closed());
        sink.emit(WorkflowEvent::RunCancelled).await;
        sink.emit(WorkflowEvent::RunCancelled).await;
    }

    #[tokio::test]
    async fn test_bounded_buffer_applies_backpressure() {
        let (sink, mut stream) = event_channel(1);
        sink.emit(WorkflowEvent::RunCancelled).await;

        let blocked = tokio::time::timeout(
            std::time::Duration::from_millis(50),
            sink.emit(WorkflowEvent::RunCancelled),
        )
        .await;
        assert!(blocked.is_err(), "second emit should wait for the consumer");

        assert!(stream.recv().await.is_some());
        sink.emit(WorkflowEvent::RunCancelled).await;
        drop(sink);
        assert_eq!(stream.collect_all().await.len(), 1);
    }
}
