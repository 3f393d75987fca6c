//! Notifier: bounded queue in front of a single delivery task.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::event::RunEvent;
use crate::sink::EventSink;

/// Cheap to clone; every clone feeds the same queue.
///
/// The delivery task ends once every clone is dropped and the queue is
/// drained.
#[derive(Clone)]
pub struct Notifier {
    tx: mpsc::Sender<RunEvent>,
}

impl Notifier {
    /// Start the delivery task. Must be called inside a tokio runtime.
    pub fn spawn(sink: Arc<dyn EventSink>, queue_capacity: usize) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(queue_capacity.max(1));
        let handle = tokio::spawn(deliver_loop(sink, rx));
        (Self { tx }, handle)
    }

    /// Queue `event` for delivery. Never blocks; a full queue drops the
    /// event with a warning.
    pub fn publish(&self, event: RunEvent) {
        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(event)) => {
                warn!(
                    run_id = %event.run_id,
                    status = %event.status,
                    test_id = ?event.test_id,
                    "event queue full, dropping event"
                );
            }
            Err(mpsc::error::TrySendError::Closed(event)) => {
                warn!(run_id = %event.run_id, status = %event.status, "notifier stopped, dropping event");
            }
        }
    }
}

async fn deliver_loop(sink: Arc<dyn EventSink>, mut rx: mpsc::Receiver<RunEvent>) {
    while let Some(event) = rx.recv().await {
        match sink.deliver(&event).await {
            Ok(()) => debug!(run_id = %event.run_id, status = %event.status, "event delivered"),
            Err(e) => warn!(
                run_id = %event.run_id,
                status = %event.status,
                test_id = ?event.test_id,
                error = %e,
                "event delivery failed, dropping"
            ),
        }
    }
    debug!("notifier delivery task stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PublishError;
    use crate::sink::MemorySink;
    use std::future::Future;
    use std::pin::Pin;
    use std::time::Duration;

    fn event(run_id: u64, status: &str) -> RunEvent {
        RunEvent {
            run_id,
            test_set_id: "smoke".to_string(),
            cluster_id: "env-1".to_string(),
            status: status.to_string(),
            test_id: None,
            message: None,
            timestamp: 0,
        }
    }

    #[tokio::test]
    async fn delivers_in_publish_order() {
        let sink = MemorySink::new();
        let (notifier, handle) = Notifier::spawn(Arc::new(sink.clone()), 16);

        for status in ["wait_running", "running", "finished"] {
            notifier.publish(event(1, status));
        }
        drop(notifier);
        handle.await.unwrap();

        let statuses: Vec<String> = sink.events().into_iter().map(|e| e.status).collect();
        assert_eq!(statuses, vec!["wait_running", "running", "finished"]);
    }

    #[tokio::test]
    async fn failing_sink_is_swallowed() {
        let sink = MemorySink::failing();
        let (notifier, handle) = Notifier::spawn(Arc::new(sink.clone()), 4);
        notifier.publish(event(1, "running"));
        notifier.publish(event(1, "finished"));
        drop(notifier);
        handle.await.unwrap();
        assert!(sink.events().is_empty());
    }

    /// Blocks every delivery until released.
    struct GatedSink {
        gate: tokio::sync::Semaphore,
        inner: MemorySink,
    }

    impl EventSink for GatedSink {
        fn deliver<'a>(
            &'a self,
            event: &'a RunEvent,
        ) -> Pin<Box<dyn Future<Output = Result<(), PublishError>> + Send + 'a>> {
            Box::pin(async move {
                let _permit = self.gate.acquire().await;
                self.inner.deliver(event).await
            })
        }
    }

    #[tokio::test]
    async fn full_queue_drops_without_blocking() {
        let sink = Arc::new(GatedSink {
            gate: tokio::sync::Semaphore::new(0),
            inner: MemorySink::new(),
        });
        let (notifier, handle) = Notifier::spawn(sink.clone(), 2);

        // The first event is taken by the delivery task and parks on the
        // gate; two more fill the queue; the rest are dropped.
        notifier.publish(event(1, "a"));
        tokio::time::sleep(Duration::from_millis(50)).await;
        for status in ["b", "c", "d", "e"] {
            notifier.publish(event(1, status));
        }

        sink.gate.add_permits(10);
        drop(notifier);
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();

        let statuses: Vec<String> = sink.inner.events().into_iter().map(|e| e.status).collect();
        assert_eq!(statuses, vec!["a", "b", "c"]);
    }
}
