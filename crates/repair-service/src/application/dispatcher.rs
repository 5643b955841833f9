// Background publisher for staged outbox rows.
//
// Responsibilities
// - On each tick, publish unprocessed rows in insertion order and flip
//   `processed` only after the broker acknowledged that row.
// - Leave a row untouched on any failure; the next tick retries. The
//   request path never waits on this worker.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::core::ports::{EventPublisher, RepairStore, StoreError};

pub struct OutboxDispatcher {
    store: Arc<dyn RepairStore>,
    publisher: Arc<dyn EventPublisher>,
    interval: Duration,
}

impl OutboxDispatcher {
    pub fn new(
        store: Arc<dyn RepairStore>,
        publisher: Arc<dyn EventPublisher>,
        interval: Duration,
    ) -> Self {
        Self {
            store,
            publisher,
            interval,
        }
    }

    pub async fn run(self, token: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    tracing::info!("stopping outbox dispatcher");
                    return;
                }
                _ = ticker.tick() => {
                    if let Err(err) = self.drain_once().await {
                        tracing::error!(error = %err, "outbox drain failed");
                    }
                }
            }
        }
    }

    /// One tick: returns how many rows were published and marked.
    pub async fn drain_once(&self) -> Result<usize, StoreError> {
        let events = self.store.unprocessed_events().await?;
        let mut published = 0;
        for event in events {
            match self.publisher.publish(&event.payload).await {
                Ok(()) => {
                    if let Err(err) = self.store.mark_processed(&event.id).await {
                        // The broker already has the payload; the row stays
                        // unprocessed and will be re-published. Consumers
                        // de-duplicate by event id.
                        tracing::error!(event_id = %event.id, error = %err, "failed to mark outbox row");
                        continue;
                    }
                    published += 1;
                    tracing::info!(event_id = %event.id, "published outbox event");
                }
                Err(err) => {
                    tracing::warn!(event_id = %event.id, error = %err, "publish failed, will retry");
                }
            }
        }
        Ok(published)
    }
}

#[cfg(test)]
mod outbox_dispatcher_tests {
    use super::*;
    use crate::adapters::in_memory::{InMemoryRepairStore, RecordingPublisher};
    use crate::core::repair::{EventType, OutboxEvent};
    use rstest::rstest;

    fn dispatcher(
        store: Arc<InMemoryRepairStore>,
        publisher: Arc<RecordingPublisher>,
    ) -> OutboxDispatcher {
        OutboxDispatcher::new(store, publisher, Duration::from_secs(5))
    }

    async fn stage(store: &InMemoryRepairStore, payload: &[u8]) -> String {
        let event = OutboxEvent::staged(EventType::RepairCreated, payload.to_vec());
        let id = event.id.clone();
        store.stage_event(event).await;
        id
    }

    #[rstest]
    #[tokio::test]
    async fn it_should_publish_in_insertion_order_and_mark_processed() {
        let store = Arc::new(InMemoryRepairStore::new());
        let publisher = Arc::new(RecordingPublisher::new());
        stage(&store, b"first").await;
        stage(&store, b"second").await;

        let published = dispatcher(store.clone(), publisher.clone())
            .drain_once()
            .await
            .unwrap();

        assert_eq!(published, 2);
        assert_eq!(publisher.published().await, vec![b"first".to_vec(), b"second".to_vec()]);
        let rows = store.outbox_rows().await;
        assert!(rows.iter().all(|row| row.processed && row.processed_at.is_some()));
    }

    #[rstest]
    #[tokio::test]
    async fn it_should_leave_rows_staged_while_the_broker_is_down() {
        let store = Arc::new(InMemoryRepairStore::new());
        let publisher = Arc::new(RecordingPublisher::new());
        publisher.toggle_failing();
        stage(&store, b"payload").await;

        let published = dispatcher(store.clone(), publisher.clone())
            .drain_once()
            .await
            .unwrap();

        assert_eq!(published, 0);
        assert!(publisher.published().await.is_empty());
        assert!(!store.outbox_rows().await[0].processed);
    }

    #[rstest]
    #[tokio::test]
    async fn it_should_retry_after_the_broker_recovers() {
        let store = Arc::new(InMemoryRepairStore::new());
        let publisher = Arc::new(RecordingPublisher::new());
        publisher.toggle_failing();
        stage(&store, b"payload").await;

        let worker = dispatcher(store.clone(), publisher.clone());
        worker.drain_once().await.unwrap();
        publisher.toggle_failing();
        let published = worker.drain_once().await.unwrap();

        assert_eq!(published, 1);
        assert!(store.outbox_rows().await[0].processed);
    }

    #[rstest]
    #[tokio::test]
    async fn it_should_keep_going_past_a_row_that_cannot_be_marked() {
        let store = Arc::new(InMemoryRepairStore::new());
        let publisher = Arc::new(RecordingPublisher::new());
        let first = stage(&store, b"first").await;
        stage(&store, b"second").await;
        store.fail_mark_for(&first).await;

        let published = dispatcher(store.clone(), publisher.clone())
            .drain_once()
            .await
            .unwrap();

        // Both payloads reached the broker; only the markable row counts.
        assert_eq!(published, 1);
        assert_eq!(publisher.published().await.len(), 2);
        let rows = store.outbox_rows().await;
        assert!(!rows[0].processed);
        assert!(rows[1].processed);
    }
}
