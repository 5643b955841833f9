// Background applier: materialises staked inbox rows into the local
// repairs collection exactly once per event id.

use std::sync::Arc;
use std::time::Duration;

use repair_events::EventCodec;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::core::ports::{InboxStore, StoreError};
use crate::core::repair::Repair;

pub struct OutboxApplier {
    inbox: Arc<dyn InboxStore>,
    codec: Arc<EventCodec>,
    interval: Duration,
}

impl OutboxApplier {
    pub fn new(inbox: Arc<dyn InboxStore>, codec: Arc<EventCodec>, interval: Duration) -> Self {
        Self {
            inbox,
            codec,
            interval,
        }
    }

    pub async fn run(self, token: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    tracing::info!("stopping outbox applier");
                    return;
                }
                _ = ticker.tick() => {
                    if let Err(err) = self.drain_once().await {
                        tracing::error!(error = %err, "applier drain failed");
                    }
                }
            }
        }
    }

    /// One tick: returns how many rows were materialised and flipped.
    pub async fn drain_once(&self) -> Result<usize, StoreError> {
        let events = self.inbox.unprocessed().await?;
        let mut applied = 0;
        for event in events {
            let record = match self.codec.decode(&event.payload) {
                Ok(record) => record,
                Err(err) => {
                    tracing::error!(event_id = %event.id, error = %err, "undecodable payload, leaving row");
                    continue;
                }
            };
            let repair = Repair::from_event(&record);
            match self.inbox.apply(&repair, &event.id).await {
                Ok(()) => {
                    applied += 1;
                    tracing::info!(event_id = %event.id, repair_id = %repair.id, "applied repair event");
                }
                Err(err) => {
                    tracing::error!(event_id = %event.id, error = %err, "apply failed, will retry");
                }
            }
        }
        Ok(applied)
    }
}

#[cfg(test)]
mod outbox_applier_tests {
    use super::*;
    use crate::adapters::in_memory::InMemoryMechanicStore;
    use crate::core::repair::InboxEvent;
    use repair_events::{EventCodec, RepairEventRecord};
    use rstest::{fixture, rstest};

    fn record(id: &str, status: &str) -> RepairEventRecord {
        RepairEventRecord {
            id: id.into(),
            user_id: "u1".into(),
            status: status.into(),
            repair_type: "flat_tire".into(),
            total_price: 50.0,
            user_location: None,
            mechanics: vec![],
        }
    }

    #[fixture]
    fn codec() -> Arc<EventCodec> {
        Arc::new(EventCodec::new(1).unwrap())
    }

    fn applier(store: Arc<InMemoryMechanicStore>, codec: Arc<EventCodec>) -> OutboxApplier {
        OutboxApplier::new(store, codec, Duration::from_secs(5))
    }

    async fn stake(
        store: &InMemoryMechanicStore,
        codec: &EventCodec,
        offset: i64,
        record: &RepairEventRecord,
    ) {
        let payload = codec.encode(record).unwrap();
        let event = InboxEvent::staked("repair-events", 0, offset, payload);
        store.stake_raw(event).await;
    }

    #[rstest]
    #[tokio::test]
    async fn it_should_materialise_a_staked_event(codec: Arc<EventCodec>) {
        let store = Arc::new(InMemoryMechanicStore::new());
        stake(&store, &codec, 0, &record("65a0000000000000000000aa", "pending")).await;

        let applied = applier(store.clone(), codec).drain_once().await.unwrap();

        assert_eq!(applied, 1);
        let repairs = store.repairs().await;
        assert_eq!(repairs.len(), 1);
        assert_eq!(repairs[0].status, "pending");
        assert!(store.staked_events().await[0].processed);
    }

    #[rstest]
    #[tokio::test]
    async fn it_should_be_idempotent_per_event_id(codec: Arc<EventCodec>) {
        let store = Arc::new(InMemoryMechanicStore::new());
        stake(&store, &codec, 0, &record("65a0000000000000000000aa", "pending")).await;

        let worker = applier(store.clone(), codec);
        worker.drain_once().await.unwrap();
        let first_pass = store.repairs().await;
        let applied_again = worker.drain_once().await.unwrap();

        assert_eq!(applied_again, 0);
        assert_eq!(store.repairs().await, first_pass);
    }

    #[rstest]
    #[tokio::test]
    async fn it_should_treat_the_latest_update_as_authoritative(codec: Arc<EventCodec>) {
        let store = Arc::new(InMemoryMechanicStore::new());
        stake(&store, &codec, 0, &record("65a0000000000000000000aa", "pending")).await;
        stake(&store, &codec, 1, &record("65a0000000000000000000aa", "completed")).await;

        let applied = applier(store.clone(), codec).drain_once().await.unwrap();

        assert_eq!(applied, 2);
        let repairs = store.repairs().await;
        assert_eq!(repairs.len(), 1);
        assert_eq!(repairs[0].status, "completed");
    }

    #[rstest]
    #[tokio::test]
    async fn it_should_leave_an_undecodable_row_unprocessed(codec: Arc<EventCodec>) {
        let store = Arc::new(InMemoryMechanicStore::new());
        store
            .stake_raw(InboxEvent::staked("repair-events", 0, 0, vec![0x00, 0, 0, 0, 1]))
            .await;

        let applied = applier(store.clone(), codec).drain_once().await.unwrap();

        assert_eq!(applied, 0);
        assert!(store.repairs().await.is_empty());
        assert!(!store.staked_events().await[0].processed);
    }

    #[rstest]
    #[tokio::test]
    async fn it_should_retry_after_a_store_failure(codec: Arc<EventCodec>) {
        let store = Arc::new(InMemoryMechanicStore::new());
        stake(&store, &codec, 0, &record("65a0000000000000000000aa", "pending")).await;
        store.fail_apply_once();

        let worker = applier(store.clone(), codec);
        assert_eq!(worker.drain_once().await.unwrap(), 0);
        assert!(store.repairs().await.is_empty());

        assert_eq!(worker.drain_once().await.unwrap(), 1);
        assert_eq!(store.repairs().await.len(), 1);
    }
}
