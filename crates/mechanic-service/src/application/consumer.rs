// Relay consumer: broker message in, inbox row out, offset commit last.
//
// Responsibilities
// - Sanity-check the envelope before anything touches the store; a frame
//   that can never decode is skipped with its offset committed.
// - Commit the consumer offset only after the inbox transaction committed.
//   Any failure before that leaves the offset alone so the broker
//   redelivers.

use std::sync::Arc;

use repair_events::envelope;
use tokio_util::sync::CancellationToken;

use crate::core::ports::{InboundMessage, InboxStore, MessageSource, Staked};
use crate::core::repair::InboxEvent;

pub struct RelayConsumer {
    source: Arc<dyn MessageSource>,
    inbox: Arc<dyn InboxStore>,
}

impl RelayConsumer {
    pub fn new(source: Arc<dyn MessageSource>, inbox: Arc<dyn InboxStore>) -> Self {
        Self { source, inbox }
    }

    pub async fn run(self, token: CancellationToken) {
        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    tracing::info!("stopping relay consumer");
                    return;
                }
                received = self.source.recv() => match received {
                    Ok(message) => self.process(message).await,
                    Err(err) => {
                        tracing::error!(error = %err, "error reading broker message");
                    }
                }
            }
        }
    }

    /// Handles one broker message end to end.
    pub async fn process(&self, message: InboundMessage) {
        if let Err(err) = envelope::unwrap(&message.payload) {
            // The producer always encodes correctly; a malformed frame is
            // provably unrecoverable, so skip it and move the offset on.
            tracing::warn!(
                topic = %message.topic,
                partition = message.partition,
                offset = message.offset,
                error = %err,
                "skipping malformed frame"
            );
            if let Err(err) = self.source.commit(&message) {
                tracing::error!(error = %err, "failed to commit skipped offset");
            }
            return;
        }

        let event = InboxEvent::staked(
            &message.topic,
            message.partition,
            message.offset,
            message.payload.clone(),
        );
        match self.inbox.stake(&event).await {
            Ok(staked) => {
                if staked == Staked::Duplicate {
                    tracing::info!(
                        topic = %message.topic,
                        partition = message.partition,
                        offset = message.offset,
                        "duplicate delivery absorbed by inbox index"
                    );
                }
                if let Err(err) = self.source.commit(&message) {
                    // Staked but not committed: the broker will redeliver
                    // and the index absorbs the duplicate.
                    tracing::error!(error = %err, "failed to commit offset");
                }
            }
            Err(err) => {
                tracing::error!(
                    offset = message.offset,
                    error = %err,
                    "failed to stake message, leaving offset for redelivery"
                );
            }
        }
    }
}

#[cfg(test)]
mod relay_consumer_tests {
    use super::*;
    use crate::adapters::in_memory::{InMemoryMechanicStore, ScriptedSource};
    use repair_events::envelope::wrap;
    use rstest::{fixture, rstest};

    fn message(offset: i64, payload: Vec<u8>) -> InboundMessage {
        InboundMessage {
            topic: "repair-events".into(),
            partition: 0,
            offset,
            payload,
        }
    }

    #[fixture]
    fn harness() -> (RelayConsumer, Arc<ScriptedSource>, Arc<InMemoryMechanicStore>) {
        let source = Arc::new(ScriptedSource::new());
        let store = Arc::new(InMemoryMechanicStore::new());
        let consumer = RelayConsumer::new(source.clone(), store.clone());
        (consumer, source, store)
    }

    #[rstest]
    #[tokio::test]
    async fn it_should_stake_then_commit(
        harness: (RelayConsumer, Arc<ScriptedSource>, Arc<InMemoryMechanicStore>),
    ) {
        let (consumer, source, store) = harness;
        consumer.process(message(7, wrap(1, b"datum"))).await;

        let staked = store.staked_events().await;
        assert_eq!(staked.len(), 1);
        assert_eq!(staked[0].kafka_offset, 7);
        assert_eq!(source.committed(), vec![("repair-events".to_string(), 0, 7)]);
    }

    #[rstest]
    #[tokio::test]
    async fn it_should_absorb_a_byte_identical_redelivery(
        harness: (RelayConsumer, Arc<ScriptedSource>, Arc<InMemoryMechanicStore>),
    ) {
        let (consumer, source, store) = harness;
        let payload = wrap(1, b"datum");
        consumer.process(message(7, payload.clone())).await;
        consumer.process(message(7, payload)).await;

        assert_eq!(store.staked_events().await.len(), 1);
        assert_eq!(source.committed().len(), 2);
    }

    #[rstest]
    #[tokio::test]
    async fn it_should_skip_and_commit_a_malformed_frame(
        harness: (RelayConsumer, Arc<ScriptedSource>, Arc<InMemoryMechanicStore>),
    ) {
        let (consumer, source, store) = harness;
        consumer.process(message(3, vec![0x7f, 0x00])).await;

        assert!(store.staked_events().await.is_empty());
        assert_eq!(source.committed().len(), 1);
    }

    #[rstest]
    #[tokio::test]
    async fn it_should_leave_the_offset_when_staking_fails(
        harness: (RelayConsumer, Arc<ScriptedSource>, Arc<InMemoryMechanicStore>),
    ) {
        let (consumer, source, store) = harness;
        store.toggle_offline();
        consumer.process(message(4, wrap(1, b"datum"))).await;

        assert!(source.committed().is_empty());
    }
}
