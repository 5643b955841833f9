// Broker source. Auto-commit is disabled; the consumer loop commits each
// offset explicitly after the inbox transaction lands.

use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::message::Message;
use rdkafka::{Offset, TopicPartitionList};

use crate::core::ports::{InboundMessage, MessageSource, SourceError};

pub struct KafkaSource {
    consumer: StreamConsumer,
}

impl KafkaSource {
    pub fn new(bootstrap_servers: &str, group_id: &str, topic: &str) -> Result<Self, SourceError> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", bootstrap_servers)
            .set("group.id", group_id)
            .set("auto.offset.reset", "earliest")
            .set("enable.auto.commit", "false")
            .create()
            .map_err(|err| SourceError::Recv(err.to_string()))?;
        consumer
            .subscribe(&[topic])
            .map_err(|err| SourceError::Recv(err.to_string()))?;
        tracing::info!(topic, group_id, "subscribed to broker topic");
        Ok(Self { consumer })
    }
}

#[async_trait]
impl MessageSource for KafkaSource {
    async fn recv(&self) -> Result<InboundMessage, SourceError> {
        let message = self
            .consumer
            .recv()
            .await
            .map_err(|err| SourceError::Recv(err.to_string()))?;
        Ok(InboundMessage {
            topic: message.topic().to_string(),
            partition: message.partition(),
            offset: message.offset(),
            payload: message.payload().unwrap_or_default().to_vec(),
        })
    }

    fn commit(&self, message: &InboundMessage) -> Result<(), SourceError> {
        let mut offsets = TopicPartitionList::new();
        offsets
            .add_partition_offset(
                &message.topic,
                message.partition,
                // Committed offset is the next one to consume.
                Offset::Offset(message.offset + 1),
            )
            .map_err(|err| SourceError::Commit(err.to_string()))?;
        self.consumer
            .commit(&offsets, CommitMode::Sync)
            .map_err(|err| SourceError::Commit(err.to_string()))
    }
}
