// Broker publisher. One shared producer; each publish blocks until the
// delivery report for that message arrives.

use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;

use crate::core::ports::{EventPublisher, PublishError};

pub struct KafkaPublisher {
    producer: FutureProducer,
    topic: String,
}

impl KafkaPublisher {
    pub fn new(bootstrap_servers: &str, topic: impl Into<String>) -> Result<Self, PublishError> {
        let producer = ClientConfig::new()
            .set("bootstrap.servers", bootstrap_servers)
            .set("compression.type", "snappy")
            .create()
            .map_err(|err| PublishError::Broker(err.to_string()))?;
        Ok(Self {
            producer,
            topic: topic.into(),
        })
    }
}

#[async_trait]
impl EventPublisher for KafkaPublisher {
    async fn publish(&self, payload: &[u8]) -> Result<(), PublishError> {
        // Unkeyed: the broker picks the partition.
        let record = FutureRecord::<(), [u8]>::to(&self.topic).payload(payload);
        match self.producer.send(record, Timeout::Never).await {
            Ok((partition, offset)) => {
                tracing::debug!(topic = %self.topic, partition, offset, "delivered message");
                Ok(())
            }
            Err((err, _message)) => Err(PublishError::Broker(err.to_string())),
        }
    }
}
