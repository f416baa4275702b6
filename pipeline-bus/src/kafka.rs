//! Kafka client configuration and the producer wrapper.

use std::time::Duration;

use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::ClientConfig;
use tracing::info;

use crate::error::BusError;

/// Build a ClientConfig for producers.
///
/// `acks=all` plus idempotence: the broker acknowledges only once every
/// replica has the record, and retries cannot duplicate it.
fn producer_config(brokers: &str) -> ClientConfig {
    let mut config = ClientConfig::new();
    config.set("bootstrap.servers", brokers);
    config.set("message.timeout.ms", "5000");
    config.set("acks", "all");
    config.set("enable.idempotence", "true");
    config
}

/// Build a ClientConfig for consumers.
///
/// Auto-commit is off: offsets move only after the handler's transaction
/// commits.
fn consumer_config(brokers: &str, group_id: &str) -> ClientConfig {
    let mut config = ClientConfig::new();
    config.set("bootstrap.servers", brokers);
    config.set("group.id", group_id);
    config.set("enable.auto.commit", "false");
    config.set("auto.offset.reset", "earliest");
    config
}

/// Thin wrapper around an rdkafka `FutureProducer`.
#[derive(Clone)]
pub struct EventProducer {
    inner: FutureProducer,
}

impl EventProducer {
    pub fn connect(brokers: &str) -> Result<Self, BusError> {
        let inner: FutureProducer = producer_config(brokers)
            .create()
            .map_err(|e| BusError::Connection(format!("failed to create Kafka producer: {e}")))?;

        info!(brokers, "connected to Kafka");
        Ok(Self { inner })
    }

    /// Publishes one record and waits for the broker acknowledgement.
    pub async fn send(&self, topic: &str, key: &str, payload: &[u8]) -> Result<(), BusError> {
        let record = FutureRecord::to(topic).key(key).payload(payload);
        self.inner
            .send(record, Duration::from_secs(5))
            .await
            .map_err(|(e, _)| BusError::Publish(e.to_string()))?;
        Ok(())
    }
}

/// Creates a subscribed `StreamConsumer` for one topic.
pub(crate) fn subscribe(
    brokers: &str,
    group_id: &str,
    topic: &str,
) -> Result<StreamConsumer, BusError> {
    let consumer: StreamConsumer = consumer_config(brokers, group_id)
        .create()
        .map_err(|e| BusError::Connection(format!("failed to create Kafka consumer: {e}")))?;

    consumer
        .subscribe(&[topic])
        .map_err(|e| BusError::Subscribe(format!("failed to subscribe to {topic}: {e}")))?;

    info!(brokers, group_id, topic, "subscribed to Kafka topic");
    Ok(consumer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_producer_config_is_durable() {
        let config = producer_config("broker:9092");
        assert_eq!(config.get("acks"), Some("all"));
        assert_eq!(config.get("enable.idempotence"), Some("true"));
    }

    #[test]
    fn test_consumer_config_commits_manually() {
        let config = consumer_config("broker:9092", "orders-service");
        assert_eq!(config.get("enable.auto.commit"), Some("false"));
        assert_eq!(config.get("group.id"), Some("orders-service"));
    }
}
