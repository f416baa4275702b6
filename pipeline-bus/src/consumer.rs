//! Bus reader loop.
//!
//! Discipline: fetch one message, run the handler, commit the offset only
//! on handler success. On failure the partition is seeked back to the
//! failed offset so the very next fetch redelivers it; fetch-without-commit
//! alone would only redeliver after a rebalance. Poison messages are the
//! handler's job to absorb (return `Ok`), which advances the offset.

use std::collections::HashMap;
use std::time::Duration;

use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::message::Message;
use rdkafka::Offset;
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::error::BusError;
use crate::kafka;

/// Delay before refetching after a handler failure or a broker error.
const RETRY_PAUSE: Duration = Duration::from_millis(200);

/// One fetched bus message, borrowed from the consumer.
pub struct InboundMessage<'a> {
    pub topic: &'a str,
    pub partition: i32,
    pub offset: i64,
    pub payload: &'a [u8],
}

/// Processes inbound messages.
///
/// `attempt` starts at 1 and increments on every redelivery of the same
/// offset observed by this process; handlers with a redelivery budget use
/// it to switch to an absorbing failure path.
#[async_trait::async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, message: InboundMessage<'_>, attempt: u32) -> anyhow::Result<()>;
}

/// Single-topic consumer owning the fetch/handle/commit loop.
pub struct BusConsumer {
    consumer: StreamConsumer,
    topic: String,
}

impl BusConsumer {
    pub fn subscribe(brokers: &str, group_id: &str, topic: &str) -> Result<Self, BusError> {
        let consumer = kafka::subscribe(brokers, group_id, topic)?;
        Ok(Self {
            consumer,
            topic: topic.to_string(),
        })
    }

    /// Runs until the shutdown signal flips. The message being handled
    /// when shutdown arrives is drained, never half-committed.
    pub async fn run<H: MessageHandler>(
        self,
        handler: H,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<(), BusError> {
        info!(topic = %self.topic, "consumer loop started");
        let mut attempts: HashMap<(i32, i64), u32> = HashMap::new();

        loop {
            let message = tokio::select! {
                _ = shutdown.changed() => break,
                fetched = self.consumer.recv() => match fetched {
                    Ok(m) => m,
                    Err(e) => {
                        error!(topic = %self.topic, error = %e, "fetch failed");
                        tokio::time::sleep(RETRY_PAUSE).await;
                        continue;
                    }
                },
            };

            let key = (message.partition(), message.offset());
            let attempt = attempts.get(&key).copied().unwrap_or(0) + 1;
            let inbound = InboundMessage {
                topic: message.topic(),
                partition: message.partition(),
                offset: message.offset(),
                payload: message.payload().unwrap_or_default(),
            };

            match handler.handle(inbound, attempt).await {
                Ok(()) => {
                    attempts.remove(&key);
                    if let Err(e) = self.consumer.commit_message(&message, CommitMode::Sync) {
                        error!(
                            topic = %self.topic,
                            offset = message.offset(),
                            error = %e,
                            "offset commit failed"
                        );
                    }
                }
                Err(e) => {
                    attempts.insert(key, attempt);
                    warn!(
                        topic = %self.topic,
                        partition = message.partition(),
                        offset = message.offset(),
                        attempt,
                        error = %e,
                        "handler failed, rewinding for redelivery"
                    );
                    if let Err(e) = self.consumer.seek(
                        message.topic(),
                        message.partition(),
                        Offset::Offset(message.offset()),
                        Duration::from_secs(5),
                    ) {
                        error!(topic = %self.topic, error = %e, "seek failed");
                    }
                    tokio::time::sleep(RETRY_PAUSE).await;
                }
            }
        }

        info!(topic = %self.topic, "consumer loop stopped");
        Ok(())
    }
}
