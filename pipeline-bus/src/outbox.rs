//! Transactional outbox.
//!
//! Every externally-visible event is appended to the owning service's
//! `outbox` table inside the same transaction as the state change it
//! reports (`enqueue`). A background `OutboxPublisher` then moves unsent
//! rows to the bus: at-least-once, never dropped, duplicates handled by
//! the consumer-side inbox.

use std::time::Duration;

use sqlx::postgres::PgConnection;
use sqlx::{FromRow, PgPool};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::error::BusError;
use crate::kafka::EventProducer;

/// Attempts threshold past which a row is flagged in the log on every
/// pass. The row is still retried; there is no dead-letter at this layer.
pub const DEFAULT_ALERT_ATTEMPTS: i32 = 10;

/// Appends one event to the outbox inside the caller's transaction.
pub async fn enqueue(
    conn: &mut PgConnection,
    topic: &str,
    kafka_key: &str,
    payload: &[u8],
) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT INTO outbox (topic, kafka_key, payload) VALUES ($1, $2, $3)")
        .bind(topic)
        .bind(kafka_key)
        .bind(payload)
        .execute(conn)
        .await?;
    Ok(())
}

#[derive(FromRow)]
struct OutboxRow {
    id: i64,
    topic: String,
    kafka_key: String,
    payload: Vec<u8>,
    attempts: i32,
}

/// Background worker publishing committed outbox rows to Kafka.
pub struct OutboxPublisher {
    pool: PgPool,
    producer: EventProducer,
    interval: Duration,
    batch: i64,
    alert_attempts: i32,
}

impl OutboxPublisher {
    pub fn new(pool: PgPool, producer: EventProducer, interval: Duration, batch: i64) -> Self {
        Self {
            pool,
            producer,
            interval,
            batch,
            alert_attempts: DEFAULT_ALERT_ATTEMPTS,
        }
    }

    /// Ticks every `interval` until shutdown; the pass in flight when the
    /// signal arrives completes before the worker exits.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(
            interval_ms = self.interval.as_millis() as u64,
            batch = self.batch,
            "outbox publisher started"
        );
        let mut tick = tokio::time::interval(self.interval);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                _ = tick.tick() => {
                    if let Err(e) = self.publish_once().await {
                        error!(error = %e, "outbox publish pass failed");
                    }
                }
            }
        }
        info!("outbox publisher stopped");
    }

    /// One publisher pass.
    ///
    /// Locks up to `batch` oldest unsent rows with SKIP LOCKED (a second
    /// publisher instance is safe, just not useful), publishes each, and
    /// marks the outcome per row. The transaction commits regardless of
    /// per-row publish failures; failed rows stay unsent and are picked
    /// up again next tick.
    async fn publish_once(&self) -> Result<(), BusError> {
        let mut tx = self.pool.begin().await?;

        let rows: Vec<OutboxRow> = sqlx::query_as(
            r#"SELECT id, topic, kafka_key, payload, attempts
               FROM outbox
               WHERE sent_at IS NULL
               ORDER BY id
               LIMIT $1
               FOR UPDATE SKIP LOCKED"#,
        )
        .bind(self.batch)
        .fetch_all(&mut *tx)
        .await?;

        if rows.is_empty() {
            tx.commit().await?;
            return Ok(());
        }

        let total = rows.len();
        let mut published = 0usize;
        for row in rows {
            if row.attempts >= self.alert_attempts {
                error!(
                    outbox_id = row.id,
                    attempts = row.attempts,
                    topic = %row.topic,
                    "outbox row exceeded delivery attempt threshold"
                );
            }

            match self
                .producer
                .send(&row.topic, &row.kafka_key, &row.payload)
                .await
            {
                Ok(()) => {
                    sqlx::query("UPDATE outbox SET sent_at = now() WHERE id = $1")
                        .bind(row.id)
                        .execute(&mut *tx)
                        .await?;
                    published += 1;
                    debug!(outbox_id = row.id, kafka_key = %row.kafka_key, "outbox row published");
                }
                Err(e) => {
                    sqlx::query(
                        "UPDATE outbox SET attempts = attempts + 1, last_error = $2 WHERE id = $1",
                    )
                    .bind(row.id)
                    .bind(e.to_string())
                    .execute(&mut *tx)
                    .await?;
                    warn!(outbox_id = row.id, error = %e, "outbox publish failed, will retry");
                }
            }
        }

        tx.commit().await?;
        debug!(published, total, "outbox publish pass completed");
        Ok(())
    }
}
