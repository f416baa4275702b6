//! # Pipeline Bus
//!
//! Kafka plumbing shared by the orders and payments services:
//!
//! - `kafka`    - client configuration and the producer wrapper
//! - `consumer` - the fetch/handle/commit reader loop with seek-back
//!   redelivery and per-message attempt counting
//! - `outbox`   - the transactional outbox table helpers and the
//!   background publisher
//!
//! The outbox table has the same shape in every service, so the enqueue
//! helper and the publisher operate directly on a `sqlx` Postgres pool;
//! domain tables stay with their owning service.

pub mod consumer;
pub mod error;
pub mod kafka;
pub mod outbox;

pub use consumer::{BusConsumer, InboundMessage, MessageHandler};
pub use error::BusError;
pub use kafka::EventProducer;
pub use outbox::OutboxPublisher;
