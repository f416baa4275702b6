//! # Pipeline Types
//!
//! Domain types, bus events and port traits shared by the orders and
//! payments services. This crate has ZERO external IO dependencies - only
//! data structures, business rules, and trait definitions.
//!
//! ## Architecture
//!
//! - `domain/` - Pure domain types (Order, Account, identifiers)
//! - `events`  - Bus event payloads and their JSON codec
//! - `ports`   - Store traits that database adapters implement
//! - `dto`     - Data Transfer Objects for the RPC boundary
//! - `error`   - Domain and application error types

pub mod domain;
pub mod dto;
pub mod error;
pub mod events;
pub mod ports;

// Re-export commonly used types
pub use domain::{Account, Order, OrderId, OrderStatus, MAX_IDEMPOTENCY_KEY_LEN};
pub use dto::*;
pub use error::{AppError, DomainError, RepoError};
pub use events::{EventId, PaymentRequested, PaymentResult, PaymentResultStatus};
pub use ports::{
    AccountStore, ApplyResultOutcome, CreateAccountOutcome, CreateOrderOutcome, DebitOutcome,
    OrderStore, TopUpOutcome,
};
