//! Bus event payloads.
//!
//! Both events travel as JSON on versioned topics and are partition-keyed
//! by `order_id`, so per-order processing is serialized by the broker.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::OrderId;

/// Unique identifier of a single bus event; the consumer inbox keys on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(Uuid);

impl EventId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn into_uuid(self) -> Uuid {
        self.0
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Emitted by the orders service when an order is created and payment is
/// due.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRequested {
    pub event_id: EventId,
    pub occurred_at: DateTime<Utc>,
    pub order_id: OrderId,
    pub user_id: String,
    pub amount: i64,
}

impl PaymentRequested {
    pub fn new(order_id: OrderId, user_id: String, amount: i64) -> Self {
        Self {
            event_id: EventId::new(),
            occurred_at: Utc::now(),
            order_id,
            user_id,
            amount,
        }
    }

    /// Structural validity beyond what deserialization enforces.
    ///
    /// Events failing this check are poison: they can never be processed
    /// and must be absorbed rather than redelivered forever.
    pub fn is_structurally_valid(&self) -> bool {
        !self.user_id.is_empty() && self.amount > 0
    }

    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn decode(payload: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(payload)
    }
}

/// Outcome classification of a debit attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentResultStatus {
    Success,
    FailNoAccount,
    FailNotEnoughFunds,
    FailInternal,
}

/// Emitted by the payments service exactly once per processed order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentResult {
    pub event_id: EventId,
    pub occurred_at: DateTime<Utc>,
    pub order_id: OrderId,
    pub user_id: String,
    pub status: PaymentResultStatus,
    #[serde(default)]
    pub reason: String,
}

impl PaymentResult {
    pub fn new(
        order_id: OrderId,
        user_id: String,
        status: PaymentResultStatus,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            event_id: EventId::new(),
            occurred_at: Utc::now(),
            order_id,
            user_id,
            status,
            reason: reason.into(),
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn decode(payload: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_wire_names() {
        assert_eq!(
            serde_json::to_string(&PaymentResultStatus::FailNoAccount).unwrap(),
            "\"FAIL_NO_ACCOUNT\""
        );
        assert_eq!(
            serde_json::to_string(&PaymentResultStatus::FailNotEnoughFunds).unwrap(),
            "\"FAIL_NOT_ENOUGH_FUNDS\""
        );
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(PaymentRequested::decode(b"not json").is_err());
        // non-UUID identifiers fail structurally at decode time
        assert!(PaymentRequested::decode(
            br#"{"event_id":"nope","occurred_at":"2026-01-01T00:00:00Z","order_id":"nope","user_id":"u1","amount":10}"#
        )
        .is_err());
        // unknown result status is poison, not a default
        assert!(PaymentResult::decode(
            br#"{"event_id":"0cc1a8f8-6c4b-43f9-b2f5-4fb5aa71d6ce","occurred_at":"2026-01-01T00:00:00Z","order_id":"0cc1a8f8-6c4b-43f9-b2f5-4fb5aa71d6cf","user_id":"u1","status":"MAYBE","reason":""}"#
        )
        .is_err());
    }

    #[test]
    fn test_structural_validation() {
        let mut ev = PaymentRequested::new(OrderId::new(), "u1".into(), 10);
        assert!(ev.is_structurally_valid());
        ev.amount = 0;
        assert!(!ev.is_structurally_valid());
        ev.amount = 10;
        ev.user_id.clear();
        assert!(!ev.is_structurally_valid());
    }
}
