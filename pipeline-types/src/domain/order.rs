//! Order domain model and its state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::MAX_IDEMPOTENCY_KEY_LEN;
use crate::error::DomainError;
use crate::events::PaymentResultStatus;

/// Unique identifier for an Order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(Uuid);

impl OrderId {
    /// Creates a new random OrderId.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates an OrderId from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// Returns the UUID value.
    pub fn into_uuid(self) -> Uuid {
        self.0
    }
}

impl Default for OrderId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for OrderId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Lifecycle state of an order.
///
/// `New` is the only non-terminal state; `Finished` and `Cancelled` are
/// absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    New,
    Finished,
    Cancelled,
}

impl OrderStatus {
    /// Database representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::New => "NEW",
            OrderStatus::Finished => "FINISHED",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, OrderStatus::New)
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NEW" => Ok(OrderStatus::New),
            "FINISHED" => Ok(OrderStatus::Finished),
            "CANCELLED" => Ok(OrderStatus::Cancelled),
            other => Err(format!("unknown order status: {other}")),
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<PaymentResultStatus> for OrderStatus {
    /// A successful payment finishes the order; every failure class
    /// cancels it.
    fn from(status: PaymentResultStatus) -> Self {
        match status {
            PaymentResultStatus::Success => OrderStatus::Finished,
            _ => OrderStatus::Cancelled,
        }
    }
}

/// A purchase order owned by the orders service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub order_id: OrderId,
    pub user_id: String,
    pub amount: i64,
    pub description: String,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
}

impl Order {
    /// Creates a new order in the `New` state.
    ///
    /// # Validation
    /// - `user_id` cannot be empty
    /// - `amount` must be strictly positive
    /// - `description` cannot be empty
    /// - `idempotency_key`, when present, must fit the schema limit
    pub fn new(
        user_id: String,
        amount: i64,
        description: String,
        idempotency_key: Option<String>,
    ) -> Result<Self, DomainError> {
        if user_id.trim().is_empty() {
            return Err(DomainError::EmptyUserId);
        }
        if amount <= 0 {
            return Err(DomainError::NonPositiveAmount);
        }
        if description.is_empty() {
            return Err(DomainError::EmptyDescription);
        }
        if let Some(key) = &idempotency_key {
            if key.is_empty() || key.len() > MAX_IDEMPOTENCY_KEY_LEN {
                return Err(DomainError::InvalidIdempotencyKey);
            }
        }

        Ok(Self {
            order_id: OrderId::new(),
            user_id,
            amount,
            description,
            status: OrderStatus::New,
            created_at: Utc::now(),
            idempotency_key,
        })
    }

    /// Creates an order with all fields specified (for database
    /// reconstruction).
    pub fn from_parts(
        order_id: OrderId,
        user_id: String,
        amount: i64,
        description: String,
        status: OrderStatus,
        created_at: DateTime<Utc>,
        idempotency_key: Option<String>,
    ) -> Self {
        Self {
            order_id,
            user_id,
            amount,
            description,
            status,
            created_at,
            idempotency_key,
        }
    }

    /// Applies a terminal status, but only from the `New` state.
    ///
    /// Returns whether the order actually changed. Terminal states are
    /// absorbing, so a late or duplicate result is a no-op.
    pub fn finalize(&mut self, status: OrderStatus) -> bool {
        if self.status != OrderStatus::New || !status.is_terminal() {
            return false;
        }
        self.status = status;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order() -> Order {
        Order::new("u1".into(), 300, "book".into(), None).unwrap()
    }

    #[test]
    fn test_new_order_starts_new() {
        let o = order();
        assert_eq!(o.status, OrderStatus::New);
        assert!(!o.status.is_terminal());
    }

    #[test]
    fn test_validation_rejects_bad_input() {
        assert!(matches!(
            Order::new("".into(), 10, "x".into(), None),
            Err(DomainError::EmptyUserId)
        ));
        assert!(matches!(
            Order::new("u1".into(), 0, "x".into(), None),
            Err(DomainError::NonPositiveAmount)
        ));
        assert!(matches!(
            Order::new("u1".into(), -5, "x".into(), None),
            Err(DomainError::NonPositiveAmount)
        ));
        assert!(matches!(
            Order::new("u1".into(), 10, "".into(), None),
            Err(DomainError::EmptyDescription)
        ));
        let long_key = "k".repeat(MAX_IDEMPOTENCY_KEY_LEN + 1);
        assert!(matches!(
            Order::new("u1".into(), 10, "x".into(), Some(long_key)),
            Err(DomainError::InvalidIdempotencyKey)
        ));
    }

    #[test]
    fn test_finalize_only_leaves_new_once() {
        let mut o = order();
        assert!(o.finalize(OrderStatus::Finished));
        assert_eq!(o.status, OrderStatus::Finished);
        // second result of any kind is absorbed
        assert!(!o.finalize(OrderStatus::Cancelled));
        assert_eq!(o.status, OrderStatus::Finished);
    }

    #[test]
    fn test_finalize_ignores_non_terminal_target() {
        let mut o = order();
        assert!(!o.finalize(OrderStatus::New));
        assert_eq!(o.status, OrderStatus::New);
    }

    #[test]
    fn test_result_status_mapping() {
        assert_eq!(
            OrderStatus::from(PaymentResultStatus::Success),
            OrderStatus::Finished
        );
        assert_eq!(
            OrderStatus::from(PaymentResultStatus::FailNoAccount),
            OrderStatus::Cancelled
        );
        assert_eq!(
            OrderStatus::from(PaymentResultStatus::FailNotEnoughFunds),
            OrderStatus::Cancelled
        );
        assert_eq!(
            OrderStatus::from(PaymentResultStatus::FailInternal),
            OrderStatus::Cancelled
        );
    }

    #[test]
    fn test_status_round_trip() {
        for s in [
            OrderStatus::New,
            OrderStatus::Finished,
            OrderStatus::Cancelled,
        ] {
            assert_eq!(s.as_str().parse::<OrderStatus>().unwrap(), s);
        }
        assert!("PAID".parse::<OrderStatus>().is_err());
    }
}
