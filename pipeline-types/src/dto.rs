//! Data Transfer Objects for the RPC boundary.

use serde::{Deserialize, Serialize};

use crate::domain::Order;

// ─────────────────────────────────────────────────────────────────────────────
// Payments DTOs
// ─────────────────────────────────────────────────────────────────────────────

/// Request to create a balance account for a user.
///
/// The command carries no parameters beyond the user; a repeated create
/// under an idempotency key is not an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAccountRequest {
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
}

/// Request to add funds to an account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopUpRequest {
    pub user_id: String,
    pub amount: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
}

/// Account state returned by create-account and top-up.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountResponse {
    pub user_id: String,
    pub balance: i64,
}

/// Balance read response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceResponse {
    pub balance: i64,
}

// ─────────────────────────────────────────────────────────────────────────────
// Orders DTOs
// ─────────────────────────────────────────────────────────────────────────────

/// Request to create an order and kick off its payment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateOrderRequest {
    pub user_id: String,
    pub amount: i64,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
}

/// One page of a user's orders.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListOrdersResponse {
    pub orders: Vec<Order>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
}
