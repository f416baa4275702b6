//! Store port traits.
//!
//! These are the primary ports of the two services. The Postgres adapters
//! implement them; tests supply in-memory fakes.
//!
//! Methods that combine a business write with an outbox or inbox write are
//! atomic: implementations MUST commit all of it in one database
//! transaction or none of it.

use crate::domain::{Account, Order, OrderId};
use crate::error::RepoError;
use crate::events::{PaymentRequested, PaymentResult};

// ─────────────────────────────────────────────────────────────────────────────
// Outcomes
// ─────────────────────────────────────────────────────────────────────────────

/// Result of a plain (keyless) create-account command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateAccountOutcome {
    Created(Account),
    AlreadyExists,
}

/// Result of a keyed top-up command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TopUpOutcome {
    /// Fresh key: the balance changed.
    Applied { balance: i64 },
    /// Replay with matching parameters: stored result returned, no effect.
    Replayed { balance: i64 },
    /// Same key, different parameters.
    KeyMismatch,
    /// No account for the user; the idempotency row was removed so a
    /// later retry can succeed.
    NoAccount,
}

/// Result of a create-order command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateOrderOutcome {
    /// Order inserted; a `PaymentRequested` outbox row committed with it.
    Created(Order),
    /// Replay with matching parameters: the stored order, no new event.
    Replayed(Order),
    /// Same key, different parameters.
    KeyMismatch,
}

/// Result of consuming a `PaymentRequested` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebitOutcome {
    /// Inbox already held the event id; nothing was done.
    AlreadyProcessed,
    /// Debit applied; a SUCCESS result was enqueued.
    Debited,
    /// No account row; a FAIL_NO_ACCOUNT result was enqueued.
    NoAccount,
    /// Account exists but cannot cover the amount; a
    /// FAIL_NOT_ENOUGH_FUNDS result was enqueued.
    InsufficientFunds,
}

/// Result of consuming a `PaymentResult` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyResultOutcome {
    AlreadyProcessed,
    Applied,
}

// ─────────────────────────────────────────────────────────────────────────────
// Ports
// ─────────────────────────────────────────────────────────────────────────────

/// Storage port of the payments service.
#[async_trait::async_trait]
pub trait AccountStore: Send + Sync + 'static {
    /// Inserts a fresh account with zero balance.
    async fn create_account(&self, user_id: &str) -> Result<CreateAccountOutcome, RepoError>;

    /// Upsert-style create that tolerates an existing account and returns
    /// the current state either way.
    async fn create_account_idempotent(&self, user_id: &str) -> Result<Account, RepoError>;

    /// Adds `amount` without replay protection. `None` when the account
    /// does not exist.
    async fn top_up(&self, user_id: &str, amount: i64) -> Result<Option<Account>, RepoError>;

    /// Keyed top-up: at most one effect per `(user_id, key)`, identical
    /// responses on replay.
    async fn top_up_idempotent(
        &self,
        user_id: &str,
        amount: i64,
        key: &str,
    ) -> Result<TopUpOutcome, RepoError>;

    async fn get_balance(&self, user_id: &str) -> Result<Option<i64>, RepoError>;

    /// Consumes one `PaymentRequested`: inbox dedup, atomic
    /// debit-or-classify, and the `PaymentResult` outbox append, all in
    /// one transaction.
    async fn apply_payment_requested(
        &self,
        event: &PaymentRequested,
    ) -> Result<DebitOutcome, RepoError>;

    /// Records a FAIL_INTERNAL result for an event whose redelivery
    /// budget is exhausted (inbox insert + outbox append, one
    /// transaction).
    async fn record_internal_failure(&self, event: &PaymentRequested) -> Result<(), RepoError>;
}

/// Storage port of the orders service.
#[async_trait::async_trait]
pub trait OrderStore: Send + Sync + 'static {
    /// Persists a new order and, when it is actually inserted, the
    /// matching `PaymentRequested` outbox row in the same transaction.
    ///
    /// When `order.idempotency_key` is present and already used, the
    /// stored order is returned instead (or `KeyMismatch` when the
    /// parameters differ).
    async fn create_order(&self, order: Order) -> Result<CreateOrderOutcome, RepoError>;

    async fn list_orders(
        &self,
        user_id: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Order>, RepoError>;

    async fn get_order(&self, user_id: &str, order_id: OrderId)
        -> Result<Option<Order>, RepoError>;

    /// Consumes one `PaymentResult`: inbox dedup plus the
    /// status-if-still-NEW update, in one transaction.
    async fn apply_payment_result(
        &self,
        event: &PaymentResult,
    ) -> Result<ApplyResultOutcome, RepoError>;
}
