//! Pure domain types for both services.

mod account;
mod order;

pub use account::Account;
pub use order::{Order, OrderId, OrderStatus};

/// Schema limit for client-supplied idempotency keys.
pub const MAX_IDEMPOTENCY_KEY_LEN: usize = 128;
