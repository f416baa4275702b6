//! Account domain model.

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// A user balance account owned by the payments service.
///
/// The balance is a non-negative integer in a single currency unit; every
/// committed state upholds `balance >= 0`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub user_id: String,
    pub balance: i64,
}

impl Account {
    /// Creates a new account with zero balance.
    pub fn new(user_id: String) -> Result<Self, DomainError> {
        if user_id.trim().is_empty() {
            return Err(DomainError::EmptyUserId);
        }
        Ok(Self {
            user_id,
            balance: 0,
        })
    }

    /// Credits (adds) funds to the account.
    pub fn credit(&mut self, amount: i64) {
        self.balance = self.balance.saturating_add(amount);
    }

    /// Debits the account if it holds at least `amount`.
    ///
    /// Returns whether the debit happened; the balance never goes
    /// negative.
    pub fn try_debit(&mut self, amount: i64) -> bool {
        if self.balance < amount {
            return false;
        }
        self.balance -= amount;
        true
    }
}
