//! `PaymentRequested` consumer handler.
//!
//! The whole side effect - inbox dedup, atomic debit-or-classify, result
//! outbox append - is one store transaction. The handler decides what is
//! poison (absorbed), what is retryable (error, no offset commit), and
//! when the redelivery budget is spent.

use pipeline_bus::{InboundMessage, MessageHandler};
use pipeline_types::{AccountStore, DebitOutcome, PaymentRequested};
use tracing::{error, info, warn};

/// Redeliveries of one message before it is resolved as FAIL_INTERNAL.
pub const DEFAULT_ATTEMPT_BUDGET: u32 = 5;

pub struct PaymentRequestedHandler<S: AccountStore> {
    store: S,
    attempt_budget: u32,
}

impl<S: AccountStore> PaymentRequestedHandler<S> {
    pub fn new(store: S, attempt_budget: u32) -> Self {
        Self {
            store,
            attempt_budget,
        }
    }
}

#[async_trait::async_trait]
impl<S: AccountStore> MessageHandler for PaymentRequestedHandler<S> {
    #[tracing::instrument(skip(self, message), fields(offset = message.offset))]
    async fn handle(&self, message: InboundMessage<'_>, attempt: u32) -> anyhow::Result<()> {
        let event = match PaymentRequested::decode(message.payload) {
            Ok(event) => event,
            Err(e) => {
                // Poison: absorb so the offset commits, otherwise the
                // message redelivers forever.
                warn!(error = %e, "undecodable payment request dropped");
                return Ok(());
            }
        };

        if !event.is_structurally_valid() {
            warn!(
                event_id = %event.event_id,
                user_id = %event.user_id,
                amount = event.amount,
                "structurally invalid payment request dropped"
            );
            return Ok(());
        }

        if attempt > self.attempt_budget {
            error!(
                event_id = %event.event_id,
                order_id = %event.order_id,
                attempt,
                "redelivery budget exhausted, resolving as internal failure"
            );
            self.store.record_internal_failure(&event).await?;
            return Ok(());
        }

        match self.store.apply_payment_requested(&event).await? {
            DebitOutcome::AlreadyProcessed => {
                info!(event_id = %event.event_id, "payment request already processed")
            }
            DebitOutcome::Debited => {
                info!(order_id = %event.order_id, amount = event.amount, "debit applied")
            }
            DebitOutcome::NoAccount => {
                info!(order_id = %event.order_id, "debit refused: account not found")
            }
            DebitOutcome::InsufficientFunds => {
                info!(order_id = %event.order_id, "debit refused: not enough funds")
            }
        }
        Ok(())
    }
}
