//! `PaymentResult` consumer handler.
//!
//! Drives the order state machine: SUCCESS finishes the order, every
//! failure class cancels it. Dedup and the status-if-still-NEW update are
//! one store transaction; a handler error aborts it and the message is
//! redelivered, so an order never sits in an intermediate state.

use pipeline_bus::{InboundMessage, MessageHandler};
use pipeline_types::{ApplyResultOutcome, OrderStatus, OrderStore, PaymentResult};
use tracing::{info, warn};

pub struct PaymentResultHandler<S: OrderStore> {
    store: S,
}

impl<S: OrderStore> PaymentResultHandler<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }
}

#[async_trait::async_trait]
impl<S: OrderStore> MessageHandler for PaymentResultHandler<S> {
    #[tracing::instrument(skip(self, message), fields(offset = message.offset))]
    async fn handle(&self, message: InboundMessage<'_>, _attempt: u32) -> anyhow::Result<()> {
        let event = match PaymentResult::decode(message.payload) {
            Ok(event) => event,
            Err(e) => {
                // Poison: absorb so the offset commits, otherwise the
                // message redelivers forever.
                warn!(error = %e, "undecodable payment result dropped");
                return Ok(());
            }
        };

        match self.store.apply_payment_result(&event).await? {
            ApplyResultOutcome::AlreadyProcessed => {
                info!(event_id = %event.event_id, "payment result already processed")
            }
            ApplyResultOutcome::Applied => {
                info!(
                    order_id = %event.order_id,
                    status = %OrderStatus::from(event.status),
                    reason = %event.reason,
                    "order finalized"
                )
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pipeline_types::{CreateOrderRequest, Order, PaymentResultStatus};

    use super::*;
    use crate::service_tests::tests::MockOrderStore;
    use crate::OrderService;

    fn msg(payload: &[u8]) -> InboundMessage<'_> {
        InboundMessage {
            topic: "payments.payment_result.v1",
            partition: 0,
            offset: 0,
            payload,
        }
    }

    async fn seeded_order(store: &MockOrderStore) -> Order {
        let svc = OrderService::new(store.clone());
        svc.create_order(CreateOrderRequest {
            user_id: "u1".into(),
            amount: 300,
            description: "book".into(),
            idempotency_key: None,
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_success_result_finishes_order() {
        let store = MockOrderStore::new();
        let order = seeded_order(&store).await;
        let h = PaymentResultHandler::new(store.clone());

        let event = PaymentResult::new(
            order.order_id,
            "u1".into(),
            PaymentResultStatus::Success,
            "",
        );
        h.handle(msg(&event.encode().unwrap()), 1).await.unwrap();

        assert_eq!(store.status_of(order.order_id), Some(OrderStatus::Finished));
    }

    #[tokio::test]
    async fn test_failure_result_cancels_order() {
        let store = MockOrderStore::new();
        let order = seeded_order(&store).await;
        let h = PaymentResultHandler::new(store.clone());

        let event = PaymentResult::new(
            order.order_id,
            "u1".into(),
            PaymentResultStatus::FailNotEnoughFunds,
            "not enough funds",
        );
        h.handle(msg(&event.encode().unwrap()), 1).await.unwrap();

        assert_eq!(
            store.status_of(order.order_id),
            Some(OrderStatus::Cancelled)
        );
    }

    #[tokio::test]
    async fn test_duplicate_delivery_transitions_once() {
        let store = MockOrderStore::new();
        let order = seeded_order(&store).await;
        let h = PaymentResultHandler::new(store.clone());

        let event = PaymentResult::new(
            order.order_id,
            "u1".into(),
            PaymentResultStatus::Success,
            "",
        );
        let payload = event.encode().unwrap();
        h.handle(msg(&payload), 1).await.unwrap();
        h.handle(msg(&payload), 1).await.unwrap();

        assert_eq!(store.status_of(order.order_id), Some(OrderStatus::Finished));
        assert_eq!(store.transition_count(order.order_id), 1);
    }

    #[tokio::test]
    async fn test_terminal_order_absorbs_late_result() {
        let store = MockOrderStore::new();
        let order = seeded_order(&store).await;
        let h = PaymentResultHandler::new(store.clone());

        let success = PaymentResult::new(
            order.order_id,
            "u1".into(),
            PaymentResultStatus::Success,
            "",
        );
        h.handle(msg(&success.encode().unwrap()), 1).await.unwrap();

        // a different event for the same order: new inbox entry, but the
        // NEW guard leaves the terminal state untouched
        let late = PaymentResult::new(
            order.order_id,
            "u1".into(),
            PaymentResultStatus::FailInternal,
            "internal error",
        );
        h.handle(msg(&late.encode().unwrap()), 1).await.unwrap();

        assert_eq!(store.status_of(order.order_id), Some(OrderStatus::Finished));
        assert_eq!(store.transition_count(order.order_id), 1);
    }

    #[tokio::test]
    async fn test_undecodable_payload_is_absorbed() {
        let store = MockOrderStore::new();
        let h = PaymentResultHandler::new(store);
        h.handle(msg(b"{\"status\":\"MAYBE\"}"), 1).await.unwrap();
    }
}
