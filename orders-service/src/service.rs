//! Orders application service.
//!
//! Validation, idempotency outcome mapping, and offset-based paging over
//! the store port. Contains NO infrastructure logic.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

use pipeline_types::{
    AppError, CreateOrderOutcome, CreateOrderRequest, ListOrdersResponse, Order, OrderId,
    OrderStore,
};

/// Default page size when the caller does not specify one.
const DEFAULT_PAGE_LIMIT: i64 = 50;

/// Application service for order commands and reads.
pub struct OrderService<S: OrderStore> {
    store: S,
}

impl<S: OrderStore> OrderService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Returns a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Creates an order and enqueues its payment request atomically.
    ///
    /// With an idempotency key, a replay returns the stored order (and no
    /// second event); reusing the key with different parameters fails the
    /// precondition.
    pub async fn create_order(&self, req: CreateOrderRequest) -> Result<Order, AppError> {
        let key = req.idempotency_key.filter(|k| !k.is_empty());
        let order = Order::new(req.user_id, req.amount, req.description, key)?;

        match self.store.create_order(order).await? {
            CreateOrderOutcome::Created(order) | CreateOrderOutcome::Replayed(order) => Ok(order),
            CreateOrderOutcome::KeyMismatch => Err(AppError::FailedPrecondition(
                "idempotency key reuse with different parameters".into(),
            )),
        }
    }

    /// Lists a user's orders, newest first.
    pub async fn list_orders(
        &self,
        user_id: &str,
        limit: Option<i64>,
        page_token: Option<&str>,
    ) -> Result<ListOrdersResponse, AppError> {
        if user_id.trim().is_empty() {
            return Err(AppError::InvalidArgument("user_id is required".into()));
        }

        let limit = limit.filter(|l| *l > 0).unwrap_or(DEFAULT_PAGE_LIMIT);
        let offset = match page_token {
            Some(token) if !token.is_empty() => decode_offset(token)
                .ok_or_else(|| AppError::InvalidArgument("invalid page_token".into()))?,
            _ => 0,
        };

        let orders = self.store.list_orders(user_id, limit, offset).await?;

        // a full page means there may be more
        let next_page_token =
            (orders.len() as i64 == limit).then(|| encode_offset(offset + limit));

        Ok(ListOrdersResponse {
            orders,
            next_page_token,
        })
    }

    /// Fetches one order scoped to its owner.
    pub async fn get_order(&self, user_id: &str, order_id: &str) -> Result<Order, AppError> {
        if user_id.trim().is_empty() || order_id.is_empty() {
            return Err(AppError::InvalidArgument(
                "user_id and order_id are required".into(),
            ));
        }

        let order_id: OrderId = order_id
            .parse()
            .map_err(|_| AppError::InvalidArgument("invalid order_id".into()))?;

        self.store
            .get_order(user_id, order_id)
            .await?
            .ok_or_else(|| AppError::NotFound("order not found".into()))
    }
}

/// Encodes a paging offset as a base64 decimal token.
pub(crate) fn encode_offset(offset: i64) -> String {
    BASE64.encode(offset.to_string())
}

/// Decodes a base64 decimal paging token.
pub(crate) fn decode_offset(token: &str) -> Option<i64> {
    let bytes = BASE64.decode(token).ok()?;
    let text = std::str::from_utf8(&bytes).ok()?;
    text.parse::<i64>().ok().filter(|n| *n >= 0)
}
