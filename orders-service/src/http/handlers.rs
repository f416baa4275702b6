//! HTTP request handlers.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;

use pipeline_types::{AppError, CreateOrderRequest, OrderStore};

use crate::cache::OrderCache;
use crate::OrderService;

/// Application state shared across handlers.
pub struct AppState<S: OrderStore> {
    pub service: OrderService<S>,
    pub cache: OrderCache,
}

/// Wrapper to implement IntoResponse for AppError (orphan rule workaround).
pub struct ApiError(pub AppError);

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            AppError::InvalidArgument(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::AlreadyExists(msg) => (StatusCode::CONFLICT, msg.clone()),
            AppError::FailedPrecondition(msg) => (StatusCode::PRECONDITION_FAILED, msg.clone()),
            AppError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg.clone()),
            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal error".to_string(),
            ),
        };

        let body = serde_json::json!({
            "error": message,
            "code": status.as_u16()
        });

        (status, Json(body)).into_response()
    }
}

/// Health check endpoint.
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "healthy" }))
}

#[tracing::instrument(skip(state, req), fields(user_id = %req.user_id, amount = req.amount))]
pub async fn create_order<S: OrderStore>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<CreateOrderRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let order = state.service.create_order(req).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

#[derive(Debug, Deserialize)]
pub struct ListOrdersQuery {
    pub user_id: String,
    pub limit: Option<i64>,
    pub page_token: Option<String>,
}

#[tracing::instrument(skip(state, query), fields(user_id = %query.user_id))]
pub async fn list_orders<S: OrderStore>(
    State(state): State<Arc<AppState<S>>>,
    Query(query): Query<ListOrdersQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let page = state
        .service
        .list_orders(&query.user_id, query.limit, query.page_token.as_deref())
        .await?;
    Ok(Json(page))
}

#[derive(Debug, Deserialize)]
pub struct GetOrderQuery {
    pub user_id: String,
}

#[tracing::instrument(skip(state, query), fields(user_id = %query.user_id, order_id = %order_id))]
pub async fn get_order<S: OrderStore>(
    State(state): State<Arc<AppState<S>>>,
    Path(order_id): Path<String>,
    Query(query): Query<GetOrderQuery>,
) -> Result<impl IntoResponse, ApiError> {
    if let Ok(id) = order_id.parse() {
        if let Some(cached) = state.cache.get(id).await {
            if cached.user_id == query.user_id {
                tracing::debug!("order cache hit");
                return Ok(Json(cached));
            }
        }
    }

    let order = state.service.get_order(&query.user_id, &order_id).await?;
    state.cache.set(&order).await;
    Ok(Json(order))
}
