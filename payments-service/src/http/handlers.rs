//! HTTP request handlers.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use pipeline_types::{
    AccountStore, AppError, BalanceResponse, CreateAccountRequest, TopUpRequest,
};

use crate::cache::BalanceCache;
use crate::PaymentService;

/// Application state shared across handlers.
pub struct AppState<S: AccountStore> {
    pub service: PaymentService<S>,
    pub cache: BalanceCache,
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

#[tracing::instrument(skip(state, req), fields(user_id = %req.user_id))]
pub async fn create_account<S: AccountStore>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<CreateAccountRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let resp = state.service.create_account(req).await?;
    state.cache.set(&resp.user_id, resp.balance).await;
    Ok((StatusCode::CREATED, Json(resp)))
}

#[tracing::instrument(skip(state, req), fields(user_id = %req.user_id, amount = req.amount))]
pub async fn top_up<S: AccountStore>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<TopUpRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let resp = state.service.top_up(req).await?;
    state.cache.set(&resp.user_id, resp.balance).await;
    Ok(Json(resp))
}

#[tracing::instrument(skip(state), fields(user_id = %user_id))]
pub async fn get_balance<S: AccountStore>(
    State(state): State<Arc<AppState<S>>>,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    if let Some(balance) = state.cache.get(&user_id).await {
        tracing::debug!("balance cache hit");
        return Ok(Json(BalanceResponse { balance }));
    }

    let balance = state.service.get_balance(&user_id).await?;
    state.cache.set(&user_id, balance).await;
    Ok(Json(BalanceResponse { balance }))
}
