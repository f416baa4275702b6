//! HTTP server configuration and startup.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    routing::{get, post},
    Router,
};
use tokio::sync::watch;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use pipeline_types::AccountStore;

use super::handlers::{self, AppState};
use crate::cache::BalanceCache;
use crate::PaymentService;

/// Request-scoped deadline for RPC handlers.
const REQUEST_DEADLINE: Duration = Duration::from_secs(5);

/// HTTP server for the payments RPC surface.
pub struct HttpServer<S: AccountStore> {
    state: Arc<AppState<S>>,
}

impl<S: AccountStore> HttpServer<S> {
    pub fn new(service: PaymentService<S>, cache: BalanceCache) -> Self {
        Self {
            state: Arc::new(AppState { service, cache }),
        }
    }

    /// Builds the Axum router with all routes.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/health", get(handlers::health))
            .route("/api/accounts", post(handlers::create_account::<S>))
            .route("/api/accounts/topup", post(handlers::top_up::<S>))
            .route(
                "/api/accounts/{user_id}/balance",
                get(handlers::get_balance::<S>),
            )
            .layer(TimeoutLayer::new(REQUEST_DEADLINE))
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Runs the server until the shutdown signal flips; in-flight calls
    /// finish, new calls are refused.
    pub async fn run(
        self,
        addr: &str,
        mut shutdown: watch::Receiver<bool>,
    ) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        tracing::info!("server listening on {}", local_addr);

        axum::serve(listener, self.router())
            .with_graceful_shutdown(async move {
                let _ = shutdown.changed().await;
            })
            .await?;

        Ok(())
    }
}
