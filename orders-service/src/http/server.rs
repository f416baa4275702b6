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

use pipeline_types::OrderStore;

use super::handlers::{self, AppState};
use crate::cache::OrderCache;
use crate::OrderService;

/// Request-scoped deadline for RPC handlers.
const REQUEST_DEADLINE: Duration = Duration::from_secs(5);

/// HTTP server for the orders RPC surface.
pub struct HttpServer<S: OrderStore> {
    state: Arc<AppState<S>>,
}

impl<S: OrderStore> HttpServer<S> {
    pub fn new(service: OrderService<S>, cache: OrderCache) -> Self {
        Self {
            state: Arc::new(AppState { service, cache }),
        }
    }

    /// Builds the Axum router with all routes.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/health", get(handlers::health))
            .route("/api/orders", post(handlers::create_order::<S>))
            .route("/api/orders", get(handlers::list_orders::<S>))
            .route("/api/orders/{order_id}", get(handlers::get_order::<S>))
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
