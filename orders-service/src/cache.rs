//! Advisory order read cache.
//!
//! Same policy as the balance cache on the payments side: best-effort
//! only, every failure logged and swallowed, disabled by an empty
//! address. Orders are cached as JSON because the whole row is served
//! back on a hit.

use std::time::Duration;

use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use tracing::{info, warn};

use pipeline_types::{Order, OrderId};

#[derive(Clone)]
pub struct OrderCache {
    conn: Option<MultiplexedConnection>,
    ttl: Duration,
}

impl OrderCache {
    pub fn disabled() -> Self {
        Self {
            conn: None,
            ttl: Duration::ZERO,
        }
    }

    /// Connects to redis; any failure degrades to a disabled cache.
    pub async fn connect(addr: &str, ttl: Duration) -> Self {
        if addr.is_empty() {
            info!("order cache disabled");
            return Self::disabled();
        }

        let client = match redis::Client::open(format!("redis://{addr}")) {
            Ok(client) => client,
            Err(e) => {
                warn!(error = %e, "invalid cache address, continuing without cache");
                return Self::disabled();
            }
        };

        match client.get_multiplexed_async_connection().await {
            Ok(conn) => {
                info!(addr, ttl_secs = ttl.as_secs(), "order cache initialized");
                Self {
                    conn: Some(conn),
                    ttl,
                }
            }
            Err(e) => {
                warn!(error = %e, "cache unreachable, continuing without cache");
                Self::disabled()
            }
        }
    }

    pub async fn get(&self, order_id: OrderId) -> Option<Order> {
        let mut conn = self.conn.clone()?;
        let raw: Option<String> = match conn.get(key(order_id)).await {
            Ok(value) => value,
            Err(e) => {
                warn!(%order_id, error = %e, "order cache get failed");
                return None;
            }
        };

        match raw.map(|json| serde_json::from_str(&json)).transpose() {
            Ok(order) => order,
            Err(e) => {
                warn!(%order_id, error = %e, "order cache entry undecodable");
                None
            }
        }
    }

    pub async fn set(&self, order: &Order) {
        let Some(mut conn) = self.conn.clone() else {
            return;
        };
        let json = match serde_json::to_string(order) {
            Ok(json) => json,
            Err(e) => {
                warn!(order_id = %order.order_id, error = %e, "order cache encode failed");
                return;
            }
        };
        if let Err(e) = conn
            .set_ex::<_, _, ()>(key(order.order_id), json, self.ttl.as_secs())
            .await
        {
            warn!(order_id = %order.order_id, error = %e, "order cache set failed");
        }
    }
}

fn key(order_id: OrderId) -> String {
    format!("orders:order:{order_id}")
}
