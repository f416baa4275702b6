//! Advisory balance read cache.
//!
//! Reads go cache then database; writes go database then cache. Every
//! cache failure is logged and swallowed - no invariant depends on cache
//! contents, and an empty `cache_addr` disables it entirely.

use std::time::Duration;

use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use tracing::{info, warn};

#[derive(Clone)]
pub struct BalanceCache {
    conn: Option<MultiplexedConnection>,
    ttl: Duration,
}

impl BalanceCache {
    pub fn disabled() -> Self {
        Self {
            conn: None,
            ttl: Duration::ZERO,
        }
    }

    /// Connects to redis; any failure degrades to a disabled cache.
    pub async fn connect(addr: &str, ttl: Duration) -> Self {
        if addr.is_empty() {
            info!("balance cache disabled");
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
                info!(addr, ttl_secs = ttl.as_secs(), "balance cache initialized");
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

    pub async fn get(&self, user_id: &str) -> Option<i64> {
        let mut conn = self.conn.clone()?;
        match conn.get::<_, Option<i64>>(key(user_id)).await {
            Ok(value) => value,
            Err(e) => {
                warn!(user_id, error = %e, "balance cache get failed");
                None
            }
        }
    }

    pub async fn set(&self, user_id: &str, balance: i64) {
        let Some(mut conn) = self.conn.clone() else {
            return;
        };
        if let Err(e) = conn
            .set_ex::<_, _, ()>(key(user_id), balance, self.ttl.as_secs())
            .await
        {
            warn!(user_id, error = %e, "balance cache set failed");
        }
    }
}

fn key(user_id: &str) -> String {
    format!("payments:balance:{user_id}")
}
