//! PostgreSQL adapter for the orders service.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use pipeline_types::{
    ApplyResultOutcome, CreateOrderOutcome, Order, OrderId, OrderStatus, OrderStore,
    PaymentRequested, PaymentResult, RepoError,
};

/// Runs migration statements from a SQL file (split by `--SPLIT--` marker).
async fn run_migrations(pool: &PgPool) -> Result<(), anyhow::Error> {
    let ddl = include_str!("../migrations/0001_create_tables.sql");

    for statement in ddl.split("--SPLIT--") {
        let stmt = statement.trim();
        if !stmt.is_empty() {
            sqlx::query(stmt)
                .execute(pool)
                .await
                .map_err(|e| anyhow::anyhow!("Migration 0001 failed: {}", e))?;
        }
    }

    Ok(())
}

/// Order row from database.
#[derive(FromRow)]
struct OrderRow {
    order_id: Uuid,
    user_id: String,
    amount: i64,
    description: String,
    status: String,
    created_at: DateTime<Utc>,
    idempotency_key: Option<String>,
}

impl OrderRow {
    fn into_domain(self) -> Result<Order, RepoError> {
        let status: OrderStatus = self
            .status
            .parse()
            .map_err(|e: String| RepoError::Database(e))?;

        Ok(Order::from_parts(
            OrderId::from_uuid(self.order_id),
            self.user_id,
            self.amount,
            self.description,
            status,
            self.created_at,
            self.idempotency_key,
        ))
    }
}

const ORDER_COLUMNS: &str =
    "order_id, user_id, amount, description, status, created_at, idempotency_key";

/// PostgreSQL repository for orders and the orders-side inbox/outbox.
///
/// Holds the request topic so that create-order transactions can append
/// their `PaymentRequested` outbox row.
#[derive(Clone)]
pub struct PgOrderRepo {
    pool: PgPool,
    requested_topic: String,
}

impl PgOrderRepo {
    /// Connects and runs migrations.
    pub async fn connect(database_url: &str, requested_topic: String) -> anyhow::Result<Self> {
        let pool = PgPool::connect(database_url).await?;
        run_migrations(&pool).await?;
        Ok(Self {
            pool,
            requested_topic,
        })
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn db_err(e: sqlx::Error) -> RepoError {
        RepoError::Database(e.to_string())
    }

    fn tx_err(e: sqlx::Error) -> RepoError {
        RepoError::Transaction(e.to_string())
    }
}

#[async_trait]
impl OrderStore for PgOrderRepo {
    async fn create_order(&self, order: Order) -> Result<CreateOrderOutcome, RepoError> {
        let mut tx = self.pool.begin().await.map_err(Self::tx_err)?;

        let inserted = if order.idempotency_key.is_some() {
            sqlx::query(
                r#"INSERT INTO orders
                       (order_id, user_id, amount, description, status, created_at, idempotency_key)
                   VALUES ($1, $2, $3, $4, $5, $6, $7)
                   ON CONFLICT (user_id, idempotency_key)
                       WHERE idempotency_key IS NOT NULL
                       DO NOTHING"#,
            )
            .bind(order.order_id.into_uuid())
            .bind(&order.user_id)
            .bind(order.amount)
            .bind(&order.description)
            .bind(order.status.as_str())
            .bind(order.created_at)
            .bind(&order.idempotency_key)
            .execute(&mut *tx)
            .await
            .map_err(Self::db_err)?
            .rows_affected()
                == 1
        } else {
            sqlx::query(
                r#"INSERT INTO orders
                       (order_id, user_id, amount, description, status, created_at)
                   VALUES ($1, $2, $3, $4, $5, $6)"#,
            )
            .bind(order.order_id.into_uuid())
            .bind(&order.user_id)
            .bind(order.amount)
            .bind(&order.description)
            .bind(order.status.as_str())
            .bind(order.created_at)
            .execute(&mut *tx)
            .await
            .map_err(Self::db_err)?;
            true
        };

        if !inserted {
            // The key is taken. A concurrent first attempt has committed
            // its order (and its outbox row) by now; replay it.
            let row: OrderRow = sqlx::query_as(&format!(
                "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = $1 AND idempotency_key = $2"
            ))
            .bind(&order.user_id)
            .bind(&order.idempotency_key)
            .fetch_one(&mut *tx)
            .await
            .map_err(Self::db_err)?;

            tx.commit().await.map_err(Self::tx_err)?;

            let existing = row.into_domain()?;
            if existing.amount != order.amount || existing.description != order.description {
                return Ok(CreateOrderOutcome::KeyMismatch);
            }
            return Ok(CreateOrderOutcome::Replayed(existing));
        }

        // The payment request becomes visible iff the order commits.
        let event = PaymentRequested::new(order.order_id, order.user_id.clone(), order.amount);
        let payload = event
            .encode()
            .map_err(|e| RepoError::Database(format!("encode payment request: {e}")))?;

        pipeline_bus::outbox::enqueue(
            &mut *tx,
            &self.requested_topic,
            &order.order_id.to_string(),
            &payload,
        )
        .await
        .map_err(Self::db_err)?;

        tx.commit().await.map_err(Self::tx_err)?;
        Ok(CreateOrderOutcome::Created(order))
    }

    async fn list_orders(
        &self,
        user_id: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Order>, RepoError> {
        let rows: Vec<OrderRow> = sqlx::query_as(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders
             WHERE user_id = $1
             ORDER BY created_at DESC, order_id
             LIMIT $2 OFFSET $3"
        ))
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(Self::db_err)?;

        rows.into_iter().map(OrderRow::into_domain).collect()
    }

    async fn get_order(
        &self,
        user_id: &str,
        order_id: OrderId,
    ) -> Result<Option<Order>, RepoError> {
        let row: Option<OrderRow> = sqlx::query_as(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE order_id = $1 AND user_id = $2"
        ))
        .bind(order_id.into_uuid())
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Self::db_err)?;

        row.map(OrderRow::into_domain).transpose()
    }

    async fn apply_payment_result(
        &self,
        event: &PaymentResult,
    ) -> Result<ApplyResultOutcome, RepoError> {
        let new_status = OrderStatus::from(event.status);
        let mut tx = self.pool.begin().await.map_err(Self::tx_err)?;

        let inserted = sqlx::query(
            r#"INSERT INTO inbox (message_id) VALUES ($1) ON CONFLICT (message_id) DO NOTHING"#,
        )
        .bind(event.event_id.into_uuid())
        .execute(&mut *tx)
        .await
        .map_err(Self::db_err)?
        .rows_affected();

        if inserted == 0 {
            tx.commit().await.map_err(Self::tx_err)?;
            return Ok(ApplyResultOutcome::AlreadyProcessed);
        }

        // The status guard makes the transition idempotent: an order
        // leaves NEW at most once, and a result for an already-terminal
        // order is absorbed.
        sqlx::query(r#"UPDATE orders SET status = $2 WHERE order_id = $1 AND status = 'NEW'"#)
            .bind(event.order_id.into_uuid())
            .bind(new_status.as_str())
            .execute(&mut *tx)
            .await
            .map_err(Self::db_err)?;

        tx.commit().await.map_err(Self::tx_err)?;
        Ok(ApplyResultOutcome::Applied)
    }
}
