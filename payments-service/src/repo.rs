//! PostgreSQL adapter for the payments service.

use async_trait::async_trait;
use sqlx::{FromRow, PgPool};

use pipeline_types::{
    Account, AccountStore, CreateAccountOutcome, DebitOutcome, PaymentRequested, PaymentResult,
    PaymentResultStatus, RepoError, TopUpOutcome,
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

#[derive(FromRow)]
struct AccountRow {
    user_id: String,
    balance: i64,
}

impl AccountRow {
    fn into_domain(self) -> Account {
        Account {
            user_id: self.user_id,
            balance: self.balance,
        }
    }
}

#[derive(FromRow)]
struct TopupIdemRow {
    amount: i64,
    balance_after: i64,
}

/// PostgreSQL repository for accounts, debits, and the payments-side
/// inbox/outbox.
///
/// Holds the result topic so that debit transactions can append their
/// `PaymentResult` outbox row without threading configuration through
/// every call.
#[derive(Clone)]
pub struct PgAccountRepo {
    pool: PgPool,
    result_topic: String,
}

impl PgAccountRepo {
    /// Connects and runs migrations.
    pub async fn connect(database_url: &str, result_topic: String) -> anyhow::Result<Self> {
        let pool = PgPool::connect(database_url).await?;
        run_migrations(&pool).await?;
        Ok(Self { pool, result_topic })
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
impl AccountStore for PgAccountRepo {
    async fn create_account(&self, user_id: &str) -> Result<CreateAccountOutcome, RepoError> {
        let row: Option<AccountRow> = sqlx::query_as(
            r#"INSERT INTO accounts (user_id, balance) VALUES ($1, 0)
               ON CONFLICT (user_id) DO NOTHING
               RETURNING user_id, balance"#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Self::db_err)?;

        Ok(match row {
            Some(r) => CreateAccountOutcome::Created(r.into_domain()),
            None => CreateAccountOutcome::AlreadyExists,
        })
    }

    async fn create_account_idempotent(&self, user_id: &str) -> Result<Account, RepoError> {
        // The no-op DO UPDATE makes the statement return the existing row
        // instead of nothing, so a repeated create is not an error.
        let row: AccountRow = sqlx::query_as(
            r#"INSERT INTO accounts (user_id, balance) VALUES ($1, 0)
               ON CONFLICT (user_id) DO UPDATE SET balance = accounts.balance
               RETURNING user_id, balance"#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(Self::db_err)?;

        Ok(row.into_domain())
    }

    async fn top_up(&self, user_id: &str, amount: i64) -> Result<Option<Account>, RepoError> {
        let row: Option<AccountRow> = sqlx::query_as(
            r#"UPDATE accounts SET balance = balance + $2 WHERE user_id = $1
               RETURNING user_id, balance"#,
        )
        .bind(user_id)
        .bind(amount)
        .fetch_optional(&self.pool)
        .await
        .map_err(Self::db_err)?;

        Ok(row.map(AccountRow::into_domain))
    }

    async fn top_up_idempotent(
        &self,
        user_id: &str,
        amount: i64,
        key: &str,
    ) -> Result<TopUpOutcome, RepoError> {
        let mut tx = self.pool.begin().await.map_err(Self::tx_err)?;

        let inserted = sqlx::query(
            r#"INSERT INTO topup_idempotency (user_id, idempotency_key, amount, balance_after)
               VALUES ($1, $2, $3, 0)
               ON CONFLICT (user_id, idempotency_key) DO NOTHING"#,
        )
        .bind(user_id)
        .bind(key)
        .bind(amount)
        .execute(&mut *tx)
        .await
        .map_err(Self::db_err)?
        .rows_affected();

        if inserted == 0 {
            // Replay. A concurrent first attempt has already committed by
            // the time the conflicting insert returns, so the stored
            // balance_after is final.
            let stored: TopupIdemRow = sqlx::query_as(
                r#"SELECT amount, balance_after FROM topup_idempotency
                   WHERE user_id = $1 AND idempotency_key = $2"#,
            )
            .bind(user_id)
            .bind(key)
            .fetch_one(&mut *tx)
            .await
            .map_err(Self::db_err)?;

            tx.commit().await.map_err(Self::tx_err)?;

            if stored.amount != amount {
                return Ok(TopUpOutcome::KeyMismatch);
            }
            return Ok(TopUpOutcome::Replayed {
                balance: stored.balance_after,
            });
        }

        let account: Option<AccountRow> = sqlx::query_as(
            r#"UPDATE accounts SET balance = balance + $2 WHERE user_id = $1
               RETURNING user_id, balance"#,
        )
        .bind(user_id)
        .bind(amount)
        .fetch_optional(&mut *tx)
        .await
        .map_err(Self::db_err)?;

        let Some(account) = account else {
            // No account: remove the idempotency row so a retry after
            // account creation can reuse the same key.
            sqlx::query(
                r#"DELETE FROM topup_idempotency WHERE user_id = $1 AND idempotency_key = $2"#,
            )
            .bind(user_id)
            .bind(key)
            .execute(&mut *tx)
            .await
            .map_err(Self::db_err)?;

            tx.commit().await.map_err(Self::tx_err)?;
            return Ok(TopUpOutcome::NoAccount);
        };

        sqlx::query(
            r#"UPDATE topup_idempotency SET balance_after = $3
               WHERE user_id = $1 AND idempotency_key = $2"#,
        )
        .bind(user_id)
        .bind(key)
        .bind(account.balance)
        .execute(&mut *tx)
        .await
        .map_err(Self::db_err)?;

        tx.commit().await.map_err(Self::tx_err)?;
        Ok(TopUpOutcome::Applied {
            balance: account.balance,
        })
    }

    async fn get_balance(&self, user_id: &str) -> Result<Option<i64>, RepoError> {
        sqlx::query_scalar(r#"SELECT balance FROM accounts WHERE user_id = $1"#)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Self::db_err)
    }

    async fn apply_payment_requested(
        &self,
        event: &PaymentRequested,
    ) -> Result<DebitOutcome, RepoError> {
        let mut tx = self.pool.begin().await.map_err(Self::tx_err)?;

        let inserted = sqlx::query(
            r#"INSERT INTO inbox (message_id, order_id) VALUES ($1, $2)
               ON CONFLICT (message_id) DO NOTHING"#,
        )
        .bind(event.event_id.into_uuid())
        .bind(event.order_id.into_uuid())
        .execute(&mut *tx)
        .await
        .map_err(Self::db_err)?
        .rows_affected();

        if inserted == 0 {
            // Redelivery: the original processing already enqueued its
            // result. Committing keeps the offset moving forward.
            tx.commit().await.map_err(Self::tx_err)?;
            return Ok(DebitOutcome::AlreadyProcessed);
        }

        // Debit-or-nothing. The candidate lock serializes concurrent
        // debits for the account; after a lock wait the balance predicate
        // is re-evaluated against the committed row, so the balance can
        // never go negative. The operation row doubles as a per-order
        // double-debit guard.
        let op_inserted: i64 = sqlx::query_scalar(
            r#"WITH candidate AS (
                   SELECT user_id FROM accounts
                   WHERE user_id = $2 AND balance >= $3
                   FOR UPDATE
               ), op AS (
                   INSERT INTO payment_operations (order_id, user_id, amount)
                   SELECT $1, user_id, $3 FROM candidate
                   ON CONFLICT (order_id) DO NOTHING
                   RETURNING order_id
               ), debited AS (
                   UPDATE accounts SET balance = balance - $3
                   FROM op
                   WHERE accounts.user_id = $2
                   RETURNING accounts.balance
               )
               SELECT count(*) FROM op"#,
        )
        .bind(event.order_id.into_uuid())
        .bind(&event.user_id)
        .bind(event.amount)
        .fetch_one(&mut *tx)
        .await
        .map_err(Self::db_err)?;

        let (status, reason, outcome) = if op_inserted == 1 {
            (PaymentResultStatus::Success, "", DebitOutcome::Debited)
        } else {
            let exists: bool =
                sqlx::query_scalar(r#"SELECT EXISTS (SELECT 1 FROM accounts WHERE user_id = $1)"#)
                    .bind(&event.user_id)
                    .fetch_one(&mut *tx)
                    .await
                    .map_err(Self::db_err)?;

            if exists {
                (
                    PaymentResultStatus::FailNotEnoughFunds,
                    "not enough funds",
                    DebitOutcome::InsufficientFunds,
                )
            } else {
                (
                    PaymentResultStatus::FailNoAccount,
                    "account not found",
                    DebitOutcome::NoAccount,
                )
            }
        };

        let result = PaymentResult::new(event.order_id, event.user_id.clone(), status, reason);
        let payload = result
            .encode()
            .map_err(|e| RepoError::Database(format!("encode payment result: {e}")))?;

        pipeline_bus::outbox::enqueue(
            &mut *tx,
            &self.result_topic,
            &event.order_id.to_string(),
            &payload,
        )
        .await
        .map_err(Self::db_err)?;

        tx.commit().await.map_err(Self::tx_err)?;
        Ok(outcome)
    }

    async fn record_internal_failure(&self, event: &PaymentRequested) -> Result<(), RepoError> {
        let mut tx = self.pool.begin().await.map_err(Self::tx_err)?;

        let inserted = sqlx::query(
            r#"INSERT INTO inbox (message_id, order_id) VALUES ($1, $2)
               ON CONFLICT (message_id) DO NOTHING"#,
        )
        .bind(event.event_id.into_uuid())
        .bind(event.order_id.into_uuid())
        .execute(&mut *tx)
        .await
        .map_err(Self::db_err)?
        .rows_affected();

        if inserted == 0 {
            tx.commit().await.map_err(Self::tx_err)?;
            return Ok(());
        }

        let result = PaymentResult::new(
            event.order_id,
            event.user_id.clone(),
            PaymentResultStatus::FailInternal,
            "internal error",
        );
        let payload = result
            .encode()
            .map_err(|e| RepoError::Database(format!("encode payment result: {e}")))?;

        pipeline_bus::outbox::enqueue(
            &mut *tx,
            &self.result_topic,
            &event.order_id.to_string(),
            &payload,
        )
        .await
        .map_err(Self::db_err)?;

        tx.commit().await.map_err(Self::tx_err)?;
        Ok(())
    }
}
