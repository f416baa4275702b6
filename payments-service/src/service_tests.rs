//! PaymentService unit tests.

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;

    use async_trait::async_trait;

    use pipeline_types::{
        Account, AccountStore, AppError, CreateAccountOutcome, CreateAccountRequest, DebitOutcome,
        EventId, OrderId, PaymentRequested, PaymentResult, PaymentResultStatus, RepoError,
        TopUpOutcome, TopUpRequest,
    };

    use crate::PaymentService;

    /// In-memory account store mirroring the Postgres adapter's
    /// transactional semantics: inbox dedup, per-order operation guard,
    /// debit only with sufficient funds.
    pub(crate) struct MockAccountStore {
        accounts: Mutex<HashMap<String, i64>>,
        topup_keys: Mutex<HashMap<(String, String), (i64, i64)>>,
        inbox: Mutex<HashSet<EventId>>,
        operations: Mutex<HashMap<OrderId, i64>>,
        results: Mutex<Vec<PaymentResult>>,
    }

    impl MockAccountStore {
        pub(crate) fn new() -> Self {
            Self {
                accounts: Mutex::new(HashMap::new()),
                topup_keys: Mutex::new(HashMap::new()),
                inbox: Mutex::new(HashSet::new()),
                operations: Mutex::new(HashMap::new()),
                results: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn seed_account(&self, user_id: &str, balance: i64) {
            self.accounts
                .lock()
                .unwrap()
                .insert(user_id.to_string(), balance);
        }

        pub(crate) fn balance_of(&self, user_id: &str) -> Option<i64> {
            self.accounts.lock().unwrap().get(user_id).copied()
        }

        pub(crate) fn results(&self) -> Vec<PaymentResult> {
            self.results.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl AccountStore for MockAccountStore {
        async fn create_account(&self, user_id: &str) -> Result<CreateAccountOutcome, RepoError> {
            let mut accounts = self.accounts.lock().unwrap();
            if accounts.contains_key(user_id) {
                return Ok(CreateAccountOutcome::AlreadyExists);
            }
            accounts.insert(user_id.to_string(), 0);
            Ok(CreateAccountOutcome::Created(Account {
                user_id: user_id.to_string(),
                balance: 0,
            }))
        }

        async fn create_account_idempotent(&self, user_id: &str) -> Result<Account, RepoError> {
            let mut accounts = self.accounts.lock().unwrap();
            let balance = *accounts.entry(user_id.to_string()).or_insert(0);
            Ok(Account {
                user_id: user_id.to_string(),
                balance,
            })
        }

        async fn top_up(&self, user_id: &str, amount: i64) -> Result<Option<Account>, RepoError> {
            let mut accounts = self.accounts.lock().unwrap();
            match accounts.get_mut(user_id) {
                Some(balance) => {
                    *balance += amount;
                    Ok(Some(Account {
                        user_id: user_id.to_string(),
                        balance: *balance,
                    }))
                }
                None => Ok(None),
            }
        }

        async fn top_up_idempotent(
            &self,
            user_id: &str,
            amount: i64,
            key: &str,
        ) -> Result<TopUpOutcome, RepoError> {
            let mut keys = self.topup_keys.lock().unwrap();
            let slot = (user_id.to_string(), key.to_string());

            if let Some((stored_amount, balance_after)) = keys.get(&slot) {
                if *stored_amount != amount {
                    return Ok(TopUpOutcome::KeyMismatch);
                }
                return Ok(TopUpOutcome::Replayed {
                    balance: *balance_after,
                });
            }

            let mut accounts = self.accounts.lock().unwrap();
            match accounts.get_mut(user_id) {
                Some(balance) => {
                    *balance += amount;
                    keys.insert(slot, (amount, *balance));
                    Ok(TopUpOutcome::Applied { balance: *balance })
                }
                // idempotency row rolled back, key stays reusable
                None => Ok(TopUpOutcome::NoAccount),
            }
        }

        async fn get_balance(&self, user_id: &str) -> Result<Option<i64>, RepoError> {
            Ok(self.accounts.lock().unwrap().get(user_id).copied())
        }

        async fn apply_payment_requested(
            &self,
            event: &PaymentRequested,
        ) -> Result<DebitOutcome, RepoError> {
            if !self.inbox.lock().unwrap().insert(event.event_id) {
                return Ok(DebitOutcome::AlreadyProcessed);
            }

            let mut accounts = self.accounts.lock().unwrap();
            let mut operations = self.operations.lock().unwrap();

            let op_inserted = !operations.contains_key(&event.order_id)
                && accounts
                    .get(event.user_id.as_str())
                    .is_some_and(|b| *b >= event.amount);

            let (status, reason, outcome) = if op_inserted {
                operations.insert(event.order_id, event.amount);
                *accounts.get_mut(event.user_id.as_str()).unwrap() -= event.amount;
                (PaymentResultStatus::Success, "", DebitOutcome::Debited)
            } else if accounts.contains_key(event.user_id.as_str()) {
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
            };

            self.results.lock().unwrap().push(PaymentResult::new(
                event.order_id,
                event.user_id.clone(),
                status,
                reason,
            ));
            Ok(outcome)
        }

        async fn record_internal_failure(&self, event: &PaymentRequested) -> Result<(), RepoError> {
            if !self.inbox.lock().unwrap().insert(event.event_id) {
                return Ok(());
            }
            self.results.lock().unwrap().push(PaymentResult::new(
                event.order_id,
                event.user_id.clone(),
                PaymentResultStatus::FailInternal,
                "internal error",
            ));
            Ok(())
        }
    }

    fn service() -> PaymentService<MockAccountStore> {
        PaymentService::new(MockAccountStore::new())
    }

    fn create_req(user: &str, key: Option<&str>) -> CreateAccountRequest {
        CreateAccountRequest {
            user_id: user.to_string(),
            idempotency_key: key.map(String::from),
        }
    }

    fn topup_req(user: &str, amount: i64, key: Option<&str>) -> TopUpRequest {
        TopUpRequest {
            user_id: user.to_string(),
            amount,
            idempotency_key: key.map(String::from),
        }
    }

    #[tokio::test]
    async fn test_create_account_starts_at_zero() {
        let svc = service();
        let resp = svc.create_account(create_req("u1", Some("k1"))).await.unwrap();
        assert_eq!(resp.user_id, "u1");
        assert_eq!(resp.balance, 0);
    }

    #[tokio::test]
    async fn test_plain_double_create_conflicts() {
        let svc = service();
        svc.create_account(create_req("u1", None)).await.unwrap();
        let err = svc.create_account(create_req("u1", None)).await.unwrap_err();
        assert!(matches!(err, AppError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn test_keyed_create_is_idempotent() {
        let svc = service();
        svc.create_account(create_req("u1", Some("k1"))).await.unwrap();
        svc.store().seed_account("u1", 500);
        // repeated create reports the current balance, not an error
        let resp = svc.create_account(create_req("u1", Some("k1"))).await.unwrap();
        assert_eq!(resp.balance, 500);
    }

    #[tokio::test]
    async fn test_create_account_requires_user() {
        let svc = service();
        let err = svc.create_account(create_req("", None)).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_top_up_credits_account() {
        let svc = service();
        svc.create_account(create_req("u1", None)).await.unwrap();
        let resp = svc.top_up(topup_req("u1", 1000, Some("k2"))).await.unwrap();
        assert_eq!(resp.balance, 1000);
    }

    #[tokio::test]
    async fn test_top_up_rejects_non_positive_amount() {
        let svc = service();
        for amount in [0, -10] {
            let err = svc.top_up(topup_req("u1", amount, None)).await.unwrap_err();
            assert!(matches!(err, AppError::InvalidArgument(_)));
        }
    }

    #[tokio::test]
    async fn test_top_up_missing_account_is_not_found() {
        let svc = service();
        let err = svc.top_up(topup_req("ghost", 50, None)).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_keyed_top_up_replays_same_balance() {
        let svc = service();
        svc.create_account(create_req("u1", None)).await.unwrap();

        let first = svc.top_up(topup_req("u1", 50, Some("k6"))).await.unwrap();
        let second = svc.top_up(topup_req("u1", 50, Some("k6"))).await.unwrap();

        // one effect, identical responses
        assert_eq!(first.balance, 50);
        assert_eq!(second.balance, 50);
        assert_eq!(svc.store().balance_of("u1"), Some(50));
    }

    #[tokio::test]
    async fn test_keyed_top_up_mismatch_is_precondition_failure() {
        let svc = service();
        svc.create_account(create_req("u1", None)).await.unwrap();
        svc.top_up(topup_req("u1", 50, Some("k7"))).await.unwrap();

        let err = svc.top_up(topup_req("u1", 51, Some("k7"))).await.unwrap_err();
        assert!(matches!(err, AppError::FailedPrecondition(_)));
        assert_eq!(svc.store().balance_of("u1"), Some(50));
    }

    #[tokio::test]
    async fn test_keyed_top_up_key_survives_missing_account() {
        let svc = service();
        let err = svc.top_up(topup_req("u1", 50, Some("k8"))).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        // after the account exists, the same key succeeds
        svc.create_account(create_req("u1", None)).await.unwrap();
        let resp = svc.top_up(topup_req("u1", 50, Some("k8"))).await.unwrap();
        assert_eq!(resp.balance, 50);
    }

    #[tokio::test]
    async fn test_oversized_idempotency_key_rejected() {
        let svc = service();
        let long_key = "k".repeat(pipeline_types::MAX_IDEMPOTENCY_KEY_LEN + 1);
        let err = svc
            .top_up(topup_req("u1", 50, Some(&long_key)))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_get_balance() {
        let svc = service();
        svc.store().seed_account("u1", 700);
        assert_eq!(svc.get_balance("u1").await.unwrap(), 700);
        assert!(matches!(
            svc.get_balance("ghost").await.unwrap_err(),
            AppError::NotFound(_)
        ));
        assert!(matches!(
            svc.get_balance("").await.unwrap_err(),
            AppError::InvalidArgument(_)
        ));
    }
}
