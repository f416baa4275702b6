//! Payments application service.
//!
//! Orchestrates account commands through the store port. Contains NO
//! infrastructure logic - validation and outcome mapping only.

use pipeline_types::{
    AccountResponse, AccountStore, AppError, CreateAccountOutcome, CreateAccountRequest,
    TopUpOutcome, TopUpRequest, MAX_IDEMPOTENCY_KEY_LEN,
};

/// Application service for account commands.
///
/// Generic over `S: AccountStore` - the adapter is injected at compile
/// time, which keeps the command layer testable against an in-memory
/// store.
pub struct PaymentService<S: AccountStore> {
    store: S,
}

impl<S: AccountStore> PaymentService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Returns a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Creates an account for the user.
    ///
    /// Without a key a duplicate create is `already_exists`; with a key
    /// the command is an idempotent upsert and reports the current
    /// balance either way.
    pub async fn create_account(
        &self,
        req: CreateAccountRequest,
    ) -> Result<AccountResponse, AppError> {
        validate_user_id(&req.user_id)?;
        let key = normalize_key(req.idempotency_key.as_deref())?;

        if key.is_some() {
            let account = self.store.create_account_idempotent(&req.user_id).await?;
            return Ok(AccountResponse {
                user_id: account.user_id,
                balance: account.balance,
            });
        }

        match self.store.create_account(&req.user_id).await? {
            CreateAccountOutcome::Created(account) => Ok(AccountResponse {
                user_id: account.user_id,
                balance: account.balance,
            }),
            CreateAccountOutcome::AlreadyExists => {
                Err(AppError::AlreadyExists("account already exists".into()))
            }
        }
    }

    /// Adds funds to an account, replay-safe when a key is supplied.
    pub async fn top_up(&self, req: TopUpRequest) -> Result<AccountResponse, AppError> {
        validate_user_id(&req.user_id)?;
        if req.amount <= 0 {
            return Err(AppError::InvalidArgument("amount must be > 0".into()));
        }
        let key = normalize_key(req.idempotency_key.as_deref())?;

        let Some(key) = key else {
            return match self.store.top_up(&req.user_id, req.amount).await? {
                Some(account) => Ok(AccountResponse {
                    user_id: account.user_id,
                    balance: account.balance,
                }),
                None => Err(AppError::NotFound("account not found".into())),
            };
        };

        match self
            .store
            .top_up_idempotent(&req.user_id, req.amount, key)
            .await?
        {
            TopUpOutcome::Applied { balance } | TopUpOutcome::Replayed { balance } => {
                Ok(AccountResponse {
                    user_id: req.user_id,
                    balance,
                })
            }
            TopUpOutcome::KeyMismatch => Err(AppError::FailedPrecondition(
                "idempotency key reuse with different parameters".into(),
            )),
            TopUpOutcome::NoAccount => Err(AppError::NotFound("account not found".into())),
        }
    }

    /// Reads the current balance.
    pub async fn get_balance(&self, user_id: &str) -> Result<i64, AppError> {
        validate_user_id(user_id)?;
        self.store
            .get_balance(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("account not found".into()))
    }
}

fn validate_user_id(user_id: &str) -> Result<(), AppError> {
    if user_id.trim().is_empty() {
        return Err(AppError::InvalidArgument("user_id is required".into()));
    }
    Ok(())
}

/// Treats an empty key as absent; rejects keys over the schema limit.
fn normalize_key(key: Option<&str>) -> Result<Option<&str>, AppError> {
    match key {
        None => Ok(None),
        Some("") => Ok(None),
        Some(k) if k.len() > MAX_IDEMPOTENCY_KEY_LEN => Err(AppError::InvalidArgument(
            "idempotency key exceeds the schema limit".into(),
        )),
        Some(k) => Ok(Some(k)),
    }
}
