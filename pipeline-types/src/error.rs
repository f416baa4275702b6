//! Error types for the payments pipeline.

/// Domain-level errors (business rule violations).
#[derive(Debug, thiserror::Error)]
pub enum DomainError {
    #[error("user_id is required")]
    EmptyUserId,

    #[error("amount must be > 0")]
    NonPositiveAmount,

    #[error("description is required")]
    EmptyDescription,

    #[error("idempotency key is empty or exceeds the schema limit")]
    InvalidIdempotencyKey,
}

/// Repository-level errors (data access failures).
#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Transaction error: {0}")]
    Transaction(String),

    #[error("Entity not found")]
    NotFound,
}

/// Application-level errors, one variant per RPC status class.
///
/// The HTTP adapter maps these onto response codes; raw database errors
/// never reach a caller.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Precondition failed: {0}")]
    FailedPrecondition(String),

    #[error("Unavailable: {0}")]
    Unavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<RepoError> for AppError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::Domain(e) => AppError::InvalidArgument(e.to_string()),
            RepoError::NotFound => AppError::NotFound("resource not found".into()),
            RepoError::Database(e) => AppError::Internal(e),
            RepoError::Transaction(e) => AppError::Internal(e),
        }
    }
}

impl From<DomainError> for AppError {
    fn from(err: DomainError) -> Self {
        AppError::InvalidArgument(err.to_string())
    }
}
