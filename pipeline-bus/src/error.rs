//! Bus-layer error type.

#[derive(Debug, thiserror::Error)]
pub enum BusError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Publish error: {0}")]
    Publish(String),

    #[error("Subscribe error: {0}")]
    Subscribe(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<sqlx::Error> for BusError {
    fn from(err: sqlx::Error) -> Self {
        BusError::Database(err.to_string())
    }
}
