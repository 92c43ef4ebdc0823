//! Error types for Log Store operations.
//!
//! Backend errors (`sqlx::Error`, `redis::RedisError`) are folded into
//! [`StoreError`] so handlers deal with a single type.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The store could not be opened or reached.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// A query or command was rejected by the backend.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// A persisted row could not be decoded back into an entry.
    #[error("Corrupt record {id}: {reason}")]
    CorruptRecord { id: i64, reason: String },

    /// All pooled connections stayed busy past the acquire timeout.
    #[error("Connection pool exhausted")]
    PoolExhausted,

    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Redis: {0}")]
    Redis(#[from] redis::RedisError),
}

impl StoreError {
    pub fn corrupt(id: i64, reason: impl Into<String>) -> Self {
        StoreError::CorruptRecord {
            id,
            reason: reason.into(),
        }
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_err) => StoreError::QueryFailed(db_err.message().to_string()),
            sqlx::Error::PoolTimedOut => StoreError::PoolExhausted,
            sqlx::Error::PoolClosed => StoreError::ConnectionFailed("Pool is closed".to_string()),
            sqlx::Error::Io(e) => StoreError::ConnectionFailed(e.to_string()),
            _ => StoreError::QueryFailed(err.to_string()),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
