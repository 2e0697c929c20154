//! Incident Store error type.

use thiserror::Error;

/// Errors surfaced by Incident Store operations.
#[derive(Error, Debug, Clone)]
pub enum StoreError {
    /// The authoritative backing store could not be reached or returned a
    /// failure; per spec §4.1 this must never silently degrade for
    /// authoritative keys (`orchestrator:incident:*`).
    #[error("store unavailable: {message}")]
    Unavailable {
        /// Description of the underlying failure.
        message: String,
    },

    /// A value stored under `key` could not be deserialized into the
    /// expected shape.
    #[error("corrupt value at key {key}: {message}")]
    Corrupt {
        /// The offending key.
        key: String,
        /// Description of the deserialization failure.
        message: String,
    },

    /// The requested key does not exist.
    #[error("key not found: {0}")]
    NotFound(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        Self::Unavailable {
            message: err.to_string(),
        }
    }
}
