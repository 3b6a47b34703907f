//! Error types shared by the transaction boundary components.

use thiserror::Error;

/// Failure of the transaction primitive itself (begin, commit or rollback).
///
/// Always fatal to the current unit of work. Callers receive it through
/// their own error type via `From<BackendError>`.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("A transaction is already open on this connection")]
    AlreadyInTransaction,

    #[error("No transaction is open on this connection")]
    NotInTransaction,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Transaction backend unavailable: {0}")]
    Unavailable(String),
}

impl BackendError {
    /// Stable error name for API responses and logs.
    pub fn code(&self) -> &'static str {
        match self {
            BackendError::AlreadyInTransaction => "ALREADY_IN_TRANSACTION",
            BackendError::NotInTransaction => "NOT_IN_TRANSACTION",
            BackendError::Database(_) => "DATABASE_ERROR",
            BackendError::Unavailable(_) => "BACKEND_UNAVAILABLE",
        }
    }
}

/// A proxied call named a method the target does not define.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Method `{method}` is not defined on {target}")]
pub struct NoSuchMethod {
    pub method: String,
    pub target: &'static str,
}

impl NoSuchMethod {
    pub fn new(method: impl Into<String>, target: &'static str) -> Self {
        Self {
            method: method.into(),
            target,
        }
    }
}
