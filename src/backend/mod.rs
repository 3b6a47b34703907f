//! Transaction Backends
//!
//! The transactional primitive the boundary components drive. A backend is
//! bound to one execution context (one request, one service call chain) and
//! exposes a single-level transaction: no nesting, no savepoints.

pub mod postgres;

pub use postgres::{PgBackend, PgTxGuard};

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::BackendError;

/// Single-level transaction primitive.
#[async_trait]
pub trait TransactionBackend: Send + Sync {
    /// Open a transaction on the bound connection.
    async fn begin(&self) -> Result<(), BackendError>;

    /// Make the open transaction durable.
    async fn commit(&self) -> Result<(), BackendError>;

    /// Discard the open transaction.
    async fn rollback(&self) -> Result<(), BackendError>;

    /// Discard the open transaction without awaiting.
    ///
    /// Called from `Drop` when a unit of work is cancelled between `begin` and
    /// its commit/rollback decision. Must never commit.
    fn abandon(&self);
}

#[async_trait]
impl<T> TransactionBackend for &T
where
    T: TransactionBackend + ?Sized,
{
    async fn begin(&self) -> Result<(), BackendError> {
        (**self).begin().await
    }

    async fn commit(&self) -> Result<(), BackendError> {
        (**self).commit().await
    }

    async fn rollback(&self) -> Result<(), BackendError> {
        (**self).rollback().await
    }

    fn abandon(&self) {
        (**self).abandon()
    }
}

#[async_trait]
impl<T> TransactionBackend for Arc<T>
where
    T: TransactionBackend + ?Sized,
{
    async fn begin(&self) -> Result<(), BackendError> {
        (**self).begin().await
    }

    async fn commit(&self) -> Result<(), BackendError> {
        (**self).commit().await
    }

    async fn rollback(&self) -> Result<(), BackendError> {
        (**self).rollback().await
    }

    fn abandon(&self) {
        (**self).abandon()
    }
}

/// Hands out a backend bound to a single request.
///
/// The request interceptor holds one source for the whole process and
/// asks it for a fresh backend each time it opens a boundary, so concurrent
/// requests never share a transaction handle.
pub trait BackendSource: Send + Sync {
    type Backend: TransactionBackend + Clone + 'static;

    fn backend(&self) -> Self::Backend;
}

/// A backend that is already bound to its execution context is shared as is.
impl<B> BackendSource for Arc<B>
where
    B: TransactionBackend + ?Sized + 'static,
{
    type Backend = Arc<B>;

    fn backend(&self) -> Self::Backend {
        Arc::clone(self)
    }
}


#[cfg(test)]
pub use mock::MockBackend;
