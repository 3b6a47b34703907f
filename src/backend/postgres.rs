//! PostgreSQL Backend
//!
//! `sqlx`-based backend. Each `PgBackend` owns one transaction slot; clones
//! share that slot so a handler can reach the transaction the interceptor
//! opened for its request. A fresh slot is created for every `BackendSource::backend` call.

use async_trait::async_trait;
use sqlx::{PgConnection, PgPool, Postgres, Transaction};
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

use super::{BackendSource, TransactionBackend};
use crate::error::BackendError;

type Slot = Option<Transaction<'static, Postgres>>;

/// Request-scoped PostgreSQL transaction handle.
#[derive(Clone)]
pub struct PgBackend {
    pool: PgPool,
    slot: Arc<Mutex<Slot>>,
}

impl PgBackend {
    /// Create a backend with an empty transaction slot.
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            slot: Arc::new(Mutex::new(None)),
        }
    }

    /// The pool transactions are drawn from.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Lock the transaction slot for running queries inside the open
    /// transaction.
    pub async fn lock(&self) -> PgTxGuard<'_> {
        PgTxGuard(self.slot.lock().await)
    }

    /// Whether a transaction is currently open on this handle.
    pub async fn in_transaction(&self) -> bool {
        self.slot.lock().await.is_some()
    }
}

/// Exclusive access to the open transaction.
pub struct PgTxGuard<'a>(MutexGuard<'a, Slot>);

impl PgTxGuard<'_> {
    /// Connection of the open transaction.
    pub fn conn(&mut self) -> Result<&mut PgConnection, BackendError> {
        self.0.as_deref_mut().ok_or(BackendError::NotInTransaction)
    }
}

#[async_trait]
impl TransactionBackend for PgBackend {
    async fn begin(&self) -> Result<(), BackendError> {
        let mut slot = self.slot.lock().await;
        if slot.is_some() {
            return Err(BackendError::AlreadyInTransaction);
        }

        *slot = Some(self.pool.begin().await?);
        debug!("PostgreSQL transaction started");
        Ok(())
    }

    async fn commit(&self) -> Result<(), BackendError> {
        let tx = self
            .slot
            .lock()
            .await
            .take()
            .ok_or(BackendError::NotInTransaction)?;

        tx.commit().await?;
        debug!("PostgreSQL transaction committed");
        Ok(())
    }

    async fn rollback(&self) -> Result<(), BackendError> {
        let tx = self
            .slot
            .lock()
            .await
            .take()
            .ok_or(BackendError::NotInTransaction)?;

        tx.rollback().await?;
        debug!("PostgreSQL transaction rolled back");
        Ok(())
    }

    fn abandon(&self) {
        // sqlx queues a ROLLBACK when an uncommitted transaction is dropped.
        match self.slot.try_lock() {
            Ok(mut slot) => drop(slot.take()),
            Err(_) => warn!("Transaction slot busy while abandoning; rollback deferred to drop"),
        }
    }
}

impl BackendSource for PgPool {
    type Backend = PgBackend;

    fn backend(&self) -> Self::Backend {
        PgBackend::new(self.clone())
    }
}
