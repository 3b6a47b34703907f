//! Transactional Unit
//!
//! Runs one unit of work inside a transaction boundary:
//!
//! ```text
//! begin ──▶ work() ──Ok──▶ commit ──▶ Ok(value)
//!                  └─Err─▶ rollback ─▶ Err(original error)
//! ```
//!
//! Exactly one of commit / rollback happens per run. A run that is dropped
//! after `begin` (timeout, client disconnect, panic) abandons the transaction
//! instead; it is never committed.

use std::future::Future;
use tracing::{debug, error, warn};

use crate::backend::TransactionBackend;
use crate::error::BackendError;

/// Single-use transaction boundary around a unit of work.
pub struct TransactionalUnit<'a, B: ?Sized> {
    backend: &'a B,
}

impl<'a, B> TransactionalUnit<'a, B>
where
    B: TransactionBackend + ?Sized,
{
    pub fn new(backend: &'a B) -> Self {
        Self { backend }
    }

    /// Execute `work` inside a transaction.
    ///
    /// The work's own error is returned unchanged after rollback. Backend
    /// failures reach the caller through `E: From<BackendError>`.
    pub async fn run<T, E, F, Fut>(self, work: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<BackendError>,
    {
        self.backend.begin().await?;
        debug!("Transaction boundary opened");

        let mut boundary = Boundary::new(self.backend);
        let outcome = work().await;
        boundary.decided();

        match outcome {
            Ok(value) => {
                self.backend.commit().await?;
                debug!("Transaction boundary committed");
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = self.backend.rollback().await {
                    // The work's failure is what the caller must see.
                    error!(error = %rollback_err, "Rollback failed after unit of work error");
                } else {
                    debug!("Transaction boundary rolled back");
                }
                Err(err)
            }
        }
    }
}

/// Abandons the transaction if the run is dropped before a decision.
struct Boundary<'a, B: TransactionBackend + ?Sized> {
    backend: &'a B,
    pending: bool,
}

impl<'a, B: TransactionBackend + ?Sized> Boundary<'a, B> {
    fn new(backend: &'a B) -> Self {
        Self {
            backend,
            pending: true,
        }
    }

    fn decided(&mut self) {
        self.pending = false;
    }
}

impl<B: TransactionBackend + ?Sized> Drop for Boundary<'_, B> {
    fn drop(&mut self) {
        if self.pending {
            warn!("Unit of work dropped inside transaction boundary, abandoning");
            self.backend.abandon();
        }
    }
}
