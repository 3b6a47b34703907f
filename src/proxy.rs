//! Transactional Call Proxy
//!
//! Wraps an object so every call routed through the wrapper runs inside its
//! own transaction boundary. Two dispatch styles are offered:
//!
//! - [`CallProxy::invoke`]: open-ended dispatch by method name with JSON
//!   arguments, resolved at call time through the [`Invoke`] capability.
//! - [`CallProxy::call`]: typed dispatch through a closure over the target.
//!
//! [`HasTransactionalCalls`] is the opt-in mixin giving any type both a
//! transactional view of itself and a run-this-closure-transactionally helper.

use async_trait::async_trait;
use serde_json::Value;
use std::future::Future;

use crate::backend::TransactionBackend;
use crate::error::{BackendError, NoSuchMethod};
use crate::unit::TransactionalUnit;

/// Dynamic method dispatch capability.
///
/// Implementors map method names to their own operations. Unknown names are
/// reported by `responds_to` so the proxy can reject them before opening a
/// transaction.
#[async_trait]
pub trait Invoke: Send + Sync {
    /// The target's own failure type, returned unchanged through the proxy.
    type Error: From<BackendError> + From<NoSuchMethod> + Send;

    fn responds_to(&self, method: &str) -> bool;

    async fn invoke(&self, method: &str, args: Vec<Value>) -> Result<Value, Self::Error>;
}

/// Forwards calls to one owned target, each inside a transaction.
pub struct CallProxy<T, B> {
    target: T,
    backend: B,
}

impl<T, B> CallProxy<T, B> {
    pub fn new(target: T, backend: B) -> Self {
        Self { target, backend }
    }

    pub fn get_ref(&self) -> &T {
        &self.target
    }

    pub fn into_inner(self) -> T {
        self.target
    }
}

impl<T, B> CallProxy<T, B>
where
    T: Invoke,
    B: TransactionBackend,
{
    /// Call `method` on the target inside a transaction.
    ///
    /// Fails with `NoSuchMethod` without touching the backend when the target
    /// does not define `method`.
    pub async fn invoke(&self, method: &str, args: Vec<Value>) -> Result<Value, T::Error> {
        if !self.target.responds_to(method) {
            return Err(NoSuchMethod::new(method, short_type_name::<T>()).into());
        }

        let target = &self.target;
        TransactionalUnit::new(&self.backend)
            .run(move || target.invoke(method, args))
            .await
    }
}

impl<T, B> CallProxy<T, B>
where
    T: Sync,
    B: TransactionBackend,
{
    /// Run a typed operation on the target inside a transaction.
    pub async fn call<'s, R, E, F, Fut>(&'s self, op: F) -> Result<R, E>
    where
        F: FnOnce(&'s T) -> Fut,
        Fut: Future<Output = Result<R, E>>,
        E: From<BackendError>,
    {
        let target = &self.target;
        TransactionalUnit::new(&self.backend)
            .run(move || op(target))
            .await
    }
}

/// Opt-in transactional helpers for a type.
///
/// ```ignore
/// impl HasTransactionalCalls for Account {}
///
/// // A transactional view of the object:
/// account.transactional(backend).invoke("save", vec![]).await?;
///
/// // Or run a closure transactionally with the object:
/// account.with_transaction(&backend, |a| a.close()).await?;
/// ```
pub trait HasTransactionalCalls: Sized {
    /// Wrap `self` in a [`CallProxy`].
    fn transactional<B>(self, backend: B) -> CallProxy<Self, B>
    where
        B: TransactionBackend,
    {
        CallProxy::new(self, backend)
    }

    /// Run `callback(self)` inside one transaction and return its result.
    fn with_transaction<'a, B, F, Fut, R, E>(
        &'a self,
        backend: &'a B,
        callback: F,
    ) -> impl Future<Output = Result<R, E>> + Send + 'a
    where
        Self: Sync,
        B: TransactionBackend + ?Sized,
        F: FnOnce(&'a Self) -> Fut + Send + 'a,
        Fut: Future<Output = Result<R, E>> + Send + 'a,
        R: Send + 'a,
        E: From<BackendError> + Send + 'a,
    {
        TransactionalUnit::new(backend).run(move || callback(self))
    }
}

/// Type name without its module path; generic arguments are kept as is.
fn short_type_name<T>() -> &'static str {
    let full = std::any::type_name::<T>();
    let head = full.find('<').map_or(full, |i| &full[..i]);
    match head.rfind("::") {
        Some(i) => &full[i + 2..],
        None => full,
    }
}
