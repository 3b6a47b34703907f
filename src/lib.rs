//! Transaction Middleware
//!
//! Atomic transaction boundaries around units of work: commit on success,
//! rollback on failure, and the original failure handed back unchanged.
//!
//! # Modules
//!
//! - [`backend`] - Transaction primitive (`begin` / `commit` / `rollback`) and the PostgreSQL backend
//! - [`unit`] - `TransactionalUnit`, one unit of work inside one transaction
//! - [`proxy`] - `CallProxy` and the `HasTransactionalCalls` mixin
//! - [`interceptor`] - Request pipeline interceptor and its axum middleware
//! - [`config`] - YAML application configuration
//! - [`db`] - PostgreSQL pool
//! - [`logging`] - tracing subscriber setup
//! - [`notes`] - Demo notes service wired through the middleware

pub mod backend;
pub mod config;
pub mod db;
pub mod error;
pub mod interceptor;
pub mod logging;
pub mod notes;
pub mod proxy;
pub mod unit;

// Convenient re-exports at crate root
pub use backend::{BackendSource, PgBackend, TransactionBackend};
pub use error::{BackendError, NoSuchMethod};
pub use interceptor::{
    InterceptedRequest, MethodPredicate, PipelineFailure, PipelineGroups, Predicate,
    RequestInterceptor, TargetGroup, install, transaction_middleware,
};
pub use proxy::{CallProxy, HasTransactionalCalls, Invoke};
pub use unit::TransactionalUnit;
