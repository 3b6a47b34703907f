//! Request Interceptor
//!
//! Pipeline stage that opens a transaction boundary around the rest of the
//! pipeline when a predicate matches the incoming request.
//!
//! ```text
//!              ┌── predicate false ──▶ next(request) ───────────────▶ response
//! request ──▶ ─┤
//!              └── predicate true ──▶ begin ─▶ next(request) ─┬─Ok──▶ commit ──▶ response
//!                                                             └─Err─▶ rollback ─▶ error
//! ```
//!
//! The interceptor is built once at startup and shared; it keeps no state
//! between requests. Each transactional request gets its own backend from
//! the [`BackendSource`], bound to the request so handlers can reach the
//! open transaction.

pub mod groups;
pub mod middleware;

pub use groups::{PipelineGroups, TargetGroup, install};
pub use middleware::{PipelineFailure, transaction_middleware};

use axum::http::{Method, Request, method::InvalidMethod};
use axum::response::Response;
use std::future::Future;
use tracing::{debug, trace};

use crate::backend::BackendSource;
use crate::error::BackendError;
use crate::unit::TransactionalUnit;

/// What the interceptor needs from a request.
pub trait InterceptedRequest {
    fn method(&self) -> &Method;

    /// Make the request's backend reachable by downstream handlers.
    ///
    /// Handlers have no other way to reach the open transaction.
    fn bind_backend<B>(&mut self, backend: B)
    where
        B: Clone + Send + Sync + 'static;
}

impl<T> InterceptedRequest for Request<T> {
    fn method(&self) -> &Method {
        Request::method(self)
    }

    fn bind_backend<B>(&mut self, backend: B)
    where
        B: Clone + Send + Sync + 'static,
    {
        self.extensions_mut().insert(backend);
    }
}

/// Decides whether a request runs inside a transaction.
pub trait Predicate<R>: Send + Sync {
    fn matches(&self, request: &R) -> bool;
}

impl<R, F> Predicate<R> for F
where
    F: Fn(&R) -> bool + Send + Sync,
{
    fn matches(&self, request: &R) -> bool {
        self(request)
    }
}

/// Matches requests by HTTP method. Defaults to `DELETE` only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodPredicate {
    methods: Vec<Method>,
}

impl MethodPredicate {
    pub fn new(methods: impl IntoIterator<Item = Method>) -> Self {
        Self {
            methods: methods.into_iter().collect(),
        }
    }

    /// Parse method names, case-insensitively (`"delete"` and `"DELETE"`
    /// are the same method).
    pub fn from_names<I, N>(names: I) -> Result<Self, InvalidMethod>
    where
        I: IntoIterator<Item = N>,
        N: AsRef<str>,
    {
        let methods = names
            .into_iter()
            .map(|name| Method::from_bytes(name.as_ref().trim().to_ascii_uppercase().as_bytes()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { methods })
    }

    pub fn methods(&self) -> &[Method] {
        &self.methods
    }
}

impl Default for MethodPredicate {
    fn default() -> Self {
        Self::new([Method::DELETE])
    }
}

impl<R: InterceptedRequest> Predicate<R> for MethodPredicate {
    fn matches(&self, request: &R) -> bool {
        self.methods.contains(request.method())
    }
}

/// Default failure check for HTTP responses: any 4xx or 5xx.
pub fn is_error_response(response: &Response) -> bool {
    let status = response.status();
    status.is_client_error() || status.is_server_error()
}

/// Transaction boundary for a request pipeline.
pub struct RequestInterceptor<S, P = MethodPredicate> {
    source: S,
    predicate: P,
    is_failure: fn(&Response) -> bool,
}

impl<S> RequestInterceptor<S> {
    /// Interceptor with the default `DELETE` predicate.
    pub fn with_default_predicate(source: S) -> Self {
        Self::new(source, MethodPredicate::default())
    }
}

impl<S, P> RequestInterceptor<S, P> {
    pub fn new(source: S, predicate: P) -> Self {
        Self {
            source,
            predicate,
            is_failure: is_error_response,
        }
    }

    /// Replace the check deciding which HTTP responses count as a failed
    /// unit of work (axum adapter only).
    pub fn with_failure_check(mut self, is_failure: fn(&Response) -> bool) -> Self {
        self.is_failure = is_failure;
        self
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn predicate(&self) -> &P {
        &self.predicate
    }

    pub(crate) fn failure_check(&self) -> fn(&Response) -> bool {
        self.is_failure
    }
}

impl<S, P> RequestInterceptor<S, P>
where
    S: BackendSource,
{
    /// Run `next` for `request`, inside a transaction when the predicate
    /// matches.
    ///
    /// The result of `next` is returned unchanged in both paths. On the
    /// transactional path an `Err` from `next` has already been rolled back
    /// when it reaches the caller.
    pub async fn handle<R, Res, E, N, Fut>(&self, mut request: R, next: N) -> Result<Res, E>
    where
        R: InterceptedRequest,
        P: Predicate<R>,
        N: FnOnce(R) -> Fut,
        Fut: Future<Output = Result<Res, E>>,
        E: From<BackendError>,
    {
        if !self.predicate.matches(&request) {
            trace!(method = %request.method(), "Request passes through without transaction");
            return next(request).await;
        }

        debug!(method = %request.method(), "Opening transaction boundary for request");
        let backend = self.source.backend();
        request.bind_backend(backend.clone());

        TransactionalUnit::new(&backend)
            .run(move || next(request))
            .await
    }
}
