//! Axum adapter for the request interceptor.
//!
//! `Next` always yields a `Response`, so the adapter classifies it with the
//! interceptor's failure check: a failing response is the unit of work's
//! error. It is rolled back and then handed back to the outer pipeline as is.

use axum::{
    Json, Router,
    extract::{Request, State},
    http::StatusCode,
    middleware::{Next, from_fn_with_state},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::error;

use super::{Predicate, RequestInterceptor};
use crate::backend::BackendSource;
use crate::error::BackendError;

/// Why a transactional request did not commit.
#[derive(Debug, Error)]
pub enum PipelineFailure {
    /// A downstream handler produced a failing response.
    #[error("Downstream handler failed with status {}", .0.status())]
    Downstream(Response),

    #[error(transparent)]
    Backend(#[from] BackendError),
}

#[derive(Serialize)]
struct ErrorBody {
    code: &'static str,
    msg: String,
}

impl IntoResponse for PipelineFailure {
    fn into_response(self) -> Response {
        match self {
            PipelineFailure::Downstream(response) => response,
            PipelineFailure::Backend(e) => {
                error!(error = %e, "Transaction backend failure");
                let body = ErrorBody {
                    code: e.code(),
                    msg: e.to_string(),
                };
                (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
            }
        }
    }
}

/// Axum middleware running the rest of the pipeline through the interceptor.
///
/// Attach with [`RequestInterceptor::layer_onto`] or
/// `from_fn_with_state(interceptor, transaction_middleware::<S, P>)`.
pub async fn transaction_middleware<S, P>(
    State(interceptor): State<Arc<RequestInterceptor<S, P>>>,
    request: Request,
    next: Next,
) -> Response
where
    S: BackendSource + 'static,
    P: Predicate<Request> + 'static,
{
    let is_failure = interceptor.failure_check();

    interceptor
        .handle(request, move |request| async move {
            let response = next.run(request).await;
            if is_failure(&response) {
                Err(PipelineFailure::Downstream(response))
            } else {
                Ok(response)
            }
        })
        .await
        .unwrap_or_else(IntoResponse::into_response)
}

impl<S, P> RequestInterceptor<S, P>
where
    S: BackendSource + 'static,
    P: Predicate<Request> + 'static,
{
    /// Layer the interceptor onto every route currently in `router`.
    pub fn layer_onto<RS>(self: &Arc<Self>, router: Router<RS>) -> Router<RS>
    where
        RS: Clone + Send + Sync + 'static,
    {
        router.layer(from_fn_with_state(
            Arc::clone(self),
            transaction_middleware::<S, P>,
        ))
    }
}
