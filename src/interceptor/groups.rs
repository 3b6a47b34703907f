//! Automatic installation onto named pipeline groups.
//!
//! An application exposes two route groups, `web` and `api`. Configuration
//! picks at most one target: the whole application (`Global`), or one of the
//! groups. With no target the interceptor is attached by hand where needed.

use axum::{Router, extract::Request};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use super::{Predicate, RequestInterceptor};
use crate::backend::BackendSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetGroup {
    Global,
    Web,
    Api,
}

/// Route groups of an application, before merging.
pub struct PipelineGroups<RS = ()> {
    pub web: Router<RS>,
    pub api: Router<RS>,
}

/// Merge `groups` into one router with the interceptor layered onto `target`.
pub fn install<S, P, RS>(
    interceptor: &Arc<RequestInterceptor<S, P>>,
    target: Option<TargetGroup>,
    groups: PipelineGroups<RS>,
) -> Router<RS>
where
    S: BackendSource + 'static,
    P: Predicate<Request> + 'static,
    RS: Clone + Send + Sync + 'static,
{
    let PipelineGroups { web, api } = groups;

    match target {
        Some(TargetGroup::Global) => {
            info!("Transaction middleware installed globally");
            interceptor.layer_onto(web.merge(api))
        }
        Some(TargetGroup::Web) => {
            info!("Transaction middleware installed on web group");
            interceptor.layer_onto(web).merge(api)
        }
        Some(TargetGroup::Api) => {
            info!("Transaction middleware installed on api group");
            web.merge(interceptor.layer_onto(api))
        }
        None => {
            info!("Transaction middleware not auto-installed");
            web.merge(api)
        }
    }
}
