//! Transport layers wrapped around the whole router, outside the
//! authentication pipeline: request ids, access log, panic recovery,
//! body size cap and an overall deadline.
use std::time::Duration;

use axum::Router;
use axum::error_handling::HandleErrorLayer;
use axum::http::{StatusCode, header::HeaderName};
use tower::timeout::{TimeoutLayer, error::Elapsed};
use tower::{BoxError, ServiceBuilder};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

#[derive(Debug, Clone, Copy)]
pub struct HttpLimits {
    /// Must outlast the OAuth2 token exchange timeout so that one surfaces as 502 first.
    pub timeout: Duration,
    pub body_limit_bytes: usize,
}

impl HttpLimits {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            body_limit_bytes: 64 * 1024,
        }
    }
}

async fn layer_error(err: BoxError) -> StatusCode {
    if err.is::<Elapsed>() {
        tracing::warn!("request exceeded the global timeout");
        StatusCode::REQUEST_TIMEOUT
    } else {
        tracing::error!(error = %err, "transport layer failed");
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

pub fn apply(router: Router, limits: HttpLimits) -> Router {
    let request_id = HeaderName::from_static(REQUEST_ID_HEADER);

    router.layer(
        ServiceBuilder::new()
            .layer(HandleErrorLayer::new(layer_error))
            .layer(SetRequestIdLayer::new(request_id.clone(), MakeRequestUuid))
            .layer(PropagateRequestIdLayer::new(request_id))
            .layer(TraceLayer::new_for_http())
            .layer(CatchPanicLayer::new())
            .layer(RequestBodyLimitLayer::new(limits.body_limit_bytes))
            .layer(TimeoutLayer::new(limits.timeout)),
    )
}
