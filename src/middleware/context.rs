//! Binds a `RequestContext` around everything below it in the stack.
//!
//! Headers and cookies queued on the context while the request runs are
//! copied onto whatever response comes back, error responses included.
use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use tracing::Instrument;

use crate::context::{self, RequestContext};
use crate::state::AppState;

pub async fn bind_request_context(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Response {
    if state.context_skip.is_match(req.uri().path()) {
        return next.run(req).await;
    }

    let ctx = Arc::new(RequestContext::from_request(&req, &state.trusted_proxies));
    let span = tracing::debug_span!("request_context", context_id = %ctx.id());

    let mut res = context::bind(Arc::clone(&ctx), next.run(req))
        .instrument(span)
        .await;
    ctx.response().apply(&mut res);
    res
}
