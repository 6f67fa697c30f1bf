//! Request pipeline, outermost first:
//! http layers -> context binding -> maintenance gate -> authentication gateway -> routes.
pub mod context;
pub mod gateway;
pub mod http;
pub mod maintenance;

use axum::{Router, middleware::from_fn_with_state};

use crate::state::AppState;

/// Wrap `router` in the authentication pipeline.
///
/// axum runs the most recently added layer first, so the order below is inside-out.
pub fn apply(router: Router<AppState>, state: AppState) -> Router<AppState> {
    router
        .layer(from_fn_with_state(state.clone(), gateway::authentication_gateway))
        .layer(from_fn_with_state(state.clone(), maintenance::maintenance_gate))
        .layer(from_fn_with_state(state, context::bind_request_context))
}
