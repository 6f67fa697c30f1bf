//! While the maintenance flag is set, send everything that is not
//! explicitly reachable to the maintenance page.
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::error::AppError;
use crate::state::AppState;

pub async fn maintenance_gate(State(state): State<AppState>, req: Request, next: Next) -> Response {
    if !state.maintenance.is_enabled() {
        return next.run(req).await;
    }

    let path = req.uri().path();
    if state.maintenance_skip.is_match(path) {
        return next.run(req).await;
    }

    tracing::debug!(path, "maintenance mode, redirecting");
    AppError::redirect(state.config.maintenance_path.clone()).into_response()
}
