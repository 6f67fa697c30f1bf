use axum::{
    Json,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Redirect, Response},
};
use serde_json::json;

use crate::state::AppState;

const RETRY_AFTER_SECONDS: &str = "60";

/// Landing page for requests turned away by the maintenance gate.
///
/// Once the flag clears, visitors are sent back home.
pub async fn maintenance_page(State(state): State<AppState>) -> Response {
    if !state.maintenance.is_enabled() {
        return Redirect::to(&state.config.home_url).into_response();
    }

    (
        StatusCode::SERVICE_UNAVAILABLE,
        [(header::RETRY_AFTER, RETRY_AFTER_SECONDS)],
        Json(json!({
            "status": "maintenance",
            "message": "the service is under maintenance, please try again later",
        })),
    )
        .into_response()
}
