/*
 * Responsibility
 * - GET /health (疎通用)
 * - CONTEXT_SKIP_PATHS / AUTH_EXCLUDE_PATHS の既定値に入っているので、認証もコンテキストも通らない
 */
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde_json::json;

use crate::state::AppState;

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({
            "status": "ok",
            "maintenance": state.maintenance.is_enabled(),
        })),
    )
}
