use axum::Json;

use crate::api::v1::extractors::AuthPrincipal;
use crate::services::auth::Principal;

/// GET /api/v1/me
pub async fn me(AuthPrincipal(principal): AuthPrincipal) -> Json<Principal> {
    Json(principal)
}
