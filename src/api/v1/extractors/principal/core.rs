use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::error::AppError;
use crate::services::auth::Principal;

/// Handler で Principal を受け取るための extractor
/// gateway が Principal を request.extensions() に insert 済みである前提
/// 見つからない場合は 401 (保護対象外のルート、または StopMatch で素通りした)
#[derive(Debug, Clone)]
pub struct AuthPrincipal(pub Principal);

impl<S> FromRequestParts<S> for AuthPrincipal
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Principal>()
            .cloned()
            .map(AuthPrincipal)
            .ok_or_else(|| AppError::unauthorized("UNAUTHORIZED", "authentication required"))
    }
}
