/*
 * Responsibility
 * - 認証パイプライン共通の AppError 定義
 * - IntoResponse 実装 (HTTP status / Location / JSON error body)
 * - OAuth2 系の失敗は OAuth2Error として種別 (kind) ごとに分ける
 */
use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OAuth2ErrorKind {
    /// Deployment bug: missing provider, broken state token, unknown login strategy.
    Configuration,
    /// The provider or the caller denied / did not complete the authorization step.
    Authorization,
    /// Back-channel call to the provider's token endpoint failed.
    TokenExchange,
    /// The provider authenticated someone we cannot map to a local user.
    User,
}

#[derive(Debug, Error)]
#[error("oauth2 {kind:?} error [{code}]: {message}")]
pub struct OAuth2Error {
    pub kind: OAuth2ErrorKind,
    pub code: &'static str,
    pub message: String,
    pub details: Option<serde_json::Value>,
    #[source]
    pub source: Option<BoxError>,
}

impl OAuth2Error {
    fn new(kind: OAuth2ErrorKind, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            kind,
            code,
            message: message.into(),
            details: None,
            source: None,
        }
    }

    pub fn configuration(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(OAuth2ErrorKind::Configuration, code, message)
    }

    pub fn authorization(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(OAuth2ErrorKind::Authorization, code, message)
    }

    pub fn token_exchange(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(OAuth2ErrorKind::TokenExchange, code, message)
    }

    pub fn user(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(OAuth2ErrorKind::User, code, message)
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn with_source(mut self, source: impl Into<BoxError>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn status(&self) -> StatusCode {
        match self.kind {
            OAuth2ErrorKind::Configuration => StatusCode::INTERNAL_SERVER_ERROR,
            OAuth2ErrorKind::Authorization | OAuth2ErrorKind::User => StatusCode::UNAUTHORIZED,
            OAuth2ErrorKind::TokenExchange => StatusCode::BAD_GATEWAY,
        }
    }

    /// Message that is safe to hand to the caller.
    fn public_message(&self) -> String {
        match self.kind {
            OAuth2ErrorKind::Configuration => "authentication is not available".to_string(),
            _ => self.message.clone(),
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    /// A strategy declined the request. Not an authentication failure.
    #[error("request does not match the strategy")]
    StopMatch,

    #[error("{code}: {message}")]
    Unauthorized { code: &'static str, message: String },

    #[error("redirect required: {location}")]
    Redirect { location: String, status: StatusCode },

    #[error("forbidden: {message}")]
    Forbidden { message: String },

    #[error(transparent)]
    OAuth2(#[from] OAuth2Error),

    #[error("internal server error")]
    Internal,
}

impl AppError {
    pub fn unauthorized(code: &'static str, message: impl Into<String>) -> Self {
        Self::Unauthorized {
            code,
            message: message.into(),
        }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden {
            message: message.into(),
        }
    }

    /// 302 Found.
    pub fn redirect(location: impl Into<String>) -> Self {
        Self::Redirect {
            location: location.into(),
            status: StatusCode::FOUND,
        }
    }

    /// 303 See Other, used after a form POST.
    pub fn see_other(location: impl Into<String>) -> Self {
        Self::Redirect {
            location: location.into(),
            status: StatusCode::SEE_OTHER,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::StopMatch | AppError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            AppError::Redirect { status, .. } => *status,
            AppError::Forbidden { .. } => StatusCode::FORBIDDEN,
            AppError::OAuth2(e) => e.status(),
            AppError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        let (code, message) = match self {
            AppError::Redirect { location, .. } => {
                return match HeaderValue::from_str(&location) {
                    Ok(value) => (status, [(header::LOCATION, value)]).into_response(),
                    Err(_) => {
                        tracing::error!(location = %location, "redirect location is not a valid header value");
                        AppError::Internal.into_response()
                    }
                };
            }
            AppError::StopMatch => ("UNAUTHORIZED", "authentication required".to_string()),
            AppError::Unauthorized { code, message } => (code, message),
            AppError::Forbidden { message } => ("FORBIDDEN", message),
            AppError::OAuth2(e) => (e.code, e.public_message()),
            AppError::Internal => ("INTERNAL_SERVER_ERROR", "internal server error".to_string()),
        };

        let body = ErrorResponse {
            error: ErrorBody { code, message },
        };

        (status, Json(body)).into_response()
    }
}
