use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, errors::ErrorKind,
};
use thiserror::Error;
use tracing::{error, warn};

use crate::error::AppError;
use crate::services::jwt::claims::Claims;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("malformed token")]
    Malformed,
    #[error("invalid token signature")]
    InvalidSignature,
    #[error("token expired")]
    Expired,
    #[error("token rejected by validator '{0}'")]
    Rejected(String),
    #[error("claim '{0}' missing or of unexpected type")]
    InvalidClaim(String),
    #[error("invalid signing secret: {0}")]
    InvalidSecret(String),
    #[error("unknown {kind} '{key}'")]
    UnknownStrategy { kind: &'static str, key: String },
    #[error("generator '{generator}' cannot sign a {source_kind} source")]
    UnsupportedSource {
        generator: &'static str,
        source_kind: &'static str,
    },
    #[error("jwt error: {0}")]
    Jwt(jsonwebtoken::errors::Error),
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        match e.kind() {
            ErrorKind::ExpiredSignature => Self::Expired,
            ErrorKind::InvalidSignature => Self::InvalidSignature,
            ErrorKind::InvalidToken
            | ErrorKind::Base64(_)
            | ErrorKind::Json(_)
            | ErrorKind::Utf8(_)
            | ErrorKind::MissingRequiredClaim(_) => Self::Malformed,
            _ => Self::Jwt(e),
        }
    }
}

impl TokenError {
    /// Failures caused by the presented token, as opposed to our own setup.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Malformed
                | Self::InvalidSignature
                | Self::Expired
                | Self::Rejected(_)
                | Self::InvalidClaim(_)
                | Self::Jwt(_)
        )
    }
}

impl From<TokenError> for AppError {
    fn from(e: TokenError) -> Self {
        if e.is_client_error() {
            warn!(error = %e, "token rejected");
            AppError::unauthorized("INVALID_TOKEN", "invalid or expired token")
        } else {
            error!(error = %e, "token service misconfigured");
            AppError::Internal
        }
    }
}

/// HS256 key material derived once from the configured base64 secret.
#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    full: Validation,
    signature_only: Validation,
}

impl std::fmt::Debug for JwtKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Do not print key material
        f.debug_struct("JwtKeys")
            .field("validation", &self.full)
            .finish()
    }
}

impl JwtKeys {
    pub fn from_base64_secret(secret: &str, leeway_seconds: u64) -> Result<Self, TokenError> {
        if secret.trim().is_empty() {
            return Err(TokenError::InvalidSecret("empty secret".to_string()));
        }
        let encoding = EncodingKey::from_base64_secret(secret)
            .map_err(|e| TokenError::InvalidSecret(e.to_string()))?;
        let decoding = DecodingKey::from_base64_secret(secret)
            .map_err(|e| TokenError::InvalidSecret(e.to_string()))?;

        // Signature + structure + exp. Issuer is checked by the `validate-issuer` strategy.
        let mut full = Validation::new(Algorithm::HS256);
        full.leeway = leeway_seconds;
        full.validate_aud = false;

        // Signature + structure only; the validation chain checks expiry as its own step.
        let mut signature_only = full.clone();
        signature_only.validate_exp = false;

        Ok(Self {
            encoding,
            decoding,
            full,
            signature_only,
        })
    }

    pub fn sign(&self, claims: &Claims) -> Result<String, TokenError> {
        let mut header = Header::new(Algorithm::HS256);
        header.typ = Some("JWT".to_string());
        jsonwebtoken::encode(&header, claims, &self.encoding).map_err(|e| {
            error!(error = %e, "failed to sign JWT");
            TokenError::Jwt(e)
        })
    }

    pub fn decode(&self, token: &str) -> Result<Claims, TokenError> {
        Ok(jsonwebtoken::decode::<Claims>(token, &self.decoding, &self.full)?.claims)
    }

    pub fn decode_signature_only(&self, token: &str) -> Result<Claims, TokenError> {
        Ok(jsonwebtoken::decode::<Claims>(token, &self.decoding, &self.signature_only)?.claims)
    }
}
