/*
 * Responsibility
 * - 認証戦略 (AuthenticationStrategy) の契約
 * - 認証済み主体 (Principal) の型: middleware が extensions に載せ、handler はこれだけを見る
 */
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::context::RequestContext;
use crate::error::AppError;
use crate::services::jwt::{
    Claims, JwtTokenService, TokenError,
    claims::CLAIM_AUTH_METHOD,
    strategies::{EXTRACT_EMAIL, EXTRACT_ROLE},
};

pub const AUTH_TYPE_HEADER: &str = "authorization-type";
pub const STRATEGY_SUFFIX: &str = "AuthStrategy";

/// Registry key for a declared auth type: `jwt` -> `jwtAuthStrategy`.
pub fn strategy_key(auth_type: &str) -> String {
    format!("{auth_type}{STRATEGY_SUFFIX}")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMethod {
    Jwt,
    Database,
    OAuth2,
}

/// Authenticated caller, as seen by handlers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Principal {
    pub subject: String,
    pub email: Option<String>,
    pub headquarters: bool,
    pub method: AuthMethod,
}

impl Principal {
    pub fn from_claims(jwt: &JwtTokenService, claims: &Claims, method: AuthMethod) -> Result<Self, TokenError> {
        let email = match jwt.resolve_claim::<String>(claims, EXTRACT_EMAIL) {
            Ok(email) => Some(email),
            Err(TokenError::InvalidClaim(_)) => None,
            Err(e) => return Err(e),
        };
        let headquarters: bool = jwt.resolve_claim(claims, EXTRACT_ROLE)?;

        Ok(Self {
            subject: claims.sub.clone(),
            email,
            headquarters,
            method,
        })
    }

    /// Method recorded in the token, falling back to `default`.
    pub fn method_of(claims: &Claims, default: AuthMethod) -> AuthMethod {
        match claims.custom_str(CLAIM_AUTH_METHOD) {
            Some("database") => AuthMethod::Database,
            Some("oauth2") => AuthMethod::OAuth2,
            _ => default,
        }
    }
}

/// One way of authenticating a request.
///
/// `Err(AppError::StopMatch)` means "not mine": the gateway carries on
/// without a principal instead of rejecting the request.
#[async_trait]
pub trait AuthenticationStrategy: Send + Sync {
    async fn authenticate(&self, ctx: &RequestContext) -> Result<Principal, AppError>;
}
