use std::sync::Arc;

use axum::http::header;

use crate::error::AppError;
use crate::services::auth::cookies::read_cookie;
use crate::services::chain::{ValidationContext, ValidationHandler};
use crate::services::jwt::{
    JwtTokenService,
    strategies::{VALIDATE_ACCESS, VALIDATE_EXPIRATION, VALIDATE_ISSUER},
};

/// Pulls the token from `Authorization: Bearer` or, failing that, the auth cookie.
pub struct TokenExtractionHandler {
    cookie_name: String,
}

impl TokenExtractionHandler {
    pub fn new(cookie_name: impl Into<String>) -> Self {
        Self {
            cookie_name: cookie_name.into(),
        }
    }
}

impl ValidationHandler for TokenExtractionHandler {
    fn name(&self) -> &'static str {
        "token-extraction"
    }

    fn handle(&self, ctx: &mut ValidationContext) -> bool {
        let bearer = ctx
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string);

        match bearer.or_else(|| read_cookie(&ctx.headers, &self.cookie_name)) {
            Some(token) => {
                ctx.token = Some(token);
                true
            }
            None => ctx.fail(AppError::unauthorized("MISSING_TOKEN", "authentication token required")),
        }
    }
}

/// Verifies signature and structure; expiry is the next handler's job.
pub struct SignatureHandler {
    jwt: Arc<JwtTokenService>,
}

impl SignatureHandler {
    pub fn new(jwt: Arc<JwtTokenService>) -> Self {
        Self { jwt }
    }
}

impl ValidationHandler for SignatureHandler {
    fn name(&self) -> &'static str {
        "signature"
    }

    fn handle(&self, ctx: &mut ValidationContext) -> bool {
        let Some(token) = ctx.token.as_deref() else {
            return ctx.fail(AppError::unauthorized("MISSING_TOKEN", "authentication token required"));
        };
        match self.jwt.verify_signature(token) {
            Ok(claims) => {
                ctx.claims = Some(claims);
                true
            }
            Err(e) => ctx.fail(e),
        }
    }
}

/// Runs a keyed validator from the token service against the decoded claims.
struct ValidatorStep {
    jwt: Arc<JwtTokenService>,
    key: &'static str,
    code: &'static str,
    message: &'static str,
}

impl ValidatorStep {
    fn run(&self, ctx: &mut ValidationContext) -> bool {
        let (Some(token), Some(claims)) = (ctx.token.as_deref(), ctx.claims.as_ref()) else {
            return ctx.fail(AppError::unauthorized("MISSING_TOKEN", "authentication token required"));
        };
        match self.jwt.run_validator(self.key, token, claims) {
            Ok(true) => true,
            Ok(false) => {
                tracing::debug!(validator = self.key, sub = %claims.sub, "token rejected");
                ctx.fail(AppError::unauthorized(self.code, self.message))
            }
            Err(e) => ctx.fail(e),
        }
    }
}

/// Rejects signed tokens that were not minted to authenticate requests, such as state tokens.
pub struct TokenUseHandler(ValidatorStep);

impl TokenUseHandler {
    pub fn new(jwt: Arc<JwtTokenService>) -> Self {
        Self(ValidatorStep {
            jwt,
            key: VALIDATE_ACCESS,
            code: "INVALID_TOKEN_USE",
            message: "token cannot be used for authentication",
        })
    }
}

impl ValidationHandler for TokenUseHandler {
    fn name(&self) -> &'static str {
        "token-use"
    }

    fn handle(&self, ctx: &mut ValidationContext) -> bool {
        self.0.run(ctx)
    }
}

pub struct ExpiryHandler(ValidatorStep);

impl ExpiryHandler {
    pub fn new(jwt: Arc<JwtTokenService>) -> Self {
        Self(ValidatorStep {
            jwt,
            key: VALIDATE_EXPIRATION,
            code: "TOKEN_EXPIRED",
            message: "token expired",
        })
    }
}

impl ValidationHandler for ExpiryHandler {
    fn name(&self) -> &'static str {
        "expiry"
    }

    fn handle(&self, ctx: &mut ValidationContext) -> bool {
        self.0.run(ctx)
    }
}

pub struct IssuerHandler(ValidatorStep);

impl IssuerHandler {
    pub fn new(jwt: Arc<JwtTokenService>) -> Self {
        Self(ValidatorStep {
            jwt,
            key: VALIDATE_ISSUER,
            code: "INVALID_ISSUER",
            message: "token was not issued by this service",
        })
    }
}

impl ValidationHandler for IssuerHandler {
    fn name(&self) -> &'static str {
        "issuer"
    }

    fn handle(&self, ctx: &mut ValidationContext) -> bool {
        self.0.run(ctx)
    }
}
