//! Built-in claim resolvers, token generators and token validators.
//!
//! Each is registered under a purpose key in `JwtTokenService`. Deployments
//! can register more, or replace these, under the same keys.
use serde_json::Value;

use crate::services::jwt::{
    claims::{
        CLAIM_AUTH_METHOD, CLAIM_HEADQUARTERS, CLAIM_PROVIDER, Claims, IssuePolicy,
        StateCredentials, TOKEN_USE_ACCESS, TOKEN_USE_STATE, TokenSource,
    },
    keys::TokenError,
};

pub const EXTRACT_EMAIL: &str = "extract-email";
pub const EXTRACT_SUBJECT: &str = "extract-subject";
pub const EXTRACT_ROLE: &str = "extract-role";
pub const EXTRACT_STATE: &str = "extract-state";

pub const GENERATE_DATABASE_TOKEN: &str = "generate-database-token";
pub const GENERATE_OAUTH2_TOKEN: &str = "generate-oauth2-token";
pub const GENERATE_STATE_TOKEN: &str = "generate-state-token";

pub const VALIDATE_ISSUER: &str = "validate-issuer";
pub const VALIDATE_EXPIRATION: &str = "validate-expiration";
pub const VALIDATE_STATE: &str = "validate-state";
pub const VALIDATE_ACCESS: &str = "validate-access";

pub trait ClaimResolver: Send + Sync {
    fn resolve(&self, claims: &Claims) -> Result<Value, TokenError>;
}

pub trait TokenGenerator: Send + Sync {
    fn generate(&self, source: &TokenSource, policy: &IssuePolicy) -> Result<Claims, TokenError>;
}

pub trait TokenValidator: Send + Sync {
    fn validate(&self, token: &str, claims: &Claims) -> bool;
}

pub struct EmailResolver;

impl ClaimResolver for EmailResolver {
    fn resolve(&self, claims: &Claims) -> Result<Value, TokenError> {
        claims
            .email
            .clone()
            .map(Value::String)
            .ok_or_else(|| TokenError::InvalidClaim("email".to_string()))
    }
}

pub struct SubjectResolver;

impl ClaimResolver for SubjectResolver {
    fn resolve(&self, claims: &Claims) -> Result<Value, TokenError> {
        Ok(Value::String(claims.sub.clone()))
    }
}

/// Headquarters role flag. Tokens without the claim are not headquarters.
pub struct RoleResolver;

impl ClaimResolver for RoleResolver {
    fn resolve(&self, claims: &Claims) -> Result<Value, TokenError> {
        match claims.custom(CLAIM_HEADQUARTERS) {
            None => Ok(Value::Bool(false)),
            Some(Value::Bool(b)) => Ok(Value::Bool(*b)),
            Some(_) => Err(TokenError::InvalidClaim(CLAIM_HEADQUARTERS.to_string())),
        }
    }
}

/// Rebuilds `StateCredentials` from a state token's payload.
pub struct StateResolver;

impl ClaimResolver for StateResolver {
    fn resolve(&self, claims: &Claims) -> Result<Value, TokenError> {
        let creds: StateCredentials = serde_json::from_value(Value::Object(claims.custom.clone()))
            .map_err(|_| TokenError::InvalidClaim("state".to_string()))?;
        serde_json::to_value(creds).map_err(|_| TokenError::InvalidClaim("state".to_string()))
    }
}

pub struct DatabaseTokenGenerator;

impl TokenGenerator for DatabaseTokenGenerator {
    fn generate(&self, source: &TokenSource, policy: &IssuePolicy) -> Result<Claims, TokenError> {
        let TokenSource::User(user) = source else {
            return Err(TokenError::UnsupportedSource {
                generator: GENERATE_DATABASE_TOKEN,
                source_kind: source.kind(),
            });
        };

        let mut claims = policy.base_claims(
            user.id.to_string(),
            Some(user.email.clone()),
            policy.ttl_seconds,
            TOKEN_USE_ACCESS,
        );
        claims
            .custom
            .insert(CLAIM_HEADQUARTERS.into(), Value::Bool(user.is_headquarters()));
        claims
            .custom
            .insert(CLAIM_AUTH_METHOD.into(), Value::String("database".into()));
        Ok(claims)
    }
}

pub struct OAuth2TokenGenerator;

impl TokenGenerator for OAuth2TokenGenerator {
    fn generate(&self, source: &TokenSource, policy: &IssuePolicy) -> Result<Claims, TokenError> {
        let TokenSource::OAuth2 { user, provider } = source else {
            return Err(TokenError::UnsupportedSource {
                generator: GENERATE_OAUTH2_TOKEN,
                source_kind: source.kind(),
            });
        };

        let mut claims = policy.base_claims(
            user.id.to_string(),
            Some(user.email.clone()),
            policy.ttl_seconds,
            TOKEN_USE_ACCESS,
        );
        claims
            .custom
            .insert(CLAIM_HEADQUARTERS.into(), Value::Bool(user.is_headquarters()));
        claims
            .custom
            .insert(CLAIM_AUTH_METHOD.into(), Value::String("oauth2".into()));
        claims
            .custom
            .insert(CLAIM_PROVIDER.into(), Value::String(provider.clone()));
        Ok(claims)
    }
}

pub struct StateTokenGenerator;

impl TokenGenerator for StateTokenGenerator {
    fn generate(&self, source: &TokenSource, policy: &IssuePolicy) -> Result<Claims, TokenError> {
        let TokenSource::State(creds) = source else {
            return Err(TokenError::UnsupportedSource {
                generator: GENERATE_STATE_TOKEN,
                source_kind: source.kind(),
            });
        };

        let mut claims = policy.base_claims(
            creds.state.clone(),
            None,
            policy.state_ttl_seconds,
            TOKEN_USE_STATE,
        );
        match serde_json::to_value(creds) {
            Ok(Value::Object(fields)) => claims.custom.extend(fields),
            _ => return Err(TokenError::InvalidClaim("state".to_string())),
        }
        Ok(claims)
    }
}

pub struct IssuerValidator {
    expected: String,
}

impl IssuerValidator {
    pub fn new(expected: impl Into<String>) -> Self {
        Self {
            expected: expected.into(),
        }
    }
}

impl TokenValidator for IssuerValidator {
    fn validate(&self, _token: &str, claims: &Claims) -> bool {
        claims.iss == self.expected
    }
}

pub struct ExpirationValidator {
    leeway_seconds: i64,
}

impl ExpirationValidator {
    pub fn new(leeway_seconds: i64) -> Self {
        Self { leeway_seconds }
    }
}

impl TokenValidator for ExpirationValidator {
    fn validate(&self, _token: &str, claims: &Claims) -> bool {
        claims.exp + self.leeway_seconds > chrono::Utc::now().timestamp()
    }
}

/// Only tokens minted for authentication may authenticate a request.
/// State tokens share the key and issuer, so the signature alone does not tell them apart.
pub struct AccessTokenValidator;

impl TokenValidator for AccessTokenValidator {
    fn validate(&self, _token: &str, claims: &Claims) -> bool {
        claims.token_use() == Some(TOKEN_USE_ACCESS)
    }
}

/// A state token must be marked as one and carry every credential needed for the code exchange.
pub struct StateValidator;

impl TokenValidator for StateValidator {
    fn validate(&self, _token: &str, claims: &Claims) -> bool {
        claims.token_use() == Some(TOKEN_USE_STATE)
            && ["provider", "state", "client_id", "client_secret", "audience"]
                .iter()
                .all(|name| claims.custom_str(name).is_some_and(|v| !v.is_empty()))
    }
}
