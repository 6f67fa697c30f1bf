use std::sync::Arc;

use serde::de::DeserializeOwned;
use tracing::debug;

use crate::registry::StrategyRegistry;
use crate::services::jwt::{
    claims::{Claims, IssuePolicy, TokenSource},
    keys::{JwtKeys, TokenError},
    strategies::{
        ClaimResolver, DatabaseTokenGenerator, EXTRACT_EMAIL, EXTRACT_ROLE, EXTRACT_STATE,
        EXTRACT_SUBJECT, AccessTokenValidator, EmailResolver, ExpirationValidator, GENERATE_DATABASE_TOKEN,
        GENERATE_OAUTH2_TOKEN, GENERATE_STATE_TOKEN, IssuerValidator, OAuth2TokenGenerator,
        RoleResolver, StateResolver, StateTokenGenerator, StateValidator, SubjectResolver,
        TokenGenerator, TokenValidator, VALIDATE_ACCESS, VALIDATE_EXPIRATION, VALIDATE_ISSUER,
        VALIDATE_STATE,
    },
};

/// Signs and validates HS256 tokens through pluggable, keyed strategies.
pub struct JwtTokenService {
    keys: JwtKeys,
    policy: IssuePolicy,
    resolvers: StrategyRegistry<dyn ClaimResolver>,
    generators: StrategyRegistry<dyn TokenGenerator>,
    validators: StrategyRegistry<dyn TokenValidator>,
}

impl std::fmt::Debug for JwtTokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtTokenService")
            .field("issuer", &self.policy.issuer)
            .field("resolvers", &self.resolvers)
            .field("generators", &self.generators)
            .field("validators", &self.validators)
            .finish()
    }
}

impl JwtTokenService {
    /// Empty registries; callers register every strategy themselves.
    pub fn new(keys: JwtKeys, policy: IssuePolicy) -> Self {
        Self {
            keys,
            policy,
            resolvers: StrategyRegistry::new("claim-resolvers"),
            generators: StrategyRegistry::new("token-generators"),
            validators: StrategyRegistry::new("token-validators"),
        }
    }

    /// Registries pre-populated with the built-in strategies.
    pub fn with_defaults(keys: JwtKeys, policy: IssuePolicy, leeway_seconds: i64) -> Self {
        let service = Self::new(keys, policy);
        let issuer = service.policy.issuer.clone();

        service
            .resolvers
            .register(EXTRACT_EMAIL, Arc::new(EmailResolver))
            .register(EXTRACT_SUBJECT, Arc::new(SubjectResolver))
            .register(EXTRACT_ROLE, Arc::new(RoleResolver))
            .register(EXTRACT_STATE, Arc::new(StateResolver));
        service
            .generators
            .register(GENERATE_DATABASE_TOKEN, Arc::new(DatabaseTokenGenerator))
            .register(GENERATE_OAUTH2_TOKEN, Arc::new(OAuth2TokenGenerator))
            .register(GENERATE_STATE_TOKEN, Arc::new(StateTokenGenerator));
        service
            .validators
            .register(VALIDATE_ISSUER, Arc::new(IssuerValidator::new(issuer)))
            .register(
                VALIDATE_EXPIRATION,
                Arc::new(ExpirationValidator::new(leeway_seconds)),
            )
            .register(VALIDATE_STATE, Arc::new(StateValidator))
            .register(VALIDATE_ACCESS, Arc::new(AccessTokenValidator));

        service
    }

    pub fn resolvers(&self) -> &StrategyRegistry<dyn ClaimResolver> {
        &self.resolvers
    }

    pub fn generators(&self) -> &StrategyRegistry<dyn TokenGenerator> {
        &self.generators
    }

    pub fn validators(&self) -> &StrategyRegistry<dyn TokenValidator> {
        &self.validators
    }

    pub fn policy(&self) -> &IssuePolicy {
        &self.policy
    }

    pub fn generate_token(&self, source: &TokenSource, generator_key: &str) -> Result<String, TokenError> {
        let generator = self.generators.get(generator_key).ok_or_else(|| {
            TokenError::UnknownStrategy {
                kind: "generator",
                key: generator_key.to_string(),
            }
        })?;

        let claims = generator.generate(source, &self.policy)?;
        debug!(generator = generator_key, sub = %claims.sub, "issuing token");
        self.keys.sign(&claims)
    }

    /// Full decode (signature, structure, expiry), then the keyed validator.
    pub fn validate_token(&self, token: &str, validator_key: &str) -> Result<bool, TokenError> {
        let claims = self.keys.decode(token)?;
        self.run_validator(validator_key, token, &claims)
    }

    pub fn extract_claim<T: DeserializeOwned>(&self, token: &str, resolver_key: &str) -> Result<T, TokenError> {
        let claims = self.keys.decode(token)?;
        self.resolve_claim(&claims, resolver_key)
    }

    /// Resolve from claims that were already verified.
    pub fn resolve_claim<T: DeserializeOwned>(&self, claims: &Claims, resolver_key: &str) -> Result<T, TokenError> {
        let resolver = self.resolvers.get(resolver_key).ok_or_else(|| {
            TokenError::UnknownStrategy {
                kind: "claim resolver",
                key: resolver_key.to_string(),
            }
        })?;

        let value = resolver.resolve(claims)?;
        serde_json::from_value(value).map_err(|_| TokenError::InvalidClaim(resolver_key.to_string()))
    }

    pub fn run_validator(&self, validator_key: &str, token: &str, claims: &Claims) -> Result<bool, TokenError> {
        let validator = self.validators.get(validator_key).ok_or_else(|| {
            TokenError::UnknownStrategy {
                kind: "validator",
                key: validator_key.to_string(),
            }
        })?;
        Ok(validator.validate(token, claims))
    }

    pub fn decode(&self, token: &str) -> Result<Claims, TokenError> {
        self.keys.decode(token)
    }

    /// Signature and structure only; expiry is left to the caller.
    pub fn verify_signature(&self, token: &str) -> Result<Claims, TokenError> {
        self.keys.decode_signature_only(token)
    }
}
