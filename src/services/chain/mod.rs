//! Ordered, short-circuiting validation chains and the handler sets used by
//! each deployment.
#[allow(clippy::module_inception)]
mod chain;
mod context;
pub mod handlers;

use std::sync::Arc;

pub use chain::{ValidationChain, ValidationHandler};
pub use context::ValidationContext;

use crate::services::jwt::JwtTokenService;
use crate::services::oauth2::ProviderRegistry;
use handlers::{
    AuthorizationCodeHandler, ExpiryHandler, IpAllowListHandler, IpRestrictions, IssuerHandler,
    ProviderKnownHandler, SignatureHandler, StateCookieHandler, StateMatchHandler,
    TokenExtractionHandler, TokenUseHandler,
};

/// Checks run by the gateway on every protected request before any strategy is picked.
pub fn route_access_chain(restrictions: Arc<IpRestrictions>) -> ValidationChain {
    ValidationChain::new("route-access").add_handler(IpAllowListHandler::new(restrictions))
}

/// Extraction, signature, token use, expiry, issuer.
/// The IP allow-list has already run in `route_access_chain`.
pub fn production_jwt_chain(jwt: Arc<JwtTokenService>, auth_cookie: &str) -> ValidationChain {
    ValidationChain::new("jwt-production")
        .add_handler(TokenExtractionHandler::new(auth_cookie))
        .add_handler(SignatureHandler::new(jwt.clone()))
        .add_handler(TokenUseHandler::new(jwt.clone()))
        .add_handler(ExpiryHandler::new(jwt.clone()))
        .add_handler(IssuerHandler::new(jwt))
}

/// Development deployments skip the issuer check.
pub fn test_jwt_chain(jwt: Arc<JwtTokenService>, auth_cookie: &str) -> ValidationChain {
    ValidationChain::new("jwt-test")
        .add_handler(TokenExtractionHandler::new(auth_cookie))
        .add_handler(SignatureHandler::new(jwt.clone()))
        .add_handler(TokenUseHandler::new(jwt.clone()))
        .add_handler(ExpiryHandler::new(jwt))
}

/// State cookie, state echo, code presence, provider lookup.
pub fn callback_chain(
    jwt: Arc<JwtTokenService>,
    providers: Arc<ProviderRegistry>,
    state_cookie: &str,
) -> ValidationChain {
    ValidationChain::new("oauth2-callback")
        .add_handler(StateCookieHandler::new(jwt, state_cookie))
        .add_handler(StateMatchHandler)
        .add_handler(AuthorizationCodeHandler)
        .add_handler(ProviderKnownHandler::new(providers))
}
