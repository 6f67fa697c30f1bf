//! Preflight checks for the OAuth2 callback. They all run before any call to
//! the provider's token endpoint.
use std::sync::Arc;

use serde_json::json;

use crate::context::params::query_param;
use crate::error::OAuth2Error;
use crate::services::auth::cookies::read_cookie;
use crate::services::chain::{ValidationContext, ValidationHandler};
use crate::services::jwt::{
    JwtTokenService, StateCredentials, TokenError,
    strategies::{EXTRACT_STATE, VALIDATE_STATE},
};
use crate::services::oauth2::ProviderRegistry;

/// Decodes the signed state cookie into `ctx.state`.
pub struct StateCookieHandler {
    jwt: Arc<JwtTokenService>,
    cookie_name: String,
}

impl StateCookieHandler {
    pub fn new(jwt: Arc<JwtTokenService>, cookie_name: impl Into<String>) -> Self {
        Self {
            jwt,
            cookie_name: cookie_name.into(),
        }
    }
}

impl ValidationHandler for StateCookieHandler {
    fn name(&self) -> &'static str {
        "state-cookie"
    }

    fn handle(&self, ctx: &mut ValidationContext) -> bool {
        let Some(token) = read_cookie(&ctx.headers, &self.cookie_name) else {
            return ctx.fail(OAuth2Error::authorization(
                "MISSING_STATE_TOKEN",
                "login session expired, please sign in again",
            ));
        };

        // Full decode: signature, structure and expiry.
        let decoded = self.jwt.decode(&token).and_then(|claims| {
            if !self.jwt.run_validator(VALIDATE_STATE, &token, &claims)? {
                return Err(TokenError::Rejected(VALIDATE_STATE.to_string()));
            }
            self.jwt.resolve_claim::<StateCredentials>(&claims, EXTRACT_STATE)
        });

        match decoded {
            Ok(state) => {
                ctx.state = Some(state);
                true
            }
            Err(e) => ctx.fail(
                OAuth2Error::configuration("INVALID_STATE_TOKEN", "state token failed verification")
                    .with_source(e),
            ),
        }
    }
}

/// The `state` query parameter must echo the one sealed in the cookie.
pub struct StateMatchHandler;

impl ValidationHandler for StateMatchHandler {
    fn name(&self) -> &'static str {
        "state-match"
    }

    fn handle(&self, ctx: &mut ValidationContext) -> bool {
        let returned = query_param(&ctx.uri, "state");
        let matches = match (returned.as_deref(), ctx.state.as_ref()) {
            (Some(r), Some(sealed)) => r == sealed.state,
            _ => false,
        };

        if matches {
            true
        } else {
            ctx.fail(OAuth2Error::authorization(
                "STATE_MISMATCH",
                "authorization response does not belong to this login",
            ))
        }
    }
}

/// Requires an authorization `code`. A provider `error` is reported as such.
pub struct AuthorizationCodeHandler;

impl ValidationHandler for AuthorizationCodeHandler {
    fn name(&self) -> &'static str {
        "authorization-code"
    }

    fn handle(&self, ctx: &mut ValidationContext) -> bool {
        if let Some(code) = query_param(&ctx.uri, "code") {
            ctx.code = Some(code);
            return true;
        }

        match query_param(&ctx.uri, "error") {
            Some(error) => {
                let description = query_param(&ctx.uri, "error_description");
                ctx.fail(
                    OAuth2Error::authorization("ACCESS_DENIED", "the identity provider denied the login")
                        .with_details(json!({ "error": error, "error_description": description })),
                )
            }
            None => ctx.fail(OAuth2Error::authorization(
                "MISSING_CODE",
                "authorization code missing from callback",
            )),
        }
    }
}

/// The provider named in the state token must still be registered.
pub struct ProviderKnownHandler {
    providers: Arc<ProviderRegistry>,
}

impl ProviderKnownHandler {
    pub fn new(providers: Arc<ProviderRegistry>) -> Self {
        Self { providers }
    }
}

impl ValidationHandler for ProviderKnownHandler {
    fn name(&self) -> &'static str {
        "provider-known"
    }

    fn handle(&self, ctx: &mut ValidationContext) -> bool {
        let Some(provider) = ctx.state.as_ref().map(|s| s.provider.clone()) else {
            return ctx.fail(OAuth2Error::configuration(
                "INVALID_STATE_TOKEN",
                "state token carries no provider",
            ));
        };
        match self.providers.require(&provider) {
            Ok(_) => {
                ctx.provider_id = Some(provider);
                true
            }
            Err(e) => ctx.fail(e),
        }
    }
}
