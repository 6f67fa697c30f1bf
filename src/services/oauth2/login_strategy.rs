use std::sync::Arc;

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::Deserialize;
use tracing::info;

use crate::error::{AppError, OAuth2Error};
use crate::repos::{UserDirectory, UserRecord};
use crate::services::jwt::{JwtTokenService, TokenSource, strategies::GENERATE_OAUTH2_TOKEN};
use crate::services::oauth2::{
    client::{ExchangeRequest, TokenExchangeClient},
    flow::CallbackContext,
};

pub const TEST_LOGIN: &str = "test";
pub const PROD_LOGIN: &str = "prod";

/// Post-callback login for one deployment environment.
///
/// On success the strategy stores the application token in `ctx.issued_token`.
#[async_trait]
pub trait LoginStrategy: Send + Sync {
    async fn login(&self, ctx: &mut CallbackContext) -> Result<(), AppError>;
}

async fn find_user(users: &dyn UserDirectory, email: &str) -> Result<UserRecord, AppError> {
    users.find_by_email(email).await?.ok_or_else(|| {
        OAuth2Error::user("USER_NOT_FOUND", "no account is registered for this identity").into()
    })
}

/// Exchanges the code at the provider and maps the id token's email onto a local user.
pub struct ProdLoginStrategy {
    client: Arc<dyn TokenExchangeClient>,
    users: Arc<dyn UserDirectory>,
    jwt: Arc<JwtTokenService>,
}

impl ProdLoginStrategy {
    pub fn new(
        client: Arc<dyn TokenExchangeClient>,
        users: Arc<dyn UserDirectory>,
        jwt: Arc<JwtTokenService>,
    ) -> Self {
        Self { client, users, jwt }
    }
}

#[derive(Debug, Deserialize)]
struct IdTokenIdentity {
    email: Option<String>,
}

/// Email from an id token's payload. The token came straight from the token
/// endpoint over TLS, so its signature is not re-checked here.
fn id_token_email(id_token: &str) -> Result<String, OAuth2Error> {
    let invalid = || OAuth2Error::token_exchange("INVALID_TOKEN_RESPONSE", "id token is not a readable JWT");

    let payload = id_token.split('.').nth(1).ok_or_else(invalid)?;
    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| invalid().with_source(e))?;
    let identity: IdTokenIdentity = serde_json::from_slice(&bytes).map_err(|e| invalid().with_source(e))?;

    identity
        .email
        .filter(|e| !e.is_empty())
        .ok_or_else(|| OAuth2Error::user("EMAIL_CLAIM_MISSING", "the identity provider did not share an email"))
}

#[async_trait]
impl LoginStrategy for ProdLoginStrategy {
    async fn login(&self, ctx: &mut CallbackContext) -> Result<(), AppError> {
        let token_endpoint = ctx.provider.token_endpoint();
        let request = ExchangeRequest {
            token_endpoint: &token_endpoint,
            redirect_uri: &ctx.provider.redirect_uri,
            client_id: &ctx.state.client_id,
            client_secret: &ctx.state.client_secret,
            audience: &ctx.state.audience,
        };

        let tokens = self.client.exchange_code(&request, &ctx.code).await?;
        let id_token = tokens.id_token.as_deref().ok_or_else(|| {
            OAuth2Error::token_exchange("INVALID_TOKEN_RESPONSE", "token response carries no id token")
        })?;
        let email = id_token_email(id_token)?;

        let user = find_user(self.users.as_ref(), &email).await?;
        let token = self.jwt.generate_token(
            &TokenSource::OAuth2 {
                user,
                provider: ctx.provider.id.clone(),
            },
            GENERATE_OAUTH2_TOKEN,
        )?;

        info!(provider = %ctx.provider.id, identity = %email, "oauth2 login succeeded");
        ctx.email = Some(email);
        ctx.issued_token = Some(token);
        Ok(())
    }
}

/// Development login: trusts the submitted `email` and never calls the provider.
pub struct TestLoginStrategy {
    users: Arc<dyn UserDirectory>,
    jwt: Arc<JwtTokenService>,
}

impl TestLoginStrategy {
    pub fn new(users: Arc<dyn UserDirectory>, jwt: Arc<JwtTokenService>) -> Self {
        Self { users, jwt }
    }
}

#[async_trait]
impl LoginStrategy for TestLoginStrategy {
    async fn login(&self, ctx: &mut CallbackContext) -> Result<(), AppError> {
        let email = ctx
            .email
            .clone()
            .ok_or_else(|| OAuth2Error::authorization("MISSING_EMAIL", "email is required for test login"))?;

        let user = find_user(self.users.as_ref(), &email).await?;
        let token = self.jwt.generate_token(
            &TokenSource::OAuth2 {
                user,
                provider: ctx.provider.id.clone(),
            },
            GENERATE_OAUTH2_TOKEN,
        )?;

        info!(provider = %ctx.provider.id, identity = %email, "test login succeeded");
        ctx.issued_token = Some(token);
        Ok(())
    }
}
