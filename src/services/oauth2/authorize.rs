use url::Url;
use uuid::Uuid;

use crate::error::{AppError, OAuth2Error};
use crate::services::jwt::{
    JwtTokenService, StateCredentials, TokenSource, strategies::GENERATE_STATE_TOKEN,
};
use crate::services::oauth2::ProviderRegistration;

/// Redirect target plus the state token that must ride along in a cookie.
#[derive(Debug, Clone)]
pub struct AuthorizationStart {
    pub location: String,
    pub state_token: String,
}

/// Mint a state token for `provider` and build its authorize URL.
pub fn begin_authorization(
    provider: &ProviderRegistration,
    jwt: &JwtTokenService,
) -> Result<AuthorizationStart, AppError> {
    let state = Uuid::new_v4().simple().to_string();
    let credentials = StateCredentials {
        provider: provider.id.clone(),
        state: state.clone(),
        client_id: provider.client_id.clone(),
        client_secret: provider.client_secret.clone(),
        audience: provider.audience.clone(),
    };
    let state_token = jwt.generate_token(&TokenSource::State(credentials), GENERATE_STATE_TOKEN)?;

    let scope = provider.scope();
    let location = Url::parse_with_params(
        &provider.authorize_endpoint(),
        &[
            ("response_type", "code"),
            ("client_id", provider.client_id.as_str()),
            ("redirect_uri", provider.redirect_uri.as_str()),
            ("scope", scope.as_str()),
            ("audience", provider.audience.as_str()),
            ("state", state.as_str()),
        ],
    )
    .map_err(|e| {
        OAuth2Error::configuration(
            "INVALID_PROVIDER_ISSUER",
            format!("provider '{}' issuer is not a valid URL", provider.id),
        )
        .with_source(e)
    })?;

    Ok(AuthorizationStart {
        location: location.into(),
        state_token,
    })
}
