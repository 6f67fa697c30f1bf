use std::sync::Arc;

use tracing::{debug, error};

use crate::context::RequestInfo;
use crate::error::{AppError, OAuth2Error};
use crate::registry::StrategyRegistry;
use crate::services::chain::{ValidationChain, ValidationContext};
use crate::services::jwt::StateCredentials;
use crate::services::oauth2::{
    ProviderRegistration, ProviderRegistry, login_strategy::LoginStrategy,
};

/// Everything one callback needs, assembled after the preflight chain passed.
#[derive(Debug, Clone)]
pub struct CallbackContext {
    pub email: Option<String>,
    pub code: String,
    pub state: StateCredentials,
    pub provider: ProviderRegistration,
    pub strategy_key: String,
    pub issued_token: Option<String>,
}

/// Handles `/auth/callback`: verify, pick the environment's login strategy, run it.
pub struct OAuth2CallbackFlow {
    chain: ValidationChain,
    providers: Arc<ProviderRegistry>,
    strategies: Arc<StrategyRegistry<dyn LoginStrategy>>,
    strategy_key: String,
}

impl OAuth2CallbackFlow {
    pub fn new(
        chain: ValidationChain,
        providers: Arc<ProviderRegistry>,
        strategies: Arc<StrategyRegistry<dyn LoginStrategy>>,
        strategy_key: impl Into<String>,
    ) -> Self {
        Self {
            chain,
            providers,
            strategies,
            strategy_key: strategy_key.into(),
        }
    }

    pub fn strategies(&self) -> &StrategyRegistry<dyn LoginStrategy> {
        &self.strategies
    }

    /// Runs the callback. The returned context always carries `issued_token`.
    pub async fn handle(&self, request: &RequestInfo, form_email: Option<String>) -> Result<CallbackContext, AppError> {
        let mut vctx = ValidationContext::from_request(request);
        if !self.chain.execute(&mut vctx) {
            return Err(vctx.take_failure().unwrap_or(AppError::Internal));
        }

        let (Some(state), Some(code), Some(provider_id)) = (vctx.state, vctx.code, vctx.provider_id) else {
            error!(chain = self.chain.name(), "callback chain passed without state, code or provider");
            return Err(AppError::Internal);
        };
        let provider = self.providers.require(&provider_id)?.clone();

        let mut ctx = CallbackContext {
            email: form_email.filter(|e| !e.is_empty()),
            code,
            state,
            provider,
            strategy_key: self.strategy_key.clone(),
            issued_token: None,
        };

        let strategy = self.strategies.get(&ctx.strategy_key).ok_or_else(|| {
            OAuth2Error::configuration(
                "UNKNOWN_LOGIN_STRATEGY",
                format!("no login strategy registered as '{}'", ctx.strategy_key),
            )
        })?;

        debug!(provider = %ctx.provider.id, strategy = %ctx.strategy_key, "running login strategy");
        strategy.login(&mut ctx).await?;

        if ctx.issued_token.is_none() {
            error!(strategy = %ctx.strategy_key, "login strategy finished without issuing a token");
            return Err(AppError::Internal);
        }
        Ok(ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OAuth2ErrorKind;
    use crate::repos::{InMemoryUserDirectory, UserRecord};
    use crate::services::chain::callback_chain;
    use crate::services::jwt::{
        IssuePolicy, JwtKeys, JwtTokenService, TokenSource,
        strategies::{EXTRACT_EMAIL, GENERATE_STATE_TOKEN},
    };
    use crate::services::oauth2::{
        client::{ExchangeRequest, TokenExchangeClient, TokenResponse},
        login_strategy::{PROD_LOGIN, ProdLoginStrategy, TEST_LOGIN, TestLoginStrategy},
        provider::test_provider,
    };
    use async_trait::async_trait;
    use axum::http::{HeaderMap, HeaderValue, Method, header};
    use base64::{
        Engine as _,
        engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD},
    };
    use std::sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    };
    use uuid::Uuid;

    /// Records every call; answers with a fixed id token.
    #[derive(Default)]
    struct CountingClient {
        calls: AtomicUsize,
        seen: Mutex<Vec<(String, String, String)>>,
    }

    #[async_trait]
    impl TokenExchangeClient for CountingClient {
        async fn exchange_code(&self, req: &ExchangeRequest<'_>, code: &str) -> Result<TokenResponse, OAuth2Error> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().unwrap().push((
                req.token_endpoint.to_string(),
                req.client_id.to_string(),
                code.to_string(),
            ));
            let payload = URL_SAFE_NO_PAD.encode(r#"{"email":"user@x.com"}"#);
            Ok(TokenResponse {
                access_token: "at".into(),
                refresh_token: None,
                id_token: Some(format!("h.{payload}.s")),
                token_type: "Bearer".into(),
                expires_in: None,
            })
        }

        async fn refresh(&self, _: &ExchangeRequest<'_>, _: &str) -> Result<TokenResponse, OAuth2Error> {
            unreachable!("refresh is not part of the callback")
        }
    }

    struct Fixture {
        jwt: Arc<JwtTokenService>,
        client: Arc<CountingClient>,
        users: Arc<InMemoryUserDirectory>,
        providers: Arc<ProviderRegistry>,
    }

    fn jwt(seed: &str) -> Arc<JwtTokenService> {
        let secret = STANDARD.encode(format!("{seed}-flow-secret-0123456789abcdef"));
        Arc::new(JwtTokenService::with_defaults(
            JwtKeys::from_base64_secret(&secret, 0).unwrap(),
            IssuePolicy {
                issuer: "authgate".into(),
                ttl_seconds: 3600,
                state_ttl_seconds: 300,
            },
            0,
        ))
    }

    fn fixture() -> Fixture {
        let users = Arc::new(InMemoryUserDirectory::new());
        users.insert(UserRecord {
            id: Uuid::new_v4(),
            email: "user@x.com".into(),
            user_type: "STORE".into(),
            password_hash: None,
        });
        Fixture {
            jwt: jwt("a"),
            client: Arc::new(CountingClient::default()),
            users,
            providers: Arc::new(
                ProviderRegistry::new(vec![test_provider("auth0", "https://tenant.example", None)]).unwrap(),
            ),
        }
    }

    fn flow(f: &Fixture, key: &str) -> OAuth2CallbackFlow {
        let strategies: Arc<StrategyRegistry<dyn LoginStrategy>> = Arc::new(StrategyRegistry::new("login-strategies"));
        strategies.register(
            PROD_LOGIN,
            Arc::new(ProdLoginStrategy::new(f.client.clone(), f.users.clone(), f.jwt.clone())),
        );
        strategies.register(TEST_LOGIN, Arc::new(TestLoginStrategy::new(f.users.clone(), f.jwt.clone())));

        OAuth2CallbackFlow::new(
            callback_chain(f.jwt.clone(), f.providers.clone(), "oauth_state"),
            f.providers.clone(),
            strategies,
            key,
        )
    }

    fn state_cookie(signer: &JwtTokenService) -> String {
        signer
            .generate_token(
                &TokenSource::State(StateCredentials {
                    provider: "auth0".into(),
                    state: "st-1".into(),
                    client_id: "state-cid".into(),
                    client_secret: "state-secret".into(),
                    audience: "aud".into(),
                }),
                GENERATE_STATE_TOKEN,
            )
            .unwrap()
    }

    fn request(uri: &str, cookie: &str) -> RequestInfo {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_str(&format!("oauth_state={cookie}")).unwrap(),
        );
        RequestInfo::new(Method::GET, uri.parse().unwrap(), headers, None)
    }

    #[tokio::test]
    async fn prod_flow_exchanges_with_state_credentials() {
        let f = fixture();
        let cookie = state_cookie(&f.jwt);
        let ctx = flow(&f, PROD_LOGIN)
            .handle(&request("/auth/callback?code=xyz&state=st-1", &cookie), None)
            .await
            .unwrap();

        assert_eq!(f.client.calls.load(Ordering::SeqCst), 1);
        let seen = f.client.seen.lock().unwrap().clone();
        assert_eq!(
            seen,
            vec![(
                "https://tenant.example/oauth/token".to_string(),
                "state-cid".to_string(),
                "xyz".to_string()
            )]
        );

        let token = ctx.issued_token.unwrap();
        let email: String = f.jwt.extract_claim(&token, EXTRACT_EMAIL).unwrap();
        assert_eq!(email, "user@x.com");
    }

    #[tokio::test]
    async fn tampered_state_cookie_fails_before_any_exchange() {
        let f = fixture();
        let forged = state_cookie(&jwt("attacker"));
        let err = flow(&f, PROD_LOGIN)
            .handle(&request("/auth/callback?code=xyz&state=st-1", &forged), None)
            .await
            .unwrap_err();

        assert_eq!(f.client.calls.load(Ordering::SeqCst), 0);
        match err {
            AppError::OAuth2(e) => {
                assert_eq!(e.kind, OAuth2ErrorKind::Configuration);
                assert_eq!(e.code, "INVALID_STATE_TOKEN");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test]
    async fn unknown_user_is_a_user_error() {
        let f = fixture();
        let cookie = state_cookie(&f.jwt);
        let err = flow(&f, TEST_LOGIN)
            .handle(
                &request("/auth/callback?code=xyz&state=st-1", &cookie),
                Some("stranger@x.com".into()),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::OAuth2(ref e) if e.code == "USER_NOT_FOUND"));
        assert_eq!(f.client.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_strategy_uses_form_email() {
        let f = fixture();
        let cookie = state_cookie(&f.jwt);
        let ctx = flow(&f, TEST_LOGIN)
            .handle(
                &request("/auth/callback?code=xyz&state=st-1", &cookie),
                Some("USER@x.com".into()),
            )
            .await
            .unwrap();

        assert!(ctx.issued_token.is_some());
        assert_eq!(ctx.strategy_key, "test");
        assert_eq!(f.client.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unregistered_environment_key() {
        let f = fixture();
        let cookie = state_cookie(&f.jwt);
        let err = flow(&f, "staging")
            .handle(&request("/auth/callback?code=xyz&state=st-1", &cookie), None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::OAuth2(ref e) if e.code == "UNKNOWN_LOGIN_STRATEGY"));
    }
}
