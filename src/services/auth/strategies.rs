//! Built-in authentication strategies, registered as `{type}AuthStrategy`.
use std::sync::Arc;

use async_trait::async_trait;
use axum::http::header;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use tracing::debug;

use crate::context::RequestContext;
use crate::error::AppError;
use crate::services::auth::{
    cookies::{CookieNames, read_cookie, state_cookie},
    password::PasswordLogin,
    strategy::{AuthMethod, AuthenticationStrategy, Principal},
};
use crate::services::chain::{ValidationChain, ValidationContext};
use crate::services::jwt::{
    JwtTokenService,
    strategies::{VALIDATE_ACCESS, VALIDATE_ISSUER},
};
use crate::services::maintenance::MaintenanceFlag;
use crate::services::oauth2::{ProviderRegistry, begin_authorization};

pub const CLAIMS_STORAGE_KEY: &str = "auth.claims";

/// Bearer or cookie JWT, checked by a validation chain.
pub struct JwtAuthStrategy {
    chain: ValidationChain,
    jwt: Arc<JwtTokenService>,
    login_url: String,
}

impl JwtAuthStrategy {
    pub fn new(chain: ValidationChain, jwt: Arc<JwtTokenService>, login_url: impl Into<String>) -> Self {
        Self {
            chain,
            jwt,
            login_url: login_url.into(),
        }
    }
}

#[async_trait]
impl AuthenticationStrategy for JwtAuthStrategy {
    async fn authenticate(&self, ctx: &RequestContext) -> Result<Principal, AppError> {
        let mut vctx = ValidationContext::from_request(ctx.request());

        if !self.chain.execute(&mut vctx) {
            let failure = vctx.take_failure().unwrap_or(AppError::Internal);
            // Browsers get sent to the login page; API clients get the error.
            if matches!(failure, AppError::Unauthorized { .. }) && ctx.request().wants_html() {
                return Err(AppError::redirect(self.login_url.clone()));
            }
            return Err(failure);
        }

        let Some(claims) = vctx.claims else {
            tracing::error!(chain = self.chain.name(), "jwt chain passed without claims");
            return Err(AppError::Internal);
        };
        if let Ok(value) = serde_json::to_value(&claims) {
            ctx.storage().set(CLAIMS_STORAGE_KEY, value);
        }

        let method = Principal::method_of(&claims, AuthMethod::Jwt);
        Ok(Principal::from_claims(&self.jwt, &claims, method)?)
    }
}

/// HTTP Basic credentials checked against the user directory.
pub struct DatabaseAuthStrategy {
    login: Arc<PasswordLogin>,
}

impl DatabaseAuthStrategy {
    pub fn new(login: Arc<PasswordLogin>) -> Self {
        Self { login }
    }
}

fn basic_credentials(value: &str) -> Option<(String, String)> {
    let encoded = value.strip_prefix("Basic ")?.trim();
    let decoded = STANDARD.decode(encoded).ok()?;
    let text = String::from_utf8(decoded).ok()?;
    let (email, password) = text.split_once(':')?;
    Some((email.to_string(), password.to_string()))
}

#[async_trait]
impl AuthenticationStrategy for DatabaseAuthStrategy {
    async fn authenticate(&self, ctx: &RequestContext) -> Result<Principal, AppError> {
        let Some(header_value) = ctx.request().header_str(header::AUTHORIZATION.as_str()) else {
            return Err(AppError::StopMatch);
        };
        let Some((email, password)) = basic_credentials(header_value) else {
            return Err(AppError::unauthorized(
                "INVALID_CREDENTIALS",
                "expected HTTP Basic credentials",
            ));
        };

        let success = self.login.login(&email, &password).await?;
        Ok(Principal {
            subject: success.user.id.to_string(),
            email: Some(success.user.email.clone()),
            headquarters: success.user.is_headquarters(),
            method: AuthMethod::Database,
        })
    }
}

/// Accepts an application cookie; otherwise starts the provider login.
pub struct OAuth2AuthStrategy {
    jwt: Arc<JwtTokenService>,
    providers: Arc<ProviderRegistry>,
    cookies: CookieNames,
}

impl OAuth2AuthStrategy {
    pub fn new(jwt: Arc<JwtTokenService>, providers: Arc<ProviderRegistry>, cookies: CookieNames) -> Self {
        Self {
            jwt,
            providers,
            cookies,
        }
    }

    fn from_cookie(&self, ctx: &RequestContext) -> Option<Principal> {
        let token = read_cookie(ctx.request().headers(), &self.cookies.auth)?;
        let claims = self.jwt.decode(&token).ok()?;
        for key in [VALIDATE_ACCESS, VALIDATE_ISSUER] {
            if !self.jwt.run_validator(key, &token, &claims).ok()? {
                debug!(validator = key, "ignoring application cookie");
                return None;
            }
        }
        Principal::from_claims(&self.jwt, &claims, AuthMethod::OAuth2).ok()
    }
}

#[async_trait]
impl AuthenticationStrategy for OAuth2AuthStrategy {
    async fn authenticate(&self, ctx: &RequestContext) -> Result<Principal, AppError> {
        if let Some(principal) = self.from_cookie(ctx) {
            return Ok(principal);
        }

        let provider = self.providers.select_for_path(ctx.request().path())?;
        let start = begin_authorization(provider, &self.jwt)?;
        ctx.response()
            .add_cookie(state_cookie(&self.cookies.state, start.state_token));

        debug!(provider = %provider.id, path = ctx.request().path(), "redirecting to identity provider");
        Err(AppError::redirect(start.location))
    }
}

/// Sends callers to the maintenance page while the flag is set.
/// Never yields a principal.
pub struct MaintenanceAuthStrategy {
    flag: MaintenanceFlag,
    maintenance_path: String,
}

impl MaintenanceAuthStrategy {
    pub fn new(flag: MaintenanceFlag, maintenance_path: impl Into<String>) -> Self {
        Self {
            flag,
            maintenance_path: maintenance_path.into(),
        }
    }
}

#[async_trait]
impl AuthenticationStrategy for MaintenanceAuthStrategy {
    async fn authenticate(&self, _ctx: &RequestContext) -> Result<Principal, AppError> {
        if self.flag.is_enabled() {
            Err(AppError::redirect(self.maintenance_path.clone()))
        } else {
            Err(AppError::StopMatch)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::RequestInfo;
    use crate::error::OAuth2ErrorKind;
    use crate::repos::{InMemoryUserDirectory, UserRecord};
    use crate::services::auth::password::tests::PlainVerifier;
    use crate::services::cache::MemoryCache;
    use crate::services::chain::test_jwt_chain;
    use crate::services::jwt::{
        IssuePolicy, JwtKeys, TokenSource, strategies::GENERATE_DATABASE_TOKEN,
    };
    use crate::services::login_limiter::{CacheLoginAttemptLimiter, LockoutPolicy};
    use crate::services::oauth2::provider::test_provider;
    use axum::http::{HeaderMap, HeaderValue, Method, StatusCode};
    use uuid::Uuid;

    fn jwt() -> Arc<JwtTokenService> {
        let secret = STANDARD.encode("strategies-secret-0123456789abcdef");
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

    fn user() -> UserRecord {
        UserRecord {
            id: Uuid::new_v4(),
            email: "boss@x.com".into(),
            user_type: "HEADQUARTERS".into(),
            password_hash: Some("pw".into()),
        }
    }

    fn ctx(path: &str, headers: &[(header::HeaderName, &str)]) -> RequestContext {
        let mut map = HeaderMap::new();
        for (name, value) in headers {
            map.insert(name.clone(), HeaderValue::from_str(value).unwrap());
        }
        RequestContext::new(RequestInfo::new(Method::GET, path.parse().unwrap(), map, None))
    }

    #[tokio::test]
    async fn jwt_strategy_builds_principal() {
        let svc = jwt();
        let token = svc
            .generate_token(&TokenSource::User(user()), GENERATE_DATABASE_TOKEN)
            .unwrap();
        let strategy = JwtAuthStrategy::new(test_jwt_chain(svc.clone(), "access_token"), svc, "/login");

        let c = ctx("/api/v1/me", &[(header::AUTHORIZATION, format!("Bearer {token}").as_str())]);
        let principal = strategy.authenticate(&c).await.unwrap();
        assert_eq!(principal.email.as_deref(), Some("boss@x.com"));
        assert!(principal.headquarters);
        assert_eq!(principal.method, AuthMethod::Database);
        assert!(c.storage().get(CLAIMS_STORAGE_KEY).is_some());
    }

    #[tokio::test]
    async fn jwt_strategy_redirects_browsers_only() {
        let svc = jwt();
        let strategy = JwtAuthStrategy::new(test_jwt_chain(svc.clone(), "access_token"), svc, "/login");

        let api = ctx("/api/v1/me", &[(header::ACCEPT, "application/json")]);
        let err = strategy.authenticate(&api).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);

        let browser = ctx("/dashboard", &[(header::ACCEPT, "text/html,application/xhtml+xml")]);
        match strategy.authenticate(&browser).await.unwrap_err() {
            AppError::Redirect { location, status } => {
                assert_eq!(location, "/login");
                assert_eq!(status, StatusCode::FOUND);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn database_strategy_reads_basic_auth() {
        let users = Arc::new(InMemoryUserDirectory::new());
        users.insert(user());
        let limiter = Arc::new(CacheLoginAttemptLimiter::new(
            Arc::new(MemoryCache::new(10)),
            LockoutPolicy::default(),
        ));
        let login = Arc::new(PasswordLogin::new(users, Arc::new(PlainVerifier), limiter, jwt()));
        let strategy = DatabaseAuthStrategy::new(login);

        let creds = STANDARD.encode("boss@x.com:pw");
        let c = ctx("/api/v1/me", &[(header::AUTHORIZATION, format!("Basic {creds}").as_str())]);
        let principal = strategy.authenticate(&c).await.unwrap();
        assert_eq!(principal.method, AuthMethod::Database);

        let none = ctx("/api/v1/me", &[]);
        assert!(matches!(strategy.authenticate(&none).await, Err(AppError::StopMatch)));

        let garbled = ctx("/api/v1/me", &[(header::AUTHORIZATION, "Basic %%%")]);
        assert!(matches!(
            strategy.authenticate(&garbled).await,
            Err(AppError::Unauthorized { .. })
        ));
    }

    #[tokio::test]
    async fn oauth2_strategy_redirects_with_state_cookie() {
        let providers = Arc::new(
            ProviderRegistry::new(vec![test_provider("stores", "https://idp.example", Some("/stores/**"))])
                .unwrap(),
        );
        let strategy = OAuth2AuthStrategy::new(jwt(), providers, CookieNames::default());

        let c = ctx("/stores/42", &[]);
        match strategy.authenticate(&c).await.unwrap_err() {
            AppError::Redirect { location, .. } => {
                assert!(location.starts_with("https://idp.example/authorize?"));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(!c.response().is_empty());

        let unmatched = ctx("/elsewhere", &[]);
        match strategy.authenticate(&unmatched).await.unwrap_err() {
            AppError::OAuth2(e) => assert_eq!(e.kind, OAuth2ErrorKind::Configuration),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn oauth2_strategy_accepts_app_cookie() {
        let svc = jwt();
        let token = svc
            .generate_token(
                &TokenSource::OAuth2 {
                    user: user(),
                    provider: "stores".into(),
                },
                crate::services::jwt::strategies::GENERATE_OAUTH2_TOKEN,
            )
            .unwrap();
        let strategy = OAuth2AuthStrategy::new(svc, Arc::new(ProviderRegistry::default()), CookieNames::default());

        let c = ctx("/stores/1", &[(header::COOKIE, format!("access_token={token}").as_str())]);
        let principal = strategy.authenticate(&c).await.unwrap();
        assert_eq!(principal.method, AuthMethod::OAuth2);
        assert!(c.response().is_empty());
    }

    #[tokio::test]
    async fn oauth2_strategy_ignores_state_token_in_app_cookie() {
        let svc = jwt();
        let state = svc
            .generate_token(
                &TokenSource::State(crate::services::jwt::StateCredentials {
                    provider: "stores".into(),
                    state: "s-1".into(),
                    client_id: "cid".into(),
                    client_secret: "csecret".into(),
                    audience: "aud".into(),
                }),
                crate::services::jwt::strategies::GENERATE_STATE_TOKEN,
            )
            .unwrap();
        let providers = Arc::new(
            ProviderRegistry::new(vec![test_provider("stores", "https://idp.example", Some("/stores/**"))])
                .unwrap(),
        );
        let strategy = OAuth2AuthStrategy::new(svc, providers, CookieNames::default());

        let c = ctx("/stores/1", &[(header::COOKIE, format!("access_token={state}").as_str())]);
        // Treated as no cookie at all: the provider login starts over.
        assert!(matches!(
            strategy.authenticate(&c).await,
            Err(AppError::Redirect { .. })
        ));
    }

    #[tokio::test]
    async fn maintenance_strategy_never_grants_a_principal() {
        let flag = MaintenanceFlag::new();
        let strategy = MaintenanceAuthStrategy::new(flag.clone(), "/maintenance");
        let c = ctx("/api/v1/me", &[]);

        assert!(matches!(strategy.authenticate(&c).await, Err(AppError::StopMatch)));
        flag.set(true);
        match strategy.authenticate(&c).await.unwrap_err() {
            AppError::Redirect { location, .. } => assert_eq!(location, "/maintenance"),
            other => panic!("unexpected {other:?}"),
        }
    }
}
