#![allow(dead_code)]

use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, Response},
};
use authgate::{
    app::build_router,
    config::Config,
    error::OAuth2Error,
    repos::{InMemoryUserDirectory, UserRecord},
    services::{
        auth::BcryptVerifier,
        cache::MemoryCache,
        factory::{Collaborators, build_state},
        login_limiter::{CacheLoginAttemptLimiter, LockoutPolicy},
        maintenance::MaintenanceFlag,
        oauth2::{ExchangeRequest, TokenExchangeClient, TokenResponse},
    },
    state::AppState,
};
use tower::ServiceExt;
use uuid::Uuid;

pub const EMAIL: &str = "alice@example.com";
pub const PASSWORD: &str = "correct horse battery staple";

/// Counts token endpoint calls; every call fails.
#[derive(Default)]
pub struct CountingTokenClient {
    pub calls: AtomicUsize,
}

#[async_trait]
impl TokenExchangeClient for CountingTokenClient {
    async fn exchange_code(&self, _req: &ExchangeRequest<'_>, _code: &str) -> Result<TokenResponse, OAuth2Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(OAuth2Error::token_exchange("TOKEN_EXCHANGE_FAILED", "no provider in tests"))
    }

    async fn refresh(&self, _req: &ExchangeRequest<'_>, _refresh_token: &str) -> Result<TokenResponse, OAuth2Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(OAuth2Error::token_exchange("TOKEN_EXCHANGE_FAILED", "no provider in tests"))
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub user: UserRecord,
    pub token_client: Arc<CountingTokenClient>,
}

impl TestApp {
    pub async fn send(&self, req: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(req).await.unwrap()
    }
}

fn vars() -> HashMap<String, String> {
    [
        ("JWT_SECRET", "aW50ZWdyYXRpb24tdGVzdC1zZWNyZXQtMDEyMzQ1Njc4OQ=="),
        ("JWT_ISSUER", "authgate-test"),
        ("OAUTH2_PROVIDERS", "acme"),
        ("OAUTH2_ACME_ISSUER", "https://idp.acme.example"),
        ("OAUTH2_ACME_CLIENT_ID", "acme-client"),
        ("OAUTH2_ACME_CLIENT_SECRET", "acme-secret"),
        ("OAUTH2_ACME_AUDIENCE", "https://api.acme.example"),
        ("OAUTH2_ACME_REDIRECT_URI", "https://app.example/auth/callback"),
        ("OAUTH2_ACME_PATH_PATTERN", "/api/**"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

pub fn spawn_app() -> TestApp {
    spawn_app_with(&[])
}

pub fn spawn_app_with(overrides: &[(&str, &str)]) -> TestApp {
    let mut vars = vars();
    for (k, v) in overrides {
        vars.insert(k.to_string(), v.to_string());
    }
    let config = Config::from_lookup(|k| vars.get(k).cloned()).unwrap();

    let user = UserRecord {
        id: Uuid::new_v4(),
        email: EMAIL.to_string(),
        user_type: "STORE".to_string(),
        password_hash: Some(bcrypt::hash(PASSWORD, 4).unwrap()),
    };
    let users = InMemoryUserDirectory::new();
    users.insert(user.clone());

    let token_client = Arc::new(CountingTokenClient::default());
    let collaborators = Collaborators {
        users: Arc::new(users),
        verifier: Arc::new(BcryptVerifier),
        limiter: Arc::new(CacheLoginAttemptLimiter::new(
            Arc::new(MemoryCache::new(1_000)),
            LockoutPolicy::default(),
        )),
        token_client: token_client.clone(),
        maintenance: MaintenanceFlag::new(),
    };

    let state = build_state(config, collaborators).unwrap();
    TestApp {
        router: build_router(state.clone()),
        state,
        user,
        token_client,
    }
}

pub async fn json_body(res: Response<Body>) -> serde_json::Value {
    let bytes = to_bytes(res.into_body(), 64 * 1024).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

pub async fn error_code(res: Response<Body>) -> String {
    json_body(res).await["error"]["code"]
        .as_str()
        .unwrap_or_default()
        .to_string()
}

pub fn set_cookies(res: &Response<Body>) -> Vec<String> {
    res.headers()
        .get_all(axum::http::header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .map(str::to_string)
        .collect()
}
