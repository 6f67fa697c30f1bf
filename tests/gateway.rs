mod common;

use std::net::SocketAddr;

use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{HeaderValue, Request, StatusCode, header},
};
use authgate::services::jwt::{TokenSource, strategies::GENERATE_DATABASE_TOKEN};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use common::{EMAIL, PASSWORD, error_code, json_body, set_cookies, spawn_app, spawn_app_with};

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn basic(email: &str, password: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{email}:{password}")))
}

#[tokio::test]
async fn health_is_public() {
    let app = spawn_app();
    let res = app.send(get("/health")).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(json_body(res).await["maintenance"], false);
}

#[tokio::test]
async fn excluded_paths_are_not_authenticated() {
    let app = spawn_app();
    let res = app.send(get("/static/app.css")).await;
    assert_ne!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn protected_path_without_token_is_401() {
    let app = spawn_app();
    let res = app.send(get("/api/v1/me")).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(error_code(res).await, "MISSING_TOKEN");
}

#[tokio::test]
async fn browsers_are_sent_to_login_and_target_is_remembered() {
    let app = spawn_app();
    let req = Request::builder()
        .uri("/api/v1/me?redirect_to=%2Freports")
        .header(header::ACCEPT, "text/html,application/xhtml+xml")
        .body(Body::empty())
        .unwrap();

    let res = app.send(req).await;
    assert_eq!(res.status(), StatusCode::FOUND);
    assert_eq!(res.headers()[header::LOCATION], "/login");
    assert!(set_cookies(&res).iter().any(|c| c.starts_with("redirect_to=")));
}

#[tokio::test]
async fn bearer_token_yields_principal() {
    let app = spawn_app();
    let token = app
        .state
        .jwt
        .generate_token(&TokenSource::User(app.user.clone()), GENERATE_DATABASE_TOKEN)
        .unwrap();

    let req = Request::builder()
        .uri("/api/v1/me")
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    let res = app.send(req).await;
    assert_eq!(res.status(), StatusCode::OK);

    let body = json_body(res).await;
    assert_eq!(body["subject"], app.user.id.to_string());
    assert_eq!(body["email"], EMAIL);
    assert_eq!(body["method"], "database");
}

#[tokio::test]
async fn tampered_bearer_token_is_rejected() {
    let app = spawn_app();
    let mut token = app
        .state
        .jwt
        .generate_token(&TokenSource::User(app.user.clone()), GENERATE_DATABASE_TOKEN)
        .unwrap();
    // Flip one character inside the signature segment.
    let at = token.len() - 10;
    let flipped = if &token[at..at + 1] == "A" { "B" } else { "A" };
    token.replace_range(at..at + 1, flipped);

    let req = Request::builder()
        .uri("/api/v1/me")
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    let res = app.send(req).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn unknown_authorization_type_is_401() {
    let app = spawn_app();
    let req = Request::builder()
        .uri("/api/v1/me")
        .header("Authorization-Type", "carrier-pigeon")
        .body(Body::empty())
        .unwrap();
    let res = app.send(req).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(error_code(res).await, "UNKNOWN_AUTH_TYPE");
}

#[tokio::test]
async fn default_auth_type_is_configurable() {
    let app = spawn_app_with(&[("DEFAULT_AUTH_TYPE", "database")]);
    let req = Request::builder()
        .uri("/api/v1/me")
        .header(header::AUTHORIZATION, basic(EMAIL, PASSWORD))
        .body(Body::empty())
        .unwrap();
    let res = app.send(req).await;
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn database_strategy_without_credentials_continues_unauthenticated() {
    let app = spawn_app();
    let req = Request::builder()
        .uri("/api/v1/me")
        .header("Authorization-Type", "database")
        .body(Body::empty())
        .unwrap();
    // The strategy declines, the handler then finds no principal.
    let res = app.send(req).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(error_code(res).await, "UNAUTHORIZED");
}

#[tokio::test]
async fn basic_auth_lockout_end_to_end() {
    let app = spawn_app();
    let attempt = |password: &str| {
        Request::builder()
            .uri("/api/v1/me")
            .header("Authorization-Type", "database")
            .header(header::AUTHORIZATION, basic(EMAIL, password))
            .body(Body::empty())
            .unwrap()
    };

    for _ in 0..5 {
        let res = app.send(attempt("wrong")).await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(error_code(res).await, "INVALID_CREDENTIALS");
    }

    // Correct password, still locked out.
    let res = app.send(attempt(PASSWORD)).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(error_code(res).await, "ACCOUNT_LOCKED");
}

#[tokio::test]
async fn successful_login_clears_failures() {
    let app = spawn_app();
    let attempt = |password: &str| {
        Request::builder()
            .uri("/api/v1/me")
            .header("Authorization-Type", "database")
            .header(header::AUTHORIZATION, basic(EMAIL, password))
            .body(Body::empty())
            .unwrap()
    };

    for _ in 0..4 {
        app.send(attempt("wrong")).await;
    }
    assert_eq!(app.send(attempt(PASSWORD)).await.status(), StatusCode::OK);
    for _ in 0..4 {
        app.send(attempt("wrong")).await;
    }
    assert_eq!(app.send(attempt(PASSWORD)).await.status(), StatusCode::OK);
}

#[tokio::test]
async fn request_id_is_propagated() {
    let app = spawn_app();
    let req = Request::builder()
        .uri("/health")
        .header("x-request-id", "req-42")
        .body(Body::empty())
        .unwrap();
    let res = app.send(req).await;
    assert_eq!(res.headers()["x-request-id"], "req-42");
}

fn bearer(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap()
}

fn from_peer(mut req: Request<Body>, peer: [u8; 4]) -> Request<Body> {
    req.extensions_mut()
        .insert(ConnectInfo(SocketAddr::from((peer, 40_000))));
    req
}

#[tokio::test]
async fn state_token_cannot_be_replayed_as_bearer() {
    for env in ["development", "production"] {
        let app = spawn_app_with(&[("APP_ENV", env)]);
        let start = Request::builder()
            .uri("/api/v1/me")
            .header("Authorization-Type", "oauth2")
            .body(Body::empty())
            .unwrap();
        let res = app.send(start).await;
        assert_eq!(res.status(), StatusCode::FOUND);

        let state_token = set_cookies(&res)
            .iter()
            .find_map(|c| c.strip_prefix("oauth_state="))
            .and_then(|rest| rest.split(';').next())
            .map(str::to_string)
            .expect("state cookie");

        let res = app.send(bearer("/api/v1/me", &state_token)).await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED, "{env}");
        assert_eq!(error_code(res).await, "INVALID_TOKEN_USE");

        // Nor as the application cookie on the oauth2 path.
        let req = Request::builder()
            .uri("/api/v1/me")
            .header("Authorization-Type", "oauth2")
            .header(header::COOKIE, format!("access_token={state_token}"))
            .body(Body::empty())
            .unwrap();
        assert_eq!(app.send(req).await.status(), StatusCode::FOUND, "{env}");
    }
}

const RESTRICTED: [(&str, &str); 2] = [("APP_ENV", "production"), ("IP_RESTRICTIONS", "/api/**=10.0.0.0/8")];

#[tokio::test]
async fn ip_allow_list_applies_to_every_strategy() {
    let app = spawn_app_with(&RESTRICTED);
    let token = app
        .state
        .jwt
        .generate_token(&TokenSource::User(app.user.clone()), GENERATE_DATABASE_TOKEN)
        .unwrap();
    let database = || {
        Request::builder()
            .uri("/api/v1/me")
            .header("Authorization-Type", "database")
            .header(header::AUTHORIZATION, basic(EMAIL, PASSWORD))
            .body(Body::empty())
            .unwrap()
    };
    let oauth2 = || {
        Request::builder()
            .uri("/api/v1/me")
            .header("Authorization-Type", "oauth2")
            .body(Body::empty())
            .unwrap()
    };

    // Unknown client address.
    assert_eq!(app.send(database()).await.status(), StatusCode::FORBIDDEN);
    assert_eq!(app.send(oauth2()).await.status(), StatusCode::FORBIDDEN);
    assert_eq!(app.send(bearer("/api/v1/me", &token)).await.status(), StatusCode::FORBIDDEN);

    // Outside the allowed range.
    let res = app.send(from_peer(database(), [192, 168, 0, 9])).await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    // Inside it.
    assert_eq!(app.send(from_peer(database(), [10, 1, 2, 3])).await.status(), StatusCode::OK);
    assert_eq!(
        app.send(from_peer(bearer("/api/v1/me", &token), [10, 1, 2, 3])).await.status(),
        StatusCode::OK
    );
    assert_eq!(app.send(from_peer(oauth2(), [10, 1, 2, 3])).await.status(), StatusCode::FOUND);

    // Unprotected paths are not subject to it.
    assert_eq!(app.send(get("/health")).await.status(), StatusCode::OK);
}

#[tokio::test]
async fn ip_allow_list_blocks_failed_lookups_before_the_limiter() {
    let app = spawn_app_with(&RESTRICTED);
    let attempt = || {
        Request::builder()
            .uri("/api/v1/me")
            .header("Authorization-Type", "database")
            .header(header::AUTHORIZATION, basic(EMAIL, "wrong"))
            .body(Body::empty())
            .unwrap()
    };
    for _ in 0..10 {
        assert_eq!(app.send(attempt()).await.status(), StatusCode::FORBIDDEN);
    }
    // Rejected requests never reached the password check, so nothing is locked.
    let ok = Request::builder()
        .uri("/api/v1/me")
        .header("Authorization-Type", "database")
        .header(header::AUTHORIZATION, basic(EMAIL, PASSWORD))
        .body(Body::empty())
        .unwrap();
    assert_eq!(app.send(from_peer(ok, [10, 0, 0, 1])).await.status(), StatusCode::OK);
}

#[tokio::test]
async fn client_supplied_forwarded_for_is_ignored() {
    let app = spawn_app_with(&RESTRICTED);
    let token = app
        .state
        .jwt
        .generate_token(&TokenSource::User(app.user.clone()), GENERATE_DATABASE_TOKEN)
        .unwrap();
    let spoofed = |peer: Option<[u8; 4]>| {
        let mut req = bearer("/api/v1/me", &token);
        req.headers_mut()
            .insert("x-forwarded-for", HeaderValue::from_static("10.1.2.3"));
        match peer {
            Some(peer) => from_peer(req, peer),
            None => req,
        }
    };

    assert_eq!(app.send(spoofed(None)).await.status(), StatusCode::FORBIDDEN);
    assert_eq!(app.send(spoofed(Some([203, 0, 113, 9]))).await.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn forwarded_for_is_honoured_behind_trusted_proxy() {
    let app = spawn_app_with(&[
        RESTRICTED[0],
        RESTRICTED[1],
        ("TRUSTED_PROXIES", "127.0.0.1"),
    ]);
    let token = app
        .state
        .jwt
        .generate_token(&TokenSource::User(app.user.clone()), GENERATE_DATABASE_TOKEN)
        .unwrap();
    let via_proxy = |chain: &'static str| {
        let mut req = bearer("/api/v1/me", &token);
        req.headers_mut()
            .insert("x-forwarded-for", HeaderValue::from_static(chain));
        from_peer(req, [127, 0, 0, 1])
    };

    assert_eq!(app.send(via_proxy("10.1.2.3")).await.status(), StatusCode::OK);
    // The client prepended an allowed address; the proxy appended the real one.
    assert_eq!(
        app.send(via_proxy("10.1.2.3, 203.0.113.9")).await.status(),
        StatusCode::FORBIDDEN
    );
}
