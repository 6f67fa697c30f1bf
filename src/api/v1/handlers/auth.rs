/*
 * Responsibility
 * - POST /auth/login: email/password ログイン (ロックアウト付き) → 認証 cookie
 * - POST /auth/logout: 認証 cookie を消す
 * - GET|POST /auth/callback: OAuth2 コールバック → 認証 cookie、state cookie は破棄
 * - 成功後は保存済みのリダイレクト先 (なければ HOME_URL) へ 303
 */
use axum::{
    Form,
    extract::State,
    http::{HeaderMap, Method, Uri},
    response::Redirect,
};
use axum_extra::extract::CookieJar;
use tracing::info;

use crate::api::v1::dto::login::{CallbackForm, LoginForm};
use crate::context::RequestInfo;
use crate::error::AppError;
use crate::middleware::gateway::log_failure;
use crate::services::auth::{
    cookies::{auth_cookie, removal},
    redirect::post_login_target,
};
use crate::state::AppState;

pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> Result<(CookieJar, Redirect), AppError> {
    let success = state
        .password_login
        .login(&form.email, &form.password)
        .await
        .inspect_err(|e| log_failure(e, "/auth/login", "password-login"))?;

    let cookies = &state.config.cookies;
    let target = post_login_target(&headers, &cookies.redirect, &state.config.home_url);
    let jar = jar
        .add(auth_cookie(&cookies.auth, success.token))
        .add(removal(&cookies.redirect));

    Ok((jar, Redirect::to(&target)))
}

pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> (CookieJar, Redirect) {
    let jar = jar.add(removal(&state.config.cookies.auth));
    (jar, Redirect::to(&state.config.login_url))
}

/// Provider redirect (`GET /auth/callback?code=..&state=..`).
pub async fn callback(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    jar: CookieJar,
) -> Result<(CookieJar, Redirect), AppError> {
    complete_callback(&state, RequestInfo::new(method, uri, headers, None), None, jar).await
}

/// Development login page post: same query, plus the email to log in as.
pub async fn callback_form(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    jar: CookieJar,
    Form(form): Form<CallbackForm>,
) -> Result<(CookieJar, Redirect), AppError> {
    complete_callback(&state, RequestInfo::new(method, uri, headers, None), form.email, jar).await
}

async fn complete_callback(
    state: &AppState,
    request: RequestInfo,
    email: Option<String>,
    jar: CookieJar,
) -> Result<(CookieJar, Redirect), AppError> {
    let done = state
        .callback
        .handle(&request, email)
        .await
        .inspect_err(|e| log_failure(e, request.path(), "oauth2-callback"))?;
    let token = done.issued_token.ok_or(AppError::Internal)?;

    info!(provider = %done.provider.id, strategy = %done.strategy_key, "oauth2 login completed");

    let cookies = &state.config.cookies;
    let target = post_login_target(request.headers(), &cookies.redirect, &state.config.home_url);
    let jar = jar
        .add(auth_cookie(&cookies.auth, token))
        .add(removal(&cookies.state))
        .add(removal(&cookies.redirect));

    Ok((jar, Redirect::to(&target)))
}
