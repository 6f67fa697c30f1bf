/*
 * Responsibility
 * - 認証ゲートウェイ: 保護対象ルートかを判定し、Authorization-Type ヘッダで戦略を選んで呼ぶ
 * - 戦略を選ぶ前に route_access チェーン (IP 許可リスト) をすべての戦略に共通で通す
 * - 戦略の結果 (Principal / StopMatch / Redirect / エラー) を HTTP に変換する
 * - 自分では認証しない。dispatch と変換だけ
 */
use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::{debug, error, warn};

use crate::context::{self, RequestContext};
use crate::error::{AppError, OAuth2ErrorKind};
use crate::services::auth::{
    redirect::remember_redirect_target,
    strategy::{AUTH_TYPE_HEADER, strategy_key},
};
use crate::services::chain::ValidationContext;
use crate::state::AppState;

pub async fn authentication_gateway(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    // Paths that opted out of context binding still get a context here,
    // it just lives only as long as this call.
    let (ctx, owned) = match context::current() {
        Ok(ctx) => (ctx, false),
        Err(_) => (Arc::new(RequestContext::from_request(&req, &state.trusted_proxies)), true),
    };

    let mut res = match dispatch(&state, &ctx, &mut req).await {
        Dispatch::Continue => next.run(req).await,
        Dispatch::Respond(res) => res,
    };
    if owned {
        ctx.response().apply(&mut res);
    }
    res
}

enum Dispatch {
    Continue,
    Respond(Response),
}

async fn dispatch(state: &AppState, ctx: &RequestContext, req: &mut Request) -> Dispatch {
    remember_redirect_target(ctx, &state.config.redirect_param, &state.config.cookies.redirect);

    let path = ctx.request().path();
    if !state.routes.is_protected(path) {
        return Dispatch::Continue;
    }

    let mut access = ValidationContext::from_request(ctx.request());
    if !state.route_access.execute(&mut access) {
        let err = access.take_failure().unwrap_or(AppError::Internal);
        log_failure(&err, path, state.route_access.name());
        return Dispatch::Respond(err.into_response());
    }

    let auth_type = ctx
        .request()
        .header_str(AUTH_TYPE_HEADER)
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .unwrap_or(state.config.default_auth_type.as_str());
    let key = strategy_key(auth_type);

    let Some(strategy) = state.strategies.get(&key) else {
        error!(path, strategy = %key, "no authentication strategy registered");
        return Dispatch::Respond(
            AppError::unauthorized("UNKNOWN_AUTH_TYPE", format!("unsupported authorization type '{auth_type}'"))
                .into_response(),
        );
    };

    match strategy.authenticate(ctx).await {
        Ok(principal) => {
            debug!(path, strategy = %key, subject = %principal.subject, "authenticated");
            req.extensions_mut().insert(principal);
            Dispatch::Continue
        }
        Err(AppError::StopMatch) => {
            debug!(path, strategy = %key, "strategy did not match, continuing unauthenticated");
            Dispatch::Continue
        }
        Err(err) => {
            log_failure(&err, path, &key);
            Dispatch::Respond(err.into_response())
        }
    }
}

pub(crate) fn log_failure(err: &AppError, path: &str, strategy: &str) {
    match err {
        AppError::StopMatch => {}
        AppError::Redirect { location, .. } => {
            debug!(path, strategy, location = %location, "authentication continues via redirect");
        }
        AppError::Unauthorized { code, .. } => warn!(path, strategy, code, "authentication failed"),
        AppError::Forbidden { message } => warn!(path, strategy, message = %message, "access forbidden"),
        AppError::OAuth2(e) => match e.kind {
            OAuth2ErrorKind::Configuration => {
                error!(path, strategy, code = e.code, error = ?e, "oauth2 configuration error")
            }
            OAuth2ErrorKind::Authorization => warn!(path, strategy, code = e.code, "oauth2 authorization denied"),
            OAuth2ErrorKind::TokenExchange | OAuth2ErrorKind::User => {
                warn!(path, strategy, code = e.code, error = ?e, "oauth2 login failed")
            }
        },
        AppError::Internal => error!(path, strategy, "authentication strategy failed"),
    }
}
