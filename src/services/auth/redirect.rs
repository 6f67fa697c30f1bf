use axum::http::HeaderMap;

use crate::context::{RequestContext, params::query_param};
use crate::services::auth::cookies::{read_cookie, redirect_cookie};

/// Same-origin relative path only: `/x` yes, `//host`, `/\host` and `https://...` no.
pub fn is_safe_target(target: &str) -> bool {
    target.starts_with('/')
        && !target.starts_with("//")
        && !target.contains('\\')
        && !target.chars().any(char::is_control)
}

/// Before-auth step: keep `?{param}=/path` in a cookie so it survives the login round trip.
pub fn remember_redirect_target(ctx: &RequestContext, param: &str, cookie_name: &str) -> bool {
    let Some(target) = query_param(ctx.request().uri(), param) else {
        return false;
    };
    if !is_safe_target(&target) {
        tracing::debug!(target = %target, "ignoring off-site redirect target");
        return false;
    }
    ctx.response().add_cookie(redirect_cookie(cookie_name, target));
    true
}

/// Where to send the user after a successful login.
pub fn post_login_target(headers: &HeaderMap, cookie_name: &str, home: &str) -> String {
    read_cookie(headers, cookie_name)
        .filter(|t| is_safe_target(t))
        .unwrap_or_else(|| home.to_string())
}
