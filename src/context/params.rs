//! Query parameter helpers.
//!
//! A parameter that is present but empty (`?next=`) is treated exactly like a
//! missing one by every helper here.

use axum::http::Uri;

pub fn query_param(uri: &Uri, name: &str) -> Option<String> {
    let query = uri.query()?;
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.into_owned())
        .filter(|v| !v.is_empty())
}

pub fn has_param(uri: &Uri, name: &str) -> bool {
    query_param(uri, name).is_some()
}

/// True when the parameter is present and equal to `expected`.
pub fn is_param(uri: &Uri, name: &str, expected: &str) -> bool {
    query_param(uri, name).is_some_and(|v| v == expected)
}
