use axum::http::HeaderMap;
use axum_extra::extract::{
    CookieJar,
    cookie::{Cookie, SameSite},
};

/// Cookie names used by the login flows.
#[derive(Debug, Clone)]
pub struct CookieNames {
    pub auth: String,
    pub state: String,
    pub redirect: String,
}

impl Default for CookieNames {
    fn default() -> Self {
        Self {
            auth: "access_token".to_string(),
            state: "oauth_state".to_string(),
            redirect: "redirect_to".to_string(),
        }
    }
}

/// Value of cookie `name`, ignoring empty values.
pub fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    CookieJar::from_headers(headers)
        .get(name)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
}

/// Application token cookie. Cross-site apps share it, hence SameSite=None.
pub fn auth_cookie(name: &str, token: String) -> Cookie<'static> {
    Cookie::build((name.to_string(), token))
        .path("/")
        .http_only(true)
        .secure(true)
        .same_site(SameSite::None)
        .build()
}

/// Short-lived cookie scoped to the callback round trip.
pub fn state_cookie(name: &str, token: String) -> Cookie<'static> {
    Cookie::build((name.to_string(), token))
        .path("/")
        .http_only(true)
        .secure(true)
        .same_site(SameSite::Lax)
        .build()
}

pub fn redirect_cookie(name: &str, target: String) -> Cookie<'static> {
    Cookie::build((name.to_string(), target))
        .path("/")
        .http_only(true)
        .secure(true)
        .same_site(SameSite::Lax)
        .build()
}

/// Expired cookie with the same name and path, which makes the browser drop it.
pub fn removal(name: &str) -> Cookie<'static> {
    let mut cookie = Cookie::build((name.to_string(), String::new()))
        .path("/")
        .build();
    cookie.make_removal();
    cookie
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderValue, header};

    #[test]
    fn reads_named_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("a=1; access_token=abc.def.ghi; empty="),
        );
        assert_eq!(read_cookie(&headers, "access_token").as_deref(), Some("abc.def.ghi"));
        assert_eq!(read_cookie(&headers, "empty"), None);
        assert_eq!(read_cookie(&headers, "missing"), None);
    }

    #[test]
    fn auth_cookie_attributes() {
        let text = auth_cookie("access_token", "t".into()).to_string();
        assert!(text.starts_with("access_token=t"));
        assert!(text.contains("SameSite=None"));
        assert!(text.contains("Secure"));
        assert!(text.contains("HttpOnly"));
        assert!(text.contains("Path=/"));
    }

    #[test]
    fn removal_expires_cookie() {
        let text = removal("oauth_state").to_string();
        assert!(text.starts_with("oauth_state="));
        assert!(text.contains("Max-Age=0"));
    }
}
