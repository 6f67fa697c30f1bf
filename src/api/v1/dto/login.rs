use serde::Deserialize;

/// Form body for `POST /auth/login`.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

/// Form body for `POST /auth/callback`.
///
/// `code` and `state` always travel in the query string; the form only
/// carries what the development login page adds.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallbackForm {
    #[serde(default)]
    pub email: Option<String>,
}
