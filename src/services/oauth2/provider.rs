use crate::error::OAuth2Error;
use crate::services::routes::PathPatterns;

/// Static client registration for one identity provider.
#[derive(Clone)]
pub struct ProviderRegistration {
    pub id: String,
    pub issuer: String,
    pub client_id: String,
    pub client_secret: String,
    pub audience: String,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
    /// Paths that start this provider's login. `None` means "only by explicit id".
    pub path_pattern: Option<String>,
}

impl std::fmt::Debug for ProviderRegistration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistration")
            .field("id", &self.id)
            .field("issuer", &self.issuer)
            .field("client_id", &self.client_id)
            .field("audience", &self.audience)
            .field("redirect_uri", &self.redirect_uri)
            .field("scopes", &self.scopes)
            .field("path_pattern", &self.path_pattern)
            .finish()
    }
}

impl ProviderRegistration {
    fn base(&self) -> &str {
        self.issuer.trim_end_matches('/')
    }

    pub fn token_endpoint(&self) -> String {
        format!("{}/oauth/token", self.base())
    }

    pub fn authorize_endpoint(&self) -> String {
        format!("{}/authorize", self.base())
    }

    pub fn scope(&self) -> String {
        self.scopes.join(" ")
    }
}

/// Providers loaded at startup. Immutable afterwards.
#[derive(Debug, Default)]
pub struct ProviderRegistry {
    providers: Vec<(ProviderRegistration, PathPatterns)>,
}

impl ProviderRegistry {
    pub fn new(registrations: Vec<ProviderRegistration>) -> Result<Self, OAuth2Error> {
        let mut providers = Vec::with_capacity(registrations.len());
        for reg in registrations {
            let patterns = match reg.path_pattern.as_deref() {
                Some(p) => PathPatterns::new([p]).map_err(|e| {
                    OAuth2Error::configuration(
                        "INVALID_PROVIDER_PATTERN",
                        format!("provider '{}' has an invalid path pattern '{p}'", reg.id),
                    )
                    .with_source(e)
                })?,
                None => PathPatterns::empty(),
            };
            providers.push((reg, patterns));
        }
        Ok(Self { providers })
    }

    pub fn get(&self, id: &str) -> Option<&ProviderRegistration> {
        self.providers
            .iter()
            .map(|(reg, _)| reg)
            .find(|reg| reg.id == id)
    }

    /// Provider `id`, or an `UNKNOWN_PROVIDER` configuration error.
    pub fn require(&self, id: &str) -> Result<&ProviderRegistration, OAuth2Error> {
        self.get(id).ok_or_else(|| {
            OAuth2Error::configuration("UNKNOWN_PROVIDER", format!("no OAuth2 provider registered as '{id}'"))
        })
    }

    /// First provider whose path pattern matches `path`.
    pub fn select_for_path(&self, path: &str) -> Result<&ProviderRegistration, OAuth2Error> {
        self.providers
            .iter()
            .find(|(_, patterns)| patterns.is_match(path))
            .map(|(reg, _)| reg)
            .ok_or_else(|| {
                OAuth2Error::configuration(
                    "UNKNOWN_PROVIDER",
                    format!("no OAuth2 provider configured for path '{path}'"),
                )
            })
    }

    pub fn ids(&self) -> Vec<&str> {
        self.providers.iter().map(|(reg, _)| reg.id.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

#[cfg(test)]
pub(crate) fn test_provider(id: &str, issuer: &str, pattern: Option<&str>) -> ProviderRegistration {
    ProviderRegistration {
        id: id.to_string(),
        issuer: issuer.to_string(),
        client_id: format!("{id}-client"),
        client_secret: format!("{id}-secret"),
        audience: "https://api.example.com".to_string(),
        redirect_uri: "https://app.example.com/auth/callback".to_string(),
        scopes: vec!["openid".into(), "profile".into(), "email".into()],
        path_pattern: pattern.map(str::to_string),
    }
}
