/*
 * Responsibility
 * - 環境変数や設定の読み込み (JWT / Cookie / ルート分類 / OAuth2 provider / limiter など)
 * - 設定値のバリデーション (不足なら起動失敗)
 * - from_lookup により、テストでは HashMap から同じ経路で組み立てられる
 */
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;
use std::{env, fmt};

use thiserror::Error;

use crate::context::TrustedProxies;
use crate::error::AppError;
use crate::services::auth::cookies::CookieNames;
use crate::services::oauth2::ProviderRegistration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Production,
}

impl AppEnv {
    pub fn parse(value: Option<&str>) -> Self {
        match value
            .unwrap_or("development")
            .to_ascii_lowercase()
            .as_str()
        {
            "production" | "prod" => Self::Production,
            _ => Self::Development,
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    /// Key of the OAuth2 login strategy used after the callback.
    pub fn login_strategy_key(&self) -> &'static str {
        match self {
            Self::Production => "prod",
            Self::Development => "test",
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing configuration: {0}")]
    Missing(String),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl From<ConfigError> for AppError {
    fn from(e: ConfigError) -> Self {
        tracing::error!(error = %e, "configuration rejected");
        AppError::Internal
    }
}

#[derive(Clone)]
pub struct Config {
    pub addr: SocketAddr,
    pub app_env: AppEnv,

    pub jwt_secret: String,
    pub jwt_issuer: String,
    pub jwt_ttl_seconds: i64,
    pub state_token_ttl_seconds: i64,
    pub jwt_leeway_seconds: u64,

    pub cookies: CookieNames,
    pub redirect_param: String,

    pub auth_include_paths: Vec<String>,
    pub auth_exclude_paths: Vec<String>,
    pub context_skip_paths: Vec<String>,
    pub ip_restrictions: String,
    pub trusted_proxies: TrustedProxies,
    pub default_auth_type: String,
    pub login_url: String,
    pub home_url: String,

    pub providers: Vec<ProviderRegistration>,
    pub oauth2_http_timeout: Duration,

    pub login_max_attempts: u64,
    pub login_lockout: Duration,
    pub redis_url: Option<String>,
    pub database_url: Option<String>,

    pub maintenance_probe_url: Option<String>,
    pub maintenance_probe_interval: Duration,
    pub maintenance_path: String,

    /// Logged loudly at startup.
    pub warnings: Vec<String>,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Secrets stay out of logs
        f.debug_struct("Config")
            .field("addr", &self.addr)
            .field("app_env", &self.app_env)
            .field("jwt_issuer", &self.jwt_issuer)
            .field("auth_include_paths", &self.auth_include_paths)
            .field("auth_exclude_paths", &self.auth_exclude_paths)
            .field("trusted_proxies", &self.trusted_proxies)
            .field("providers", &self.providers)
            .field("redis", &self.redis_url.is_some())
            .field("database", &self.database_url.is_some())
            .field("maintenance_probe_url", &self.maintenance_probe_url)
            .finish_non_exhaustive()
    }
}

struct Vars<F> {
    lookup: F,
}

impl<F: Fn(&str) -> Option<String>> Vars<F> {
    fn optional(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn required(&self, key: &str) -> Result<String, ConfigError> {
        self.optional(key).ok_or_else(|| ConfigError::Missing(key.to_string()))
    }

    fn or(&self, key: &str, default: &str) -> String {
        self.optional(key).unwrap_or_else(|| default.to_string())
    }

    fn parsed<T: FromStr>(&self, key: &str, default: T) -> Result<T, ConfigError> {
        match self.optional(key) {
            Some(v) => v.parse().map_err(|_| ConfigError::Invalid(key.to_string())),
            None => Ok(default),
        }
    }

    fn list(&self, key: &str, default: &str) -> Vec<String> {
        self.or(key, default)
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars { lookup };

        let port: u16 = vars.parsed("PORT", 3000)?;
        let addr: SocketAddr = SocketAddr::from_str(&format!("0.0.0.0:{}", port))
            .map_err(|_| ConfigError::Invalid("PORT".to_string()))?;

        let app_env_var = vars.optional("APP_ENV");
        let app_env = AppEnv::parse(app_env_var.as_deref());
        let mut warnings = Vec::new();
        if app_env_var.is_none() {
            warnings.push("APP_ENV is not set, defaulting to development".to_string());
        }
        if !app_env.is_production() {
            warnings.push(
                "development mode: the OAuth2 callback uses the test login strategy, which trusts a \
                 form-posted email without contacting the provider. Set APP_ENV=production for real deployments"
                    .to_string(),
            );
        }

        let jwt_secret = vars.required("JWT_SECRET")?;
        let jwt_issuer = vars.required("JWT_ISSUER")?;
        let jwt_ttl_seconds: i64 = vars.parsed("JWT_TTL_SECONDS", 3600)?;
        let state_token_ttl_seconds: i64 = vars.parsed("STATE_TOKEN_TTL_SECONDS", 300)?;
        if jwt_ttl_seconds <= 0 {
            return Err(ConfigError::Invalid("JWT_TTL_SECONDS".to_string()));
        }
        if state_token_ttl_seconds <= 0 {
            return Err(ConfigError::Invalid("STATE_TOKEN_TTL_SECONDS".to_string()));
        }

        let cookies = CookieNames {
            auth: vars.or("AUTH_COOKIE_NAME", "access_token"),
            state: vars.or("STATE_COOKIE_NAME", "oauth_state"),
            redirect: vars.or("REDIRECT_COOKIE_NAME", "redirect_to"),
        };

        let login_max_attempts: u64 = vars.parsed("LOGIN_MAX_ATTEMPTS", 5)?;
        if login_max_attempts == 0 {
            return Err(ConfigError::Invalid("LOGIN_MAX_ATTEMPTS".to_string()));
        }

        let maintenance_path = vars.or("MAINTENANCE_PATH", "/maintenance");
        if !maintenance_path.starts_with('/') {
            return Err(ConfigError::Invalid("MAINTENANCE_PATH".to_string()));
        }

        let trusted_proxies = TrustedProxies::parse(&vars.list("TRUSTED_PROXIES", ""))
            .map_err(|_| ConfigError::Invalid("TRUSTED_PROXIES".to_string()))?;

        Ok(Config {
            addr,
            app_env,
            jwt_secret,
            jwt_issuer,
            jwt_ttl_seconds,
            state_token_ttl_seconds,
            jwt_leeway_seconds: vars.parsed("JWT_LEEWAY_SECONDS", 0)?,
            cookies,
            redirect_param: vars.or("REDIRECT_PARAM", "redirect_to"),
            auth_include_paths: vars.list("AUTH_INCLUDE_PATHS", "/**"),
            auth_exclude_paths: vars.list(
                "AUTH_EXCLUDE_PATHS",
                "/health,/static/**,/auth/**,/maintenance",
            ),
            context_skip_paths: vars.list("CONTEXT_SKIP_PATHS", "/health,/favicon.ico"),
            ip_restrictions: vars.or("IP_RESTRICTIONS", ""),
            trusted_proxies,
            default_auth_type: vars.or("DEFAULT_AUTH_TYPE", "jwt"),
            login_url: vars.or("LOGIN_URL", "/login"),
            home_url: vars.or("HOME_URL", "/"),
            providers: load_providers(&vars)?,
            oauth2_http_timeout: Duration::from_secs(vars.parsed("OAUTH2_HTTP_TIMEOUT_SECONDS", 30)?),
            login_max_attempts,
            login_lockout: Duration::from_secs(vars.parsed("LOGIN_LOCKOUT_SECONDS", 300)?),
            redis_url: vars.optional("REDIS_URL"),
            database_url: vars.optional("DATABASE_URL"),
            maintenance_probe_url: vars.optional("MAINTENANCE_PROBE_URL"),
            maintenance_probe_interval: Duration::from_secs(
                vars.parsed("MAINTENANCE_PROBE_INTERVAL_SECONDS", 30)?,
            ),
            maintenance_path,
            warnings,
        })
    }
}

fn load_providers<F: Fn(&str) -> Option<String>>(
    vars: &Vars<F>,
) -> Result<Vec<ProviderRegistration>, ConfigError> {
    let ids = vars.list("OAUTH2_PROVIDERS", "");
    let mut providers = Vec::with_capacity(ids.len());

    for id in ids {
        let prefix = format!("OAUTH2_{}", id.to_ascii_uppercase().replace('-', "_"));
        let key = |name: &str| format!("{prefix}_{name}");

        let issuer = vars.required(&key("ISSUER"))?;
        if url::Url::parse(&issuer).is_err() {
            return Err(ConfigError::Invalid(key("ISSUER")));
        }

        providers.push(ProviderRegistration {
            issuer,
            client_id: vars.required(&key("CLIENT_ID"))?,
            client_secret: vars.required(&key("CLIENT_SECRET"))?,
            audience: vars.required(&key("AUDIENCE"))?,
            redirect_uri: vars.required(&key("REDIRECT_URI"))?,
            scopes: vars
                .or(&key("SCOPES"), "openid profile email")
                .split_whitespace()
                .map(str::to_string)
                .collect(),
            path_pattern: vars.optional(&key("PATH_PATTERN")),
            id,
        });
    }
    Ok(providers)
}
