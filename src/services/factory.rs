/// Factory: build the authentication pipeline from application `Config`.
use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};

use crate::config::{Config, ConfigError};
use crate::error::AppError;
use crate::registry::StrategyRegistry;
use crate::repos::{InMemoryUserDirectory, PgUserDirectory, UserDirectory};
use crate::services::auth::{
    AuthenticationStrategy, BcryptVerifier, DatabaseAuthStrategy, JwtAuthStrategy,
    MaintenanceAuthStrategy, OAuth2AuthStrategy, PasswordLogin, PasswordVerifier, strategy_key,
};
use crate::services::cache::{MemoryCache, ValkeyClient};
use crate::services::chain::{
    callback_chain, handlers::IpRestrictions, production_jwt_chain, route_access_chain,
    test_jwt_chain,
};
use crate::services::jwt::{IssuePolicy, JwtKeys, JwtTokenService};
use crate::services::login_limiter::{CacheLoginAttemptLimiter, LockoutPolicy, LoginAttemptLimiter};
use crate::services::maintenance::MaintenanceFlag;
use crate::services::oauth2::{
    LoginStrategy, OAuth2CallbackFlow, PROD_LOGIN, ProdLoginStrategy, ProviderRegistry,
    ReqwestTokenClient, TEST_LOGIN, TestLoginStrategy, TokenExchangeClient,
};
use crate::services::routes::{PathPatterns, RouteMatcher};
use crate::state::AppState;

/// External collaborators the pipeline consumes but does not implement.
pub struct Collaborators {
    pub users: Arc<dyn UserDirectory>,
    pub verifier: Arc<dyn PasswordVerifier>,
    pub limiter: Arc<dyn LoginAttemptLimiter>,
    pub token_client: Arc<dyn TokenExchangeClient>,
    pub maintenance: MaintenanceFlag,
}

const MEMORY_CACHE_CAPACITY: u64 = 100_000;

/// Connect to whatever backends the configuration names, falling back to in-process ones.
pub async fn connect_collaborators(config: &Config) -> Result<Collaborators, AppError> {
    let users: Arc<dyn UserDirectory> = match config.database_url.as_deref() {
        Some(url) => {
            let pool = PgPoolOptions::new()
                .max_connections(10)
                .connect(url)
                .await
                .map_err(|e| {
                    tracing::error!(error = %e, "failed to connect to user database");
                    AppError::Internal
                })?;
            info!("user directory: postgres");
            Arc::new(PgUserDirectory::new(pool))
        }
        None => {
            warn!("DATABASE_URL not set, using an empty in-memory user directory");
            Arc::new(InMemoryUserDirectory::new())
        }
    };

    let policy = LockoutPolicy {
        max_attempts: config.login_max_attempts,
        window: config.login_lockout,
    };
    let limiter: Arc<dyn LoginAttemptLimiter> = match config.redis_url.as_deref() {
        Some(url) => {
            let client = ValkeyClient::new(url).await.map_err(|e| {
                tracing::error!(error = %e, "failed to connect to valkey");
                AppError::Internal
            })?;
            info!("login limiter: valkey");
            Arc::new(CacheLoginAttemptLimiter::new(Arc::new(client), policy))
        }
        None => {
            info!("login limiter: in-process cache");
            Arc::new(CacheLoginAttemptLimiter::new(
                Arc::new(MemoryCache::new(MEMORY_CACHE_CAPACITY)),
                policy,
            ))
        }
    };

    Ok(Collaborators {
        users,
        verifier: Arc::new(BcryptVerifier),
        limiter,
        token_client: Arc::new(ReqwestTokenClient::new(config.oauth2_http_timeout)?),
        maintenance: MaintenanceFlag::new(),
    })
}

fn patterns(values: &[String], key: &str) -> Result<PathPatterns, ConfigError> {
    PathPatterns::new(values).map_err(|_| ConfigError::Invalid(key.to_string()))
}

pub fn build_state(config: Config, collaborators: Collaborators) -> Result<AppState, AppError> {
    let Collaborators {
        users,
        verifier,
        limiter,
        token_client,
        maintenance,
    } = collaborators;

    let keys = JwtKeys::from_base64_secret(&config.jwt_secret, config.jwt_leeway_seconds)?;
    let jwt = Arc::new(JwtTokenService::with_defaults(
        keys,
        IssuePolicy {
            issuer: config.jwt_issuer.clone(),
            ttl_seconds: config.jwt_ttl_seconds,
            state_ttl_seconds: config.state_token_ttl_seconds,
        },
        i64::try_from(config.jwt_leeway_seconds)
            .map_err(|_| ConfigError::Invalid("JWT_LEEWAY_SECONDS".to_string()))?,
    ));

    let providers = Arc::new(ProviderRegistry::new(config.providers.clone())?);
    let restrictions = Arc::new(
        IpRestrictions::parse(&config.ip_restrictions)
            .map_err(|_| ConfigError::Invalid("IP_RESTRICTIONS".to_string()))?,
    );

    if !restrictions.is_empty() && config.trusted_proxies.is_empty() {
        info!("IP_RESTRICTIONS set without TRUSTED_PROXIES, matching on the socket peer address");
    }
    let route_access = route_access_chain(restrictions);

    let jwt_chain = if config.app_env.is_production() {
        production_jwt_chain(jwt.clone(), &config.cookies.auth)
    } else {
        test_jwt_chain(jwt.clone(), &config.cookies.auth)
    };

    let password_login = Arc::new(PasswordLogin::new(
        users.clone(),
        verifier,
        limiter,
        jwt.clone(),
    ));

    let strategies: Arc<StrategyRegistry<dyn AuthenticationStrategy>> =
        Arc::new(StrategyRegistry::new("auth-strategies"));
    strategies
        .register(
            strategy_key("jwt"),
            Arc::new(JwtAuthStrategy::new(jwt_chain, jwt.clone(), config.login_url.clone())),
        )
        .register(
            strategy_key("database"),
            Arc::new(DatabaseAuthStrategy::new(password_login.clone())),
        )
        .register(
            strategy_key("oauth2"),
            Arc::new(OAuth2AuthStrategy::new(
                jwt.clone(),
                providers.clone(),
                config.cookies.clone(),
            )),
        )
        .register(
            strategy_key("maintenance"),
            Arc::new(MaintenanceAuthStrategy::new(
                maintenance.clone(),
                config.maintenance_path.clone(),
            )),
        );

    let login_strategies: Arc<StrategyRegistry<dyn LoginStrategy>> =
        Arc::new(StrategyRegistry::new("login-strategies"));
    login_strategies
        .register(
            PROD_LOGIN,
            Arc::new(ProdLoginStrategy::new(token_client, users.clone(), jwt.clone())),
        )
        .register(TEST_LOGIN, Arc::new(TestLoginStrategy::new(users, jwt.clone())));

    let callback = Arc::new(OAuth2CallbackFlow::new(
        callback_chain(jwt.clone(), providers.clone(), &config.cookies.state),
        providers,
        login_strategies,
        config.app_env.login_strategy_key(),
    ));

    let routes = RouteMatcher::new(
        patterns(&config.auth_include_paths, "AUTH_INCLUDE_PATHS")?,
        patterns(&config.auth_exclude_paths, "AUTH_EXCLUDE_PATHS")?,
    );
    let context_skip = patterns(&config.context_skip_paths, "CONTEXT_SKIP_PATHS")?;

    let mut reachable = config.context_skip_paths.clone();
    reachable.push(config.maintenance_path.clone());
    reachable.push("/static/**".to_string());
    let maintenance_skip = patterns(&reachable, "MAINTENANCE_PATH")?;

    let trusted_proxies = Arc::new(config.trusted_proxies.clone());

    Ok(AppState {
        config: Arc::new(config),
        jwt,
        strategies,
        routes: Arc::new(routes),
        route_access: Arc::new(route_access),
        trusted_proxies,
        context_skip: Arc::new(context_skip),
        maintenance_skip: Arc::new(maintenance_skip),
        maintenance,
        callback,
        password_login,
    })
}
