/*
 * Responsibility
 * - Router / middleware に紐づける共有コンテキスト (AppState)
 * - Clone 前提で持つ (内部は Arc/Clone cheap)
 */
use std::sync::Arc;

use crate::config::Config;
use crate::context::TrustedProxies;
use crate::registry::StrategyRegistry;
use crate::services::auth::{AuthenticationStrategy, PasswordLogin};
use crate::services::chain::ValidationChain;
use crate::services::jwt::JwtTokenService;
use crate::services::maintenance::MaintenanceFlag;
use crate::services::oauth2::OAuth2CallbackFlow;
use crate::services::routes::{PathPatterns, RouteMatcher};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub jwt: Arc<JwtTokenService>,
    /// Keyed `{type}AuthStrategy`.
    pub strategies: Arc<StrategyRegistry<dyn AuthenticationStrategy>>,
    pub routes: Arc<RouteMatcher>,
    /// Runs on every protected request before a strategy is chosen.
    pub route_access: Arc<ValidationChain>,
    pub trusted_proxies: Arc<TrustedProxies>,
    /// Probe paths served without a request context.
    pub context_skip: Arc<PathPatterns>,
    /// Paths that stay reachable in maintenance mode.
    pub maintenance_skip: Arc<PathPatterns>,
    pub maintenance: MaintenanceFlag,
    pub callback: Arc<OAuth2CallbackFlow>,
    pub password_login: Arc<PasswordLogin>,
}
