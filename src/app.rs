/*
 * Responsibility
 * - Config読み込み → 依存生成 → Router 組み立て
 * - 認証パイプライン (context / maintenance / gateway) と HTTP 層の適用
 * - メンテナンス用ヘルスチェッカーの起動
 * - axum::serve() で起動
 */
use std::{net::SocketAddr, panic, process, sync::Arc, time::Duration};

use axum::{Router, routing::get};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::api;
use crate::config::Config;
use crate::error::AppError;
use crate::middleware::{self, http::HttpLimits};
use crate::services::factory::{build_state, connect_collaborators};
use crate::services::maintenance::{HttpHealthProbe, spawn_health_checker};
use crate::state::AppState;

/// Outer request timeout; the token exchange has its own, shorter one.
const REQUEST_TIMEOUT_MARGIN: Duration = Duration::from_secs(15);

fn init_tracing() {
    // RUST_LOG=info,authgate=debug,tower_http=debug cargo run
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,tower_http=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn init_panic_hook(abort_on_panic: bool) {
    let default_hook = panic::take_hook();

    panic::set_hook(Box::new(move |info| {
        tracing::error!(?info, "panic");

        // Development: crash so it gets noticed. Production: keep serving,
        // CatchPanicLayer turns the request into a 500.
        if abort_on_panic {
            process::abort();
        } else {
            default_hook(info);
        }
    }))
}

pub async fn run() -> Result<(), AppError> {
    init_tracing();
    let config = Config::from_env()?;

    init_panic_hook(!config.app_env.is_production());

    tracing::info!(config = ?config, "starting authgate in {:?} mode on {}", config.app_env, config.addr);
    for warning in &config.warnings {
        tracing::warn!("{warning}");
    }

    let collaborators = connect_collaborators(&config).await?;
    let state = build_state(config, collaborators)?;
    start_health_checker(&state)?;

    let addr = state.config.addr;
    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
        tracing::error!(error = %e, %addr, "failed to bind listener");
        AppError::Internal
    })?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "server error");
            AppError::Internal
        })?;

    Ok(())
}

fn start_health_checker(state: &AppState) -> Result<(), AppError> {
    let Some(url) = state.config.maintenance_probe_url.as_deref() else {
        tracing::info!("MAINTENANCE_PROBE_URL not set, maintenance mode is manual only");
        return Ok(());
    };

    let interval = state.config.maintenance_probe_interval;
    let probe = HttpHealthProbe::new(url, interval).map_err(|e| {
        tracing::error!(error = %e, "failed to build health probe client");
        AppError::Internal
    })?;
    // Runs for the life of the process.
    drop(spawn_health_checker(Arc::new(probe), state.maintenance.clone(), interval));
    tracing::info!(url, ?interval, "maintenance health checker started");
    Ok(())
}

/// Full application router: routes, authentication pipeline, then HTTP layers.
pub fn build_router(state: AppState) -> Router {
    let timeout = state.config.oauth2_http_timeout + REQUEST_TIMEOUT_MARGIN;

    let router = Router::new()
        .route("/health", get(api::v1::handlers::health::health))
        .nest("/api/v1", api::v1::routes())
        .merge(api::v1::auth_routes(&state.config));

    let router = middleware::apply(router, state.clone()).with_state(state);
    middleware::http::apply(router, HttpLimits::new(timeout))
}
