/*
 * Responsibility
 * - URL 構造を定義
 * - /api/v1/ 配下は認証ゲートウェイの保護対象、/auth/ 配下とメンテナンスページは除外リスト側
 */
use axum::{
    Router,
    routing::{get, post},
};

use crate::api::v1::handlers::{
    auth::{callback, callback_form, login, logout},
    maintenance::maintenance_page,
    me::me,
};
use crate::config::Config;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/me", get(me))
}

pub fn auth_routes(config: &Config) -> Router<AppState> {
    Router::new()
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/auth/callback", get(callback).post(callback_form))
        .route(&config.maintenance_path, get(maintenance_page))
}
