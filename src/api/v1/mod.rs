/*
 * Responsibility
 * - v1 の公開ポイント (routes の re-export など)
 * - /auth/ 配下は版を持たないので auth_routes として別に出す
 */
pub mod dto;
pub mod extractors;
pub mod handlers;
mod routes;

pub use routes::{auth_routes, routes};
