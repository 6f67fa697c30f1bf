pub mod auth;
pub mod cache;
pub mod chain;
pub mod factory;
pub mod jwt;
pub mod login_limiter;
pub mod maintenance;
pub mod oauth2;
pub mod routes;
