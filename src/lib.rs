//! Multi-tenant authentication gateway for axum services.
//!
//! Requests pass through a per-request context binding, a maintenance gate
//! and an authentication gateway that dispatches to a pluggable strategy
//! chosen by the `Authorization-Type` header.
pub mod api;
pub mod app;
pub mod config;
pub mod context;
pub mod error;
pub mod middleware;
pub mod registry;
pub mod repos;
pub mod services;
pub mod state;
