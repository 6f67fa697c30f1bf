pub mod auth;
pub mod health;
pub mod maintenance;
pub mod me;
