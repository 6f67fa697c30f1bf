pub mod cookies;
pub mod password;
pub mod redirect;
pub mod strategies;
pub mod strategy;

pub use password::{BcryptVerifier, LoginSuccess, PasswordLogin, PasswordVerifier};
pub use strategies::{DatabaseAuthStrategy, JwtAuthStrategy, MaintenanceAuthStrategy, OAuth2AuthStrategy};
pub use strategy::{AuthMethod, AuthenticationStrategy, Principal, strategy_key};
