//! JWT issuance and validation (HS256).
pub mod claims;
pub mod keys;
pub mod service;
pub mod strategies;

pub use claims::{Claims, IssuePolicy, StateCredentials, TokenSource};
pub use keys::{JwtKeys, TokenError};
pub use service::JwtTokenService;
