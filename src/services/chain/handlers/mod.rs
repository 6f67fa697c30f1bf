mod ip;
mod oauth;
mod token;

pub use ip::{IpAllowListHandler, IpRange, IpRestrictionError, IpRestrictions};
pub use oauth::{AuthorizationCodeHandler, ProviderKnownHandler, StateCookieHandler, StateMatchHandler};
pub use token::{
    ExpiryHandler, IssuerHandler, SignatureHandler, TokenExtractionHandler, TokenUseHandler,
};
