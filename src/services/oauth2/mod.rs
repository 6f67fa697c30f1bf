//! OAuth2 authorization-code login: provider registrations, the authorize
//! redirect, the token endpoint client and the callback flow.
pub mod authorize;
pub mod client;
pub mod flow;
pub mod login_strategy;
pub mod provider;

pub use authorize::{AuthorizationStart, begin_authorization};
pub use client::{ExchangeRequest, ReqwestTokenClient, TokenExchangeClient, TokenResponse};
pub use flow::{CallbackContext, OAuth2CallbackFlow};
pub use login_strategy::{LoginStrategy, PROD_LOGIN, ProdLoginStrategy, TEST_LOGIN, TestLoginStrategy};
pub use provider::{ProviderRegistration, ProviderRegistry};
