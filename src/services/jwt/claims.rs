use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::repos::UserRecord;

pub const CLAIM_HEADQUARTERS: &str = "headquarters";
pub const CLAIM_AUTH_METHOD: &str = "auth_method";
pub const CLAIM_PROVIDER: &str = "provider";
pub const CLAIM_TOKEN_USE: &str = "token_use";

/// `token_use` of tokens that authenticate requests.
pub const TOKEN_USE_ACCESS: &str = "access";
/// `token_use` of tokens that only carry OAuth2 state across the provider redirect.
pub const TOKEN_USE_STATE: &str = "state";

/// Claims carried by every token this service signs.
///
/// Deployment-specific fields (role flags, state-token credentials) live in `custom`
/// and are flattened into the payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub iss: String,
    #[serde(default)]
    pub iat: i64,
    pub exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,
    #[serde(flatten)]
    pub custom: Map<String, Value>,
}

impl Claims {
    pub fn custom(&self, name: &str) -> Option<&Value> {
        self.custom.get(name)
    }

    pub fn custom_str(&self, name: &str) -> Option<&str> {
        self.custom.get(name).and_then(Value::as_str)
    }

    pub fn token_use(&self) -> Option<&str> {
        self.custom_str(CLAIM_TOKEN_USE)
    }
}

/// OAuth2 client credentials carried across the provider redirect inside the state token.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct StateCredentials {
    pub provider: String,
    pub state: String,
    pub client_id: String,
    pub client_secret: String,
    pub audience: String,
}

impl std::fmt::Debug for StateCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Do not print the client secret
        f.debug_struct("StateCredentials")
            .field("provider", &self.provider)
            .field("state", &self.state)
            .field("client_id", &self.client_id)
            .field("audience", &self.audience)
            .finish()
    }
}

/// What a token generator can be asked to sign.
#[derive(Debug, Clone)]
pub enum TokenSource {
    /// Password login against the local user directory.
    User(UserRecord),
    /// OAuth2 login mapped onto a local user.
    OAuth2 { user: UserRecord, provider: String },
    /// Short-lived state token minted before redirecting to a provider.
    State(StateCredentials),
}

impl TokenSource {
    pub fn kind(&self) -> &'static str {
        match self {
            TokenSource::User(_) => "user",
            TokenSource::OAuth2 { .. } => "oauth2",
            TokenSource::State(_) => "state",
        }
    }
}

/// Issuer-side knobs handed to generators.
#[derive(Debug, Clone)]
pub struct IssuePolicy {
    pub issuer: String,
    pub ttl_seconds: i64,
    pub state_ttl_seconds: i64,
}

impl IssuePolicy {
    pub(crate) fn base_claims(
        &self,
        sub: String,
        email: Option<String>,
        ttl_seconds: i64,
        token_use: &str,
    ) -> Claims {
        let now = chrono::Utc::now().timestamp();
        let mut custom = Map::new();
        custom.insert(CLAIM_TOKEN_USE.into(), Value::String(token_use.into()));
        Claims {
            sub,
            email,
            iss: self.issuer.clone(),
            iat: now,
            exp: now + ttl_seconds,
            jti: Some(Uuid::new_v4().to_string()),
            custom,
        }
    }
}
