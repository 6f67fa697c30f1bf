use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info, warn};

use crate::error::AppError;
use crate::repos::{UserDirectory, UserRecord};
use crate::services::jwt::{JwtTokenService, TokenSource, strategies::GENERATE_DATABASE_TOKEN};
use crate::services::login_limiter::LoginAttemptLimiter;

/// Opaque password check against a stored hash.
#[async_trait]
pub trait PasswordVerifier: Send + Sync {
    async fn verify(&self, plain: &str, hash: &str) -> bool;
}

/// bcrypt, run on the blocking pool.
#[derive(Debug, Default, Clone, Copy)]
pub struct BcryptVerifier;

#[async_trait]
impl PasswordVerifier for BcryptVerifier {
    async fn verify(&self, plain: &str, hash: &str) -> bool {
        let plain = plain.to_string();
        let hash = hash.to_string();
        match tokio::task::spawn_blocking(move || bcrypt::verify(plain, &hash)).await {
            Ok(Ok(ok)) => ok,
            Ok(Err(e)) => {
                warn!(error = %e, "stored password hash is unreadable");
                false
            }
            Err(e) => {
                error!(error = %e, "password verification task failed");
                false
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoginSuccess {
    pub user: UserRecord,
    pub token: String,
}

/// Well-formed cost-12 bcrypt hash that no password matches. Unknown users are
/// verified against it so they take as long as known ones.
pub(crate) const DUMMY_HASH: &str = "$2b$12$authgatedummyhashsalt.thishashisnevermatchedbyanyone.";

fn invalid_credentials() -> AppError {
    AppError::unauthorized("INVALID_CREDENTIALS", "invalid email or password")
}

/// Email/password login gated by the attempt limiter.
///
/// Order: lockout check, lookup, verify, then record the outcome. Limiter
/// backend errors reject the login.
pub struct PasswordLogin {
    users: Arc<dyn UserDirectory>,
    verifier: Arc<dyn PasswordVerifier>,
    limiter: Arc<dyn LoginAttemptLimiter>,
    jwt: Arc<JwtTokenService>,
}

impl PasswordLogin {
    pub fn new(
        users: Arc<dyn UserDirectory>,
        verifier: Arc<dyn PasswordVerifier>,
        limiter: Arc<dyn LoginAttemptLimiter>,
        jwt: Arc<JwtTokenService>,
    ) -> Self {
        Self {
            users,
            verifier,
            limiter,
            jwt,
        }
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<LoginSuccess, AppError> {
        let identity = email.trim().to_ascii_lowercase();
        if identity.is_empty() || password.is_empty() {
            return Err(invalid_credentials());
        }

        let blocked = self.limiter.is_blocked(&identity).await.map_err(|e| {
            error!(error = %e, "login limiter unavailable, rejecting login");
            invalid_credentials()
        })?;
        if blocked {
            warn!(identity = %identity, "login attempt while locked out");
            return Err(AppError::unauthorized("ACCOUNT_LOCKED", "account temporarily locked"));
        }

        let user = self.users.find_by_email(&identity).await?;
        let verified = match user.as_ref().and_then(|u| u.password_hash.as_deref()) {
            Some(hash) => self.verifier.verify(password, hash).await,
            None => {
                self.verifier.verify(password, DUMMY_HASH).await;
                false
            }
        };

        let user = match (verified, user) {
            (true, Some(user)) => user,
            _ => {
                if let Err(e) = self.limiter.login_failed(&identity).await {
                    error!(error = %e, identity = %identity, "failed to record login failure");
                }
                warn!(identity = %identity, "password login failed");
                return Err(invalid_credentials());
            }
        };

        if let Err(e) = self.limiter.login_succeeded(&identity).await {
            warn!(error = %e, identity = %identity, "failed to clear login failures");
        }

        let token = self
            .jwt
            .generate_token(&TokenSource::User(user.clone()), GENERATE_DATABASE_TOKEN)?;
        info!(identity = %identity, "password login succeeded");
        Ok(LoginSuccess { user, token })
    }
}
