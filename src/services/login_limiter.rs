//! Brute-force lockout for password logins.
//!
//! Counts failed password attempts per identity. Once the count reaches the
//! threshold the identity is blocked until its record expires; the expiry is
//! measured from the last failed attempt. A successful login deletes the record.
use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::services::cache::{CacheClient, CacheError};

pub const DEFAULT_MAX_ATTEMPTS: u64 = 5;
pub const DEFAULT_LOCKOUT: Duration = Duration::from_secs(5 * 60);

#[async_trait]
pub trait LoginAttemptLimiter: Send + Sync {
    async fn is_blocked(&self, identity: &str) -> Result<bool, CacheError>;
    async fn login_failed(&self, identity: &str) -> Result<(), CacheError>;
    async fn login_succeeded(&self, identity: &str) -> Result<(), CacheError>;
}

#[derive(Debug, Clone, Copy)]
pub struct LockoutPolicy {
    pub max_attempts: u64,
    pub window: Duration,
}

impl Default for LockoutPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            window: DEFAULT_LOCKOUT,
        }
    }
}

/// Limiter over any `CacheClient` (in-process moka or shared Valkey).
#[derive(Clone)]
pub struct CacheLoginAttemptLimiter<C: CacheClient> {
    cache: Arc<C>,
    policy: LockoutPolicy,
    // Optional key prefix to avoid collisions across environments
    prefix: String,
}

impl<C: CacheClient> CacheLoginAttemptLimiter<C> {
    pub fn new(cache: Arc<C>, policy: LockoutPolicy) -> Self {
        Self::new_with_prefix(cache, policy, "login:attempts")
    }

    pub fn new_with_prefix(cache: Arc<C>, policy: LockoutPolicy, prefix: impl Into<String>) -> Self {
        Self {
            cache,
            policy,
            prefix: prefix.into(),
        }
    }

    /// Identities are normalized and hashed so raw emails never land in the cache.
    pub fn key(&self, identity: &str) -> String {
        let normalized = identity.trim().to_ascii_lowercase();
        let digest = Sha256::digest(normalized.as_bytes());
        format!("{}:{}", self.prefix, URL_SAFE_NO_PAD.encode(digest))
    }

    pub fn policy(&self) -> LockoutPolicy {
        self.policy
    }
}

#[async_trait]
impl<C: CacheClient> LoginAttemptLimiter for CacheLoginAttemptLimiter<C> {
    async fn is_blocked(&self, identity: &str) -> Result<bool, CacheError> {
        let count = match self.cache.get_string(&self.key(identity)).await? {
            Some(raw) => raw
                .parse::<u64>()
                .map_err(|_| CacheError::InvalidValue(raw))?,
            None => 0,
        };
        Ok(count >= self.policy.max_attempts)
    }

    async fn login_failed(&self, identity: &str) -> Result<(), CacheError> {
        let count = self
            .cache
            .incr_with_ttl(&self.key(identity), self.policy.window)
            .await?;

        if count == self.policy.max_attempts {
            info!(
                backend = self.cache.backend_name(),
                window_secs = self.policy.window.as_secs(),
                "identity locked after repeated login failures"
            );
        } else {
            debug!(count, "login failure recorded");
        }
        Ok(())
    }

    async fn login_succeeded(&self, identity: &str) -> Result<(), CacheError> {
        self.cache.del(&self.key(identity)).await?;
        Ok(())
    }
}
