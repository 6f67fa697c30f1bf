//! Keyed strategy lookup.
//!
//! Every pluggable behavior in the pipeline (authentication strategies, claim
//! resolvers, token generators/validators, login strategies, OAuth2 providers)
//! is looked up from one of these by a string key. Reads are lock-free on the
//! hot path; registration normally happens at startup but may be repeated at
//! runtime to hot-swap an entry.

use std::{fmt, sync::Arc};

use dashmap::DashMap;
use thiserror::Error;
use tracing::{debug, warn};

use crate::error::AppError;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("{registry}: nothing registered for key '{key}'")]
    NotFound { registry: &'static str, key: String },
}

impl From<RegistryError> for AppError {
    fn from(e: RegistryError) -> Self {
        tracing::error!(error = %e, "strategy lookup failed");
        AppError::Internal
    }
}

pub struct StrategyRegistry<V: ?Sized> {
    name: &'static str,
    entries: DashMap<String, Arc<V>>,
}

impl<V: ?Sized> StrategyRegistry<V> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            entries: DashMap::new(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Insert or replace. Replacing an existing key is logged.
    pub fn register(&self, key: impl Into<String>, value: Arc<V>) -> &Self {
        let key = key.into();
        match self.entries.insert(key.clone(), value) {
            Some(_) => warn!(registry = self.name, key = %key, "replaced registered strategy"),
            None => debug!(registry = self.name, key = %key, "registered strategy"),
        }
        self
    }

    pub fn get(&self, key: &str) -> Option<Arc<V>> {
        self.entries.get(key).map(|entry| Arc::clone(entry.value()))
    }

    /// Like `get`, but a missing key becomes an error the caller can propagate.
    pub fn require(&self, key: &str) -> Result<Arc<V>, RegistryError> {
        self.get(key).ok_or_else(|| RegistryError::NotFound {
            registry: self.name,
            key: key.to_string(),
        })
    }

    pub fn has(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn remove(&self, key: &str) -> Option<Arc<V>> {
        self.entries.remove(key).map(|(_, value)| value)
    }

    /// Registered keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<V: ?Sized> fmt::Debug for StrategyRegistry<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StrategyRegistry")
            .field("name", &self.name)
            .field("keys", &self.keys())
            .finish()
    }
}
