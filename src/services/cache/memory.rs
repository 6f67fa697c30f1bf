//! In-process cache backed by moka, for single-instance deployments and tests.
use async_trait::async_trait;
use moka::{Expiry, future::Cache};
use std::time::{Duration, Instant};

use crate::services::cache::client::{CacheClient, CacheError, CacheResult};

#[derive(Clone, Debug)]
struct CachedValue {
    value: String,
    ttl: Duration,
}

/// Every write restarts the entry's own TTL.
struct TtlFromLastWrite;

impl Expiry<String, CachedValue> for TtlFromLastWrite {
    fn expire_after_create(&self, _key: &String, value: &CachedValue, _created_at: Instant) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &CachedValue,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

// moka's Cache is internally reference counted, so clones share entries.
#[derive(Clone)]
pub struct MemoryCache {
    cache: Cache<String, CachedValue>,
}

impl MemoryCache {
    pub fn new(max_entries: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_entries)
            .expire_after(TtlFromLastWrite)
            .build();

        Self { cache }
    }
}

impl std::fmt::Debug for MemoryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryCache")
            .field("entries", &self.cache.entry_count())
            .finish()
    }
}

#[async_trait]
impl CacheClient for MemoryCache {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn get_string(&self, key: &str) -> CacheResult<Option<String>> {
        Ok(self.cache.get(key).await.map(|e| e.value))
    }

    async fn incr_with_ttl(&self, key: &str, ttl: Duration) -> CacheResult<u64> {
        // and_upsert_with serializes writers on the same key.
        let mut parse_error = None;
        let entry = self
            .cache
            .entry(key.to_string())
            .and_upsert_with(|existing| {
                let current = match existing.map(|e| e.into_value().value) {
                    Some(raw) => raw.parse::<u64>().unwrap_or_else(|_| {
                        parse_error = Some(raw);
                        0
                    }),
                    None => 0,
                };
                std::future::ready(CachedValue {
                    value: (current + 1).to_string(),
                    ttl,
                })
            })
            .await;

        if let Some(raw) = parse_error {
            tracing::warn!(key = %key, value = %raw, "non-numeric counter reset");
        }

        entry
            .into_value()
            .value
            .parse()
            .map_err(|_| CacheError::InvalidValue(key.to_string()))
    }

    async fn del(&self, key: &str) -> CacheResult<u64> {
        Ok(self.cache.remove(key).await.map_or(0, |_| 1))
    }
}
