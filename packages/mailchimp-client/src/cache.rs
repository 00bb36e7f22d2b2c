//! Response cache port for list, interest, merge-field and tag lookups.
//!
//! Lookups only feed admin tooling, so a bounded amount of staleness is fine.
//! The subscribe call never goes through the cache.

use std::future::Future;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde_json::Value;

use crate::error::Result;

/// Default time-to-live for cached lookups.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(60 * 60);

/// Key/value cache with per-entry expiry.
pub trait ResponseCache: Send + Sync {
    /// Fetch a live entry.
    fn get(&self, key: &str) -> Option<Value>;

    /// Store an entry for `ttl`.
    fn put(&self, key: &str, value: Value, ttl: Duration);

    /// Drop an entry.
    fn remove(&self, key: &str);
}

/// Return the cached value for `key`, or compute, store and return it.
///
/// Errors from `compute` are returned as-is and nothing is stored.
pub async fn get_or_compute<F, Fut>(
    cache: &dyn ResponseCache,
    key: &str,
    ttl: Duration,
    compute: F,
) -> Result<Value>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Value>>,
{
    if let Some(hit) = cache.get(key) {
        tracing::debug!(key, "MailChimp cache hit");
        return Ok(hit);
    }

    let value = compute().await?;
    cache.put(key, value.clone(), ttl);
    Ok(value)
}

/// In-process [`ResponseCache`].
#[derive(Default)]
pub struct MemoryCache {
    entries: DashMap<String, (Value, Instant)>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl ResponseCache for MemoryCache {
    fn get(&self, key: &str) -> Option<Value> {
        let expired = match self.entries.get(key) {
            Some(entry) => {
                let (value, expires_at) = entry.value();
                if Instant::now() < *expires_at {
                    return Some(value.clone());
                }
                true
            }
            None => false,
        };

        if expired {
            self.entries.remove(key);
        }
        None
    }

    /// Expired entries are pruned on every write, so keys that are never
    /// read again do not accumulate.
    fn put(&self, key: &str, value: Value, ttl: Duration) {
        let now = Instant::now();
        self.entries.retain(|_, (_, expires_at)| now < *expires_at);
        self.entries.insert(key.to_string(), (value, now + ttl));
    }

    fn remove(&self, key: &str) {
        self.entries.remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MailchimpError;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn expired_entries_are_dropped() {
        let cache = MemoryCache::new();
        cache.put("lists", json!({"a": "A"}), Duration::ZERO);

        assert_eq!(cache.get("lists"), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn writes_prune_entries_that_are_never_read_again() {
        let cache = MemoryCache::new();
        cache.put("mailchimp:k1:lists", json!({"a": "A"}), Duration::ZERO);
        cache.put("mailchimp:k2:lists", json!({"b": "B"}), DEFAULT_CACHE_TTL);

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("mailchimp:k2:lists"), Some(json!({"b": "B"})));
    }

    #[tokio::test]
    async fn computes_once_while_fresh() {
        let cache = MemoryCache::new();
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let value = get_or_compute(&cache, "lists", DEFAULT_CACHE_TTL, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(json!({"L1": "Newsletter"}))
            })
            .await
            .unwrap();
            assert_eq!(value, json!({"L1": "Newsletter"}));
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failures_are_not_cached() {
        let cache = MemoryCache::new();

        let result = get_or_compute(&cache, "lists", DEFAULT_CACHE_TTL, || async {
            Err(MailchimpError::transport("timed out"))
        })
        .await;

        assert!(result.is_err());
        assert!(cache.is_empty());
    }
}
