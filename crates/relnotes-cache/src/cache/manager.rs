//! Two-tier cache manager: L1 ([`LocalStore`]) in front of L2 ([`RemoteCache`]).

use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::local::{CacheStats, DEFAULT_CAPACITY, LocalStore};
use super::remote::{RemoteCache, RemoteState};
use crate::config::CacheConfig;
use crate::error::CacheError;
use crate::metrics;

/// Values held by L1 are stored natively, type-erased.
type LocalValue = Arc<dyn Any + Send + Sync>;

/// TTL and capacity policy shared by both tiers.
#[derive(Debug, Clone)]
pub struct CachePolicy {
    /// TTL used by [`CacheManager::set`] and for L2 backfills.
    pub default_ttl: Duration,
    /// No L1 entry lives longer than this, whatever the caller asked for.
    pub local_max_ttl: Duration,
    pub local_max_entries: usize,
    /// Probability of sweeping expired L1 entries on each `get`.
    pub opportunistic_sweep_ratio: f64,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            default_ttl: Duration::from_secs(3600),
            local_max_ttl: Duration::from_secs(300),
            local_max_entries: DEFAULT_CAPACITY,
            opportunistic_sweep_ratio: 0.0,
        }
    }
}

impl From<&CacheConfig> for CachePolicy {
    fn from(config: &CacheConfig) -> Self {
        Self {
            default_ttl: Duration::from_secs(config.default_ttl_secs),
            local_max_ttl: Duration::from_secs(config.local_max_ttl_secs),
            local_max_entries: config.local_max_entries,
            opportunistic_sweep_ratio: config.opportunistic_sweep_ratio,
        }
    }
}

impl CachePolicy {
    #[inline]
    fn local_ttl(&self, ttl: Duration) -> Duration {
        ttl.min(self.local_max_ttl)
    }
}

/// Read-through, write-through cache over an in-process and a distributed tier.
///
/// ## Lookup Order
///
/// ```text
/// get → L1 (in-process) → L2 (distributed) → None
///                              ↓ hit
///                      backfill L1 (clamped TTL)
/// ```
///
/// Only `get` can fail, and only when L2 hands back a value that does not
/// decode. Every distributed-tier failure is logged and absorbed.
pub struct CacheManager {
    local: LocalStore<LocalValue>,
    remote: Arc<RemoteCache>,
    policy: CachePolicy,
}

impl CacheManager {
    /// Create a manager and start the distributed tier's connection attempt.
    ///
    /// Outside a Tokio runtime the attempt is deferred to the first operation.
    pub fn new(policy: CachePolicy, remote: RemoteCache) -> Self {
        let remote = Arc::new(remote);

        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let remote = Arc::clone(&remote);
            handle.spawn(async move {
                remote.ensure_initialized().await;
            });
        }

        Self {
            local: LocalStore::new(policy.local_max_entries),
            remote,
            policy,
        }
    }

    /// Create a manager with no distributed tier.
    pub fn local_only(policy: CachePolicy) -> Self {
        Self::new(policy, RemoteCache::disabled())
    }

    pub fn policy(&self) -> &CachePolicy {
        &self.policy
    }

    /// Get a value, consulting L1 first and L2 on a miss.
    pub async fn get<T>(&self, key: &str) -> Result<Option<Arc<T>>, CacheError>
    where
        T: DeserializeOwned + Send + Sync + 'static,
    {
        self.maybe_sweep();

        // 1. Check L1
        if let Some(value) = self.local.get(key) {
            match value.downcast::<T>() {
                Ok(value) => {
                    tracing::debug!(key = %key, "cache hit (L1)");
                    metrics::record_cache_hit("L1");
                    return Ok(Some(value));
                }
                Err(_) => {
                    tracing::warn!(
                        key = %key,
                        expected = std::any::type_name::<T>(),
                        "L1 entry has a different type, falling back to L2"
                    );
                }
            }
        }

        // 2. Check L2
        let Some(raw) = self.remote.get(key).await else {
            tracing::debug!(key = %key, "cache miss");
            metrics::record_cache_miss();
            return Ok(None);
        };

        let value: Arc<T> = Arc::new(
            serde_json::from_str(&raw).map_err(|e| CacheError::deserialize(key, e))?,
        );
        tracing::debug!(key = %key, "cache hit (L2)");
        metrics::record_cache_hit("L2");

        // Promote to L1
        let local_value: LocalValue = value.clone();
        self.local
            .set(key, local_value, self.policy.local_ttl(self.policy.default_ttl));

        Ok(Some(value))
    }

    /// Store a value in both tiers with the default TTL.
    pub async fn set<T>(&self, key: &str, value: T)
    where
        T: Serialize + Send + Sync + 'static,
    {
        self.set_with_ttl(key, value, self.policy.default_ttl).await;
    }

    /// Store a value in both tiers.
    ///
    /// L1 keeps it for at most the local TTL ceiling; L2 honours `ttl`.
    pub async fn set_with_ttl<T>(&self, key: &str, value: T, ttl: Duration)
    where
        T: Serialize + Send + Sync + 'static,
    {
        let serialized = match serde_json::to_string(&value) {
            Ok(json) => Some(json),
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Failed to serialize value for L2, caching locally only");
                None
            }
        };

        let local_value: LocalValue = Arc::new(value);
        self.local.set(key, local_value, self.policy.local_ttl(ttl));

        if let Some(json) = serialized {
            self.remote.set_with_ttl(key, &json, ttl).await;
        }
    }

    /// Remove a key from both tiers.
    pub async fn delete(&self, key: &str) {
        self.local.delete(key);
        self.remote.delete(key).await;
        tracing::debug!(key = %key, "cache invalidated");
    }

    /// Remove every key matching `pattern` (`*` wildcard) from both tiers.
    ///
    /// L1 is invalidated even if the L2 call fails, panics or the future is
    /// dropped before completion.
    pub async fn invalidate_pattern(&self, pattern: &str) {
        let guard = LocalInvalidation {
            local: &self.local,
            pattern,
        };
        let remote_removed = self.remote.delete_keys_matching(pattern).await;
        drop(guard);

        tracing::debug!(pattern = %pattern, remote_removed, "pattern invalidated");
    }

    /// Clear L1. L2 entries are left to expire on their own TTL.
    pub fn clear(&self) {
        self.local.clear();
    }

    /// L1 statistics.
    pub fn stats(&self) -> CacheStats {
        self.local.stats()
    }

    /// Sweep expired L1 entries, returning how many were removed.
    pub fn cleanup(&self) -> usize {
        let removed = self.local.sweep_expired();
        metrics::set_cache_entries("L1", self.local.len());
        removed
    }

    /// Remaining L1 lifetime of `key`.
    pub fn local_expires_in(&self, key: &str) -> Option<Duration> {
        self.local.expires_in(key)
    }

    pub fn remote_state(&self) -> RemoteState {
        self.remote.state()
    }

    /// Wait for the distributed tier's connection attempt to settle.
    pub async fn ensure_remote(&self) -> RemoteState {
        self.remote.ensure_initialized().await
    }

    fn maybe_sweep(&self) {
        let ratio = self.policy.opportunistic_sweep_ratio;
        if ratio > 0.0 && rand::thread_rng().gen_bool(ratio.min(1.0)) {
            let removed = self.cleanup();
            if removed > 0 {
                tracing::debug!(removed, "opportunistic L1 sweep");
            }
        }
    }
}

/// Runs the L1 half of a pattern invalidation when dropped.
struct LocalInvalidation<'a> {
    local: &'a LocalStore<LocalValue>,
    pattern: &'a str,
}

impl Drop for LocalInvalidation<'_> {
    fn drop(&mut self) {
        let removed = self.local.invalidate_pattern(self.pattern);
        tracing::debug!(pattern = %self.pattern, removed, "pattern invalidated (L1)");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Note {
        title: String,
    }

    fn note(title: &str) -> Note {
        Note {
            title: title.to_string(),
        }
    }

    #[tokio::test]
    async fn test_round_trip_local_only() {
        let cache = CacheManager::local_only(CachePolicy::default());
        cache.set("k", note("hello")).await;

        let value = cache.get::<Note>("k").await.unwrap();
        assert_eq!(value.as_deref(), Some(&note("hello")));
    }

    #[tokio::test]
    async fn test_missing_key_returns_none() {
        let cache = CacheManager::local_only(CachePolicy::default());
        assert!(cache.get::<Note>("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_local_ttl_is_clamped() {
        let cache = CacheManager::local_only(CachePolicy::default());
        cache
            .set_with_ttl("k", note("a"), Duration::from_secs(999_999))
            .await;

        let remaining = cache.local_expires_in("k").unwrap();
        assert!(remaining <= Duration::from_secs(300));
        assert!(remaining > Duration::from_secs(295));
    }

    #[tokio::test]
    async fn test_short_ttl_is_not_extended() {
        let cache = CacheManager::local_only(CachePolicy::default());
        cache.set_with_ttl("k", 7u32, Duration::from_secs(10)).await;

        assert!(cache.local_expires_in("k").unwrap() <= Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_type_mismatch_is_a_miss() {
        let cache = CacheManager::local_only(CachePolicy::default());
        cache.set("k", 7u32).await;

        assert!(cache.get::<String>("k").await.unwrap().is_none());
        assert_eq!(cache.get::<u32>("k").await.unwrap().as_deref(), Some(&7));
    }

    #[tokio::test]
    async fn test_clear_and_cleanup() {
        let cache = CacheManager::local_only(CachePolicy::default());
        cache.set("a", 1u8).await;
        cache.set_with_ttl("b", 2u8, Duration::from_millis(10)).await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(cache.cleanup(), 1);
        assert_eq!(cache.stats().size, 1);

        cache.clear();
        assert_eq!(cache.stats().size, 0);
    }

    #[tokio::test]
    async fn test_opportunistic_sweep_on_get() {
        let policy = CachePolicy {
            opportunistic_sweep_ratio: 1.0,
            ..Default::default()
        };
        let cache = CacheManager::local_only(policy);
        cache.set_with_ttl("old", 1u8, Duration::from_millis(5)).await;
        cache.set("live", 2u8).await;
        tokio::time::sleep(Duration::from_millis(15)).await;

        let _ = cache.get::<u8>("live").await.unwrap();
        assert_eq!(cache.stats().keys, vec!["live".to_string()]);
    }

    #[tokio::test]
    async fn test_local_only_remote_state() {
        let cache = CacheManager::local_only(CachePolicy::default());
        assert_eq!(cache.ensure_remote().await, RemoteState::Unavailable);
    }
}
