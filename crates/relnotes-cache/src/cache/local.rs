//! Bounded in-process (L1) store.
//!
//! Entries carry an absolute expiry and are checked lazily on read. The
//! store holds at most `capacity` entries: when full, expired entries are
//! swept first and, if that frees nothing, the entry closest to expiry is
//! evicted.

use std::time::{Duration, Instant};

use dashmap::DashMap;

use super::pattern::compile_glob;

/// Default maximum number of L1 entries.
pub const DEFAULT_CAPACITY: usize = 1000;

/// Cached entry with expiration time.
#[derive(Clone, Debug)]
struct CachedEntry<V> {
    value: V,
    expires_at: Instant,
}

impl<V> CachedEntry<V> {
    #[inline]
    fn is_expired(&self, now: Instant) -> bool {
        now > self.expires_at
    }
}

/// Snapshot of the L1 tier.
///
/// `keys` may include entries that have expired but were not swept yet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub size: usize,
    pub keys: Vec<String>,
}

/// Thread-safe, capacity-bounded TTL map.
pub struct LocalStore<V> {
    entries: DashMap<String, CachedEntry<V>>,
    capacity: usize,
}

impl<V: Clone> LocalStore<V> {
    /// Create a store holding at most `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: DashMap::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Get a live value. An expired entry is removed and reported as absent.
    pub fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();

        if let Some(entry) = self.entries.get(key) {
            if !entry.is_expired(now) {
                return Some(entry.value.clone());
            }
            drop(entry);
            // Only remove if nobody refreshed the key in between
            self.entries.remove_if(key, |_, entry| entry.is_expired(now));
        }

        None
    }

    /// Insert or overwrite an entry, resetting its expiry.
    pub fn set(&self, key: impl Into<String>, value: V, ttl: Duration) {
        let key = key.into();

        if self.entries.len() >= self.capacity {
            let removed = self.sweep_expired();
            if removed > 0 {
                tracing::debug!(removed, "L1 cache full, swept expired entries");
            }

            if self.entries.len() >= self.capacity && !self.entries.contains_key(&key) {
                self.evict_soonest();
            }
        }

        self.entries.insert(
            key,
            CachedEntry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
    }

    /// Remove an entry. Absent keys are ignored.
    pub fn delete(&self, key: &str) {
        self.entries.remove(key);
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Remove every key matching `pattern` (`*` wildcard).
    ///
    /// Returns the number of removed entries.
    pub fn invalidate_pattern(&self, pattern: &str) -> usize {
        let matcher = match compile_glob(pattern) {
            Ok(re) => re,
            Err(e) => {
                tracing::warn!(pattern = %pattern, error = %e, "invalid invalidation pattern");
                return 0;
            }
        };

        let mut removed = 0;
        self.entries.retain(|key, _| {
            if matcher.is_match(key) {
                removed += 1;
                false
            } else {
                true
            }
        });
        removed
    }

    pub fn stats(&self) -> CacheStats {
        let keys: Vec<String> = self.entries.iter().map(|e| e.key().clone()).collect();
        CacheStats {
            size: keys.len(),
            keys,
        }
    }

    /// Remove every expired entry and return how many were dropped.
    pub fn sweep_expired(&self) -> usize {
        let now = Instant::now();
        let mut removed = 0;

        self.entries.retain(|_, entry| {
            if entry.is_expired(now) {
                removed += 1;
                false
            } else {
                true
            }
        });

        removed
    }

    /// Remaining lifetime of an entry, `None` if the key is absent.
    pub fn expires_in(&self, key: &str) -> Option<Duration> {
        self.entries
            .get(key)
            .map(|entry| entry.expires_at.saturating_duration_since(Instant::now()))
    }

    fn evict_soonest(&self) {
        let victim = self
            .entries
            .iter()
            .min_by_key(|entry| entry.expires_at)
            .map(|entry| entry.key().clone());

        if let Some(key) = victim {
            tracing::debug!(key = %key, capacity = self.capacity, "L1 cache at capacity, evicting");
            self.entries.remove(&key);
        }
    }
}

impl<V: Clone> Default for LocalStore<V> {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_get() {
        let store = LocalStore::new(10);
        store.set("k", 42u32, Duration::from_secs(60));
        assert_eq!(store.get("k"), Some(42));
        assert_eq!(store.get("missing"), None);
    }

    #[test]
    fn test_expired_entry_is_removed_on_get() {
        let store = LocalStore::new(10);
        store.set("k", "v".to_string(), Duration::from_millis(10));
        std::thread::sleep(Duration::from_millis(20));

        assert_eq!(store.get("k"), None);
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn test_overwrite_resets_expiry() {
        let store = LocalStore::new(10);
        store.set("k", 1, Duration::from_millis(10));
        store.set("k", 2, Duration::from_secs(60));
        std::thread::sleep(Duration::from_millis(20));

        assert_eq!(store.get("k"), Some(2));
    }

    #[test]
    fn test_delete_is_idempotent() {
        let store = LocalStore::new(10);
        store.set("k", 1, Duration::from_secs(60));
        store.delete("k");
        store.delete("k");
        assert!(store.is_empty());
    }

    #[test]
    fn test_invalidate_pattern_scoping() {
        let store = LocalStore::new(10);
        for key in ["user:1:a", "user:1:b", "user:2:a"] {
            store.set(key, 0, Duration::from_secs(60));
        }

        assert_eq!(store.invalidate_pattern("user:1:*"), 2);
        assert_eq!(store.get("user:1:a"), None);
        assert_eq!(store.get("user:1:b"), None);
        assert_eq!(store.get("user:2:a"), Some(0));
    }

    #[test]
    fn test_stats_keeps_expired_keys_until_swept() {
        let store = LocalStore::new(10);
        store.set("live", 1, Duration::from_secs(60));
        store.set("stale", 2, Duration::from_millis(5));
        std::thread::sleep(Duration::from_millis(15));

        let stats = store.stats();
        assert_eq!(stats.size, 2);
        assert!(stats.keys.contains(&"stale".to_string()));

        assert_eq!(store.sweep_expired(), 1);
        assert_eq!(store.stats().keys, vec!["live".to_string()]);
    }

    #[test]
    fn test_full_store_sweeps_expired_before_insert() {
        let store = LocalStore::new(3);
        store.set("a", 1, Duration::from_millis(5));
        store.set("b", 2, Duration::from_millis(5));
        store.set("c", 3, Duration::from_secs(60));
        std::thread::sleep(Duration::from_millis(15));

        store.set("d", 4, Duration::from_secs(60));

        let mut keys = store.stats().keys;
        keys.sort();
        assert_eq!(keys, vec!["c".to_string(), "d".to_string()]);
    }

    #[test]
    fn test_capacity_is_never_exceeded() {
        let store = LocalStore::new(5);
        for i in 0..50u64 {
            store.set(format!("key-{i}"), i, Duration::from_secs(60 + i));
        }

        assert_eq!(store.len(), 5);
        // The entries closest to expiry were the ones evicted
        assert_eq!(store.get("key-49"), Some(49));
        assert_eq!(store.get("key-0"), None);
    }

    #[test]
    fn test_overwrite_at_capacity_does_not_evict() {
        let store = LocalStore::new(2);
        store.set("a", 1, Duration::from_secs(60));
        store.set("b", 2, Duration::from_secs(60));
        store.set("a", 3, Duration::from_secs(60));

        assert_eq!(store.get("a"), Some(3));
        assert_eq!(store.get("b"), Some(2));
    }

    #[test]
    fn test_expires_in_reports_remaining_ttl() {
        let store = LocalStore::new(10);
        store.set("k", 1, Duration::from_secs(300));

        let remaining = store.expires_in("k").unwrap();
        assert!(remaining <= Duration::from_secs(300));
        assert!(remaining > Duration::from_secs(299));
        assert_eq!(store.expires_in("missing"), None);
    }
}
