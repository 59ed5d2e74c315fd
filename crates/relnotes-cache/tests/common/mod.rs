//! In-memory stand-in for the distributed tier.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use relnotes_cache::cache::pattern::compile_glob;
use relnotes_cache::cache::{
    CacheManager, CachePolicy, ErrorCallback, RemoteCache, RemoteConnector, RemoteStore,
};
use relnotes_cache::error::RemoteError;

/// Remote store keeping values and the TTL they were written with.
#[derive(Default)]
pub struct FakeRemote {
    entries: Mutex<HashMap<String, (String, Duration)>>,
    failing: AtomicBool,
    pub gets: AtomicUsize,
    pub delete_calls: AtomicUsize,
    callback: Mutex<Option<ErrorCallback>>,
}

impl FakeRemote {
    /// Make every subsequent call fail with a command error.
    pub fn fail_all(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    /// Write directly into the remote tier, bypassing the manager.
    pub fn insert_raw(&self, key: &str, value: &str) {
        self.entries
            .lock()
            .insert(key.to_string(), (value.to_string(), Duration::from_secs(3600)));
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.lock().contains_key(key)
    }

    pub fn ttl_of(&self, key: &str) -> Option<Duration> {
        self.entries.lock().get(key).map(|(_, ttl)| *ttl)
    }

    pub fn raw(&self, key: &str) -> Option<String> {
        self.entries.lock().get(key).map(|(value, _)| value.clone())
    }

    pub fn emit_error(&self) {
        if let Some(callback) = self.callback.lock().as_ref() {
            callback(&RemoteError::Connection("connection reset".into()));
        }
    }

    fn check(&self) -> Result<(), RemoteError> {
        if self.failing.load(Ordering::SeqCst) {
            Err(RemoteError::Command("injected failure".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl RemoteStore for FakeRemote {
    async fn get(&self, key: &str) -> Result<Option<String>, RemoteError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        Ok(self.raw(key))
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<(), RemoteError> {
        self.check()?;
        self.entries
            .lock()
            .insert(key.to_string(), (value.to_string(), ttl));
        Ok(())
    }

    async fn delete(&self, keys: &[String]) -> Result<(), RemoteError> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        let mut entries = self.entries.lock();
        for key in keys {
            entries.remove(key);
        }
        Ok(())
    }

    async fn keys_matching(&self, pattern: &str) -> Result<Vec<String>, RemoteError> {
        self.check()?;
        let matcher = compile_glob(pattern).map_err(|e| RemoteError::Command(e.to_string()))?;
        Ok(self
            .entries
            .lock()
            .keys()
            .filter(|key| matcher.is_match(key))
            .cloned()
            .collect())
    }

    fn on_error(&self, callback: ErrorCallback) {
        *self.callback.lock() = Some(callback);
    }
}

pub struct FakeConnector {
    pub remote: Arc<FakeRemote>,
    pub refuse: bool,
}

#[async_trait]
impl RemoteConnector for FakeConnector {
    async fn connect(&self) -> Result<Arc<dyn RemoteStore>, RemoteError> {
        if self.refuse {
            return Err(RemoteError::Connection("connection refused".into()));
        }
        Ok(self.remote.clone())
    }
}

/// Manager wired to a fresh fake remote tier.
pub async fn two_tier(policy: CachePolicy) -> (Arc<CacheManager>, Arc<FakeRemote>) {
    let remote = Arc::new(FakeRemote::default());
    let connector = FakeConnector {
        remote: remote.clone(),
        refuse: false,
    };
    let manager = CacheManager::new(
        policy,
        RemoteCache::new(Arc::new(connector), Duration::from_secs(1)),
    );
    manager.ensure_remote().await;
    (Arc::new(manager), remote)
}
