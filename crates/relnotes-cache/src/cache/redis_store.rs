//! Redis-backed [`RemoteStore`] over a `deadpool-redis` pool.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use deadpool_redis::{Connection, Pool, PoolError};
use parking_lot::RwLock;
use redis::AsyncCommands;

use super::pattern::redis_match_pattern;
use super::remote::{ErrorCallback, RemoteConnector, RemoteStore};
use crate::config::RedisConfig;
use crate::error::RemoteError;

/// Keys requested per `SCAN` round trip.
const SCAN_BATCH: usize = 500;

/// Redis client used as the distributed tier.
pub struct RedisStore {
    pool: Pool,
    on_error: RwLock<Option<ErrorCallback>>,
}

impl RedisStore {
    pub fn new(pool: Pool) -> Self {
        Self {
            pool,
            on_error: RwLock::new(None),
        }
    }

    /// Check out a pooled connection.
    ///
    /// Failures other than pool timeouts mean the server could not be reached
    /// and are reported to the error listener before being returned.
    async fn conn(&self) -> Result<Connection, RemoteError> {
        self.pool.get().await.map_err(|e| {
            let err = RemoteError::Connection(e.to_string());
            if !matches!(e, PoolError::Timeout(_)) {
                if let Some(callback) = self.on_error.read().as_ref() {
                    callback(&err);
                }
            }
            err
        })
    }
}

fn command_error(e: redis::RedisError) -> RemoteError {
    RemoteError::Command(e.to_string())
}

#[async_trait]
impl RemoteStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>, RemoteError> {
        let mut conn = self.conn().await?;
        conn.get::<_, Option<String>>(key)
            .await
            .map_err(command_error)
    }

    async fn set_with_ttl(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<(), RemoteError> {
        let mut conn = self.conn().await?;
        // PSETEX rejects a zero expiry
        let ttl_ms = (ttl.as_millis() as u64).max(1);
        conn.pset_ex::<_, _, ()>(key, value, ttl_ms)
            .await
            .map_err(command_error)
    }

    async fn delete(&self, keys: &[String]) -> Result<(), RemoteError> {
        if keys.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn().await?;
        conn.del::<_, ()>(keys).await.map_err(command_error)
    }

    async fn keys_matching(&self, pattern: &str) -> Result<Vec<String>, RemoteError> {
        let mut conn = self.conn().await?;
        let pattern = redis_match_pattern(pattern);

        let mut keys = Vec::new();
        let mut cursor: u64 = 0;
        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut conn)
                .await
                .map_err(command_error)?;

            keys.extend(batch);
            if next == 0 {
                break;
            }
            cursor = next;
        }

        // SCAN may return a key more than once
        keys.sort_unstable();
        keys.dedup();
        Ok(keys)
    }

    fn on_error(&self, callback: ErrorCallback) {
        *self.on_error.write() = Some(callback);
    }
}

/// Builds a [`RedisStore`] from configuration and verifies reachability.
pub struct RedisConnector {
    url: String,
    pool_size: usize,
    timeout: Duration,
}

impl RedisConnector {
    pub fn new(url: impl Into<String>, pool_size: usize, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            pool_size,
            timeout,
        }
    }

    /// Returns `None` when no URL is configured.
    pub fn from_config(config: &RedisConfig) -> Option<Self> {
        let url = config.url.as_deref().filter(|url| !url.trim().is_empty())?;
        Some(Self::new(url, config.pool_size, config.timeout()))
    }
}

#[async_trait]
impl RemoteConnector for RedisConnector {
    async fn connect(&self) -> Result<Arc<dyn RemoteStore>, RemoteError> {
        tracing::info!(url = %redact_url(&self.url), "Connecting to Redis");

        let mut redis_config = deadpool_redis::Config::from_url(&self.url);
        if let Some(ref mut pool_config) = redis_config.pool {
            pool_config.max_size = self.pool_size;
            pool_config.timeouts.wait = Some(self.timeout);
            pool_config.timeouts.create = Some(self.timeout);
            pool_config.timeouts.recycle = Some(self.timeout);
        } else {
            let mut pool_config = deadpool_redis::PoolConfig::new(self.pool_size);
            pool_config.timeouts.wait = Some(self.timeout);
            pool_config.timeouts.create = Some(self.timeout);
            pool_config.timeouts.recycle = Some(self.timeout);
            redis_config.pool = Some(pool_config);
        }

        let pool = redis_config
            .create_pool(Some(deadpool_redis::Runtime::Tokio1))
            .map_err(|e| RemoteError::Connection(format!("failed to create Redis pool: {e}")))?;

        // Test connection
        pool.get()
            .await
            .map_err(|e| RemoteError::Connection(format!("failed to get Redis connection: {e}")))?;

        Ok(Arc::new(RedisStore::new(pool)))
    }
}

/// Hide credentials in a connection URL before logging it.
fn redact_url(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            format!("{}://***{}", &url[..scheme_end], &url[at..])
        }
        _ => url.to_string(),
    }
}
