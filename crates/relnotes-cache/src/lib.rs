pub mod cache;
pub mod config;
pub mod error;
pub mod metrics;
pub mod observability;

use std::sync::Arc;

pub use cache::{
    CacheJanitor, CacheManager, CachePolicy, CacheStats, ReleaseNote, ReleaseNoteCache,
    RemoteCache, RemoteState,
};
pub use config::{AppConfig, CacheConfig, JanitorConfig, LoggingConfig, RedisConfig};
pub use error::{CacheError, ConfigError, RemoteError};
pub use observability::{apply_logging_level, init_tracing};

/// Create a cache manager based on configuration.
///
/// ## Cache Modes
///
/// - **Redis disabled or no URL**: local-only cache (DashMap)
/// - **Redis enabled**: connects in the background; falls back to local on failure
///
/// ## Graceful Degradation
///
/// A failed connection never prevents startup. The manager keeps serving
/// from the in-process tier and logs the failure once.
pub fn create_cache_manager(config: &AppConfig) -> Arc<CacheManager> {
    let policy = CachePolicy::from(&config.cache);

    if !config.redis.enabled {
        tracing::info!("Redis disabled, using local cache only");
        return Arc::new(CacheManager::local_only(policy));
    }

    let Some(connector) = cache::RedisConnector::from_config(&config.redis) else {
        tracing::warn!("Redis enabled but redis.url is not set, using local cache only");
        return Arc::new(CacheManager::local_only(policy));
    };

    let remote = RemoteCache::new(Arc::new(connector), config.redis.timeout());
    Arc::new(CacheManager::new(policy, remote))
}
