use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Redis configuration
    #[serde(default)]
    pub redis: RedisConfig,
    /// Cache policy configuration
    #[serde(default)]
    pub cache: CacheConfig,
    /// Background janitor configuration
    #[serde(default)]
    pub janitor: JanitorConfig,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), String> {
        // Logging validation
        let lvl = self.logging.level.to_ascii_lowercase();
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&lvl.as_str()) {
            return Err(format!("logging.level must be one of {valid_levels:?}"));
        }
        // Redis validation
        if self.redis.pool_size == 0 {
            return Err("redis.pool_size must be > 0".into());
        }
        if self.redis.timeout_ms == 0 {
            return Err("redis.timeout_ms must be > 0".into());
        }
        // Cache validation
        if self.cache.default_ttl_secs == 0 {
            return Err("cache.default_ttl_secs must be > 0".into());
        }
        if self.cache.local_max_ttl_secs == 0 {
            return Err("cache.local_max_ttl_secs must be > 0".into());
        }
        if self.cache.local_max_entries == 0 {
            return Err("cache.local_max_entries must be > 0".into());
        }
        let ratio = self.cache.opportunistic_sweep_ratio;
        if !(0.0..=1.0).contains(&ratio) {
            return Err("cache.opportunistic_sweep_ratio must be within [0, 1]".into());
        }
        // Janitor validation
        if self.janitor.interval_secs == 0 {
            return Err("janitor.interval_secs must be > 0".into());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}
fn default_log_level() -> String {
    "info".into()
}
impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Redis configuration for the distributed tier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    /// Enable Redis (gracefully degrades without it)
    /// Default: false (in-process cache only)
    #[serde(default = "default_redis_enabled")]
    pub enabled: bool,

    /// Redis connection URL (e.g., "redis://localhost:6379").
    /// Absent means in-process only, even when enabled.
    #[serde(default)]
    pub url: Option<String>,

    /// Connection pool size
    #[serde(default = "default_redis_pool_size")]
    pub pool_size: usize,

    /// Connection and per-operation timeout in milliseconds
    #[serde(default = "default_redis_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_redis_enabled() -> bool {
    false
}

fn default_redis_pool_size() -> usize {
    10
}

fn default_redis_timeout_ms() -> u64 {
    5000
}

impl RedisConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            enabled: default_redis_enabled(),
            url: None,
            pool_size: default_redis_pool_size(),
            timeout_ms: default_redis_timeout_ms(),
        }
    }
}

/// Cache policy configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// TTL applied when callers don't pass one
    #[serde(default = "default_ttl_secs")]
    pub default_ttl_secs: u64,

    /// Ceiling for in-process (L1) entry lifetimes
    #[serde(default = "default_local_max_ttl_secs")]
    pub local_max_ttl_secs: u64,

    /// Local (L1) cache max entries
    #[serde(default = "default_local_max_entries")]
    pub local_max_entries: usize,

    /// Probability that a `get` also sweeps expired L1 entries.
    /// Meant for deployments where the janitor cannot run; 0 disables it.
    #[serde(default)]
    pub opportunistic_sweep_ratio: f64,
}

fn default_ttl_secs() -> u64 {
    3600 // 1 hour
}

fn default_local_max_ttl_secs() -> u64 {
    300 // 5 minutes
}

fn default_local_max_entries() -> usize {
    1000
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl_secs: default_ttl_secs(),
            local_max_ttl_secs: default_local_max_ttl_secs(),
            local_max_entries: default_local_max_entries(),
            opportunistic_sweep_ratio: 0.0,
        }
    }
}

/// Background janitor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JanitorConfig {
    /// Disable on serverless hosts and use `cache.opportunistic_sweep_ratio`
    #[serde(default = "default_janitor_enabled")]
    pub enabled: bool,

    #[serde(default = "default_janitor_interval_secs")]
    pub interval_secs: u64,
}

fn default_janitor_enabled() -> bool {
    true
}

fn default_janitor_interval_secs() -> u64 {
    600 // 10 minutes
}

impl JanitorConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl Default for JanitorConfig {
    fn default() -> Self {
        Self {
            enabled: default_janitor_enabled(),
            interval_secs: default_janitor_interval_secs(),
        }
    }
}

pub mod loader {
    use super::AppConfig;
    use crate::error::ConfigError;
    use config::{Config, Environment, File};
    use std::path::PathBuf;

    pub fn load_config(path: Option<&str>) -> Result<AppConfig, ConfigError> {
        let mut builder = Config::builder();
        match path {
            Some(p) => {
                let pathbuf = PathBuf::from(p);
                if pathbuf.exists() {
                    builder = builder.add_source(File::from(pathbuf));
                }
            }
            None => {
                // Try default root-level file
                let default_path = PathBuf::from("relnotes.toml");
                if default_path.exists() {
                    builder = builder.add_source(File::from(default_path));
                }
            }
        }
        // Environment variable overrides, e.g., RELNOTES__REDIS__URL=redis://cache:6379
        builder = builder.add_source(
            Environment::with_prefix("RELNOTES")
                .try_parsing(true)
                .separator("__"),
        );
        let merged: AppConfig = builder.build()?.try_deserialize()?;
        merged.validate().map_err(ConfigError::Invalid)?;
        Ok(merged)
    }
}
