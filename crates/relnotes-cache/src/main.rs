use std::env;

use relnotes_cache::config::loader::load_config;
use relnotes_cache::{CacheJanitor, create_cache_manager};

/// How the configuration path was determined.
#[derive(Debug, Clone, Copy)]
enum ConfigSource {
    /// From --config CLI argument
    CliArgument,
    /// From RELNOTES_CONFIG environment variable
    EnvironmentVariable,
    /// Default path (relnotes.toml)
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CliArgument => write!(f, "CLI argument (--config)"),
            Self::EnvironmentVariable => write!(f, "environment variable (RELNOTES_CONFIG)"),
            Self::Default => write!(f, "default"),
        }
    }
}

#[tokio::main]
async fn main() {
    // Load .env file if present (before anything else)
    if let Err(e) = dotenvy::dotenv() {
        // Not an error if .env doesn't exist - it's optional
        if !matches!(e, dotenvy::Error::Io(ref io_err) if io_err.kind() == std::io::ErrorKind::NotFound)
        {
            eprintln!("Warning: Failed to load .env file: {e}");
        }
    }

    // Initialize tracing early with the default level
    relnotes_cache::observability::init_tracing();

    let (config_path, source) = resolve_config_path();

    let cfg = match load_config(Some(&config_path)) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            std::process::exit(2);
        }
    };

    tracing::info!(
        path = %config_path,
        source = %source,
        "Configuration loaded"
    );

    relnotes_cache::observability::apply_logging_level(&cfg.logging.level);

    let cache = create_cache_manager(&cfg);
    let remote_state = cache.ensure_remote().await;
    tracing::info!(
        distributed = %remote_state,
        local_max_entries = cfg.cache.local_max_entries,
        default_ttl_secs = cfg.cache.default_ttl_secs,
        "Cache ready"
    );

    let janitor = if cfg.janitor.enabled {
        Some(CacheJanitor::start(cache.clone(), cfg.janitor.interval()))
    } else {
        tracing::info!(
            sweep_ratio = cfg.cache.opportunistic_sweep_ratio,
            "Cache janitor disabled, relying on opportunistic sweeps"
        );
        None
    };

    shutdown_signal().await;

    if let Some(janitor) = janitor {
        janitor.shutdown().await;
    }

    let stats = cache.stats();
    tracing::info!(l1_entries = stats.size, "Cache shut down");
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}

/// Resolve the configuration file path.
///
/// Priority order:
/// 1. CLI argument: --config <path>
/// 2. Environment variable: RELNOTES_CONFIG
/// 3. Default: relnotes.toml
fn resolve_config_path() -> (String, ConfigSource) {
    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--config" {
            if let Some(path) = args.next() {
                return (path, ConfigSource::CliArgument);
            }
        }
    }

    if let Ok(path) = env::var("RELNOTES_CONFIG") {
        if !path.is_empty() {
            return (path, ConfigSource::EnvironmentVariable);
        }
    }

    ("relnotes.toml".to_string(), ConfigSource::Default)
}
