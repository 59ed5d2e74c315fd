//! Tracing setup for the cache host.
//!
//! The subscriber is installed once at startup with a provisional level so
//! that configuration loading is itself logged. Once `logging.level` is known
//! it is swapped in through a reload handle. `RUST_LOG`, when set, wins over
//! both.

use std::sync::OnceLock;

use tracing_subscriber::{EnvFilter, Registry, fmt, prelude::*, reload};

type FilterHandle = reload::Handle<EnvFilter, Registry>;

static FILTER_HANDLE: OnceLock<FilterHandle> = OnceLock::new();

/// Level used before the configuration has been read.
const BOOTSTRAP_LEVEL: &str = "info";

pub fn init_tracing() {
    init_tracing_with_level(BOOTSTRAP_LEVEL);
}

/// Install the global subscriber. Later calls are no-ops.
pub fn init_tracing_with_level(level: &str) {
    let (filter, handle) = reload::Layer::new(initial_filter(level));
    if FILTER_HANDLE.set(handle).is_err() {
        return;
    }

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .try_init();
}

/// Switch the active filter to `level`, unless `RUST_LOG` pins it.
pub fn apply_logging_level(level: &str) {
    if rust_log_set() {
        return;
    }
    let Some(handle) = FILTER_HANDLE.get() else {
        return;
    };
    if let Err(e) = handle.modify(|filter| *filter = EnvFilter::new(level)) {
        tracing::warn!(error = %e, level, "failed to apply logging level");
    }
}

fn rust_log_set() -> bool {
    std::env::var_os(EnvFilter::DEFAULT_ENV).is_some()
}

fn initial_filter(level: &str) -> EnvFilter {
    if rust_log_set() {
        if let Ok(filter) = EnvFilter::try_from_default_env() {
            return filter;
        }
    }
    EnvFilter::new(level)
}
