//! Cache metrics.
//!
//! Recorded through the `metrics` facade; they are no-ops until the host
//! process installs a recorder.

use metrics::{counter, gauge};

/// Metric names as constants for consistency.
pub mod names {
    pub const CACHE_HITS_TOTAL: &str = "cache_hits_total";
    pub const CACHE_MISSES_TOTAL: &str = "cache_misses_total";
    pub const CACHE_ENTRIES: &str = "cache_entries";
    pub const CACHE_REMOTE_ERRORS_TOTAL: &str = "cache_remote_errors_total";
}

/// Record a cache hit.
pub fn record_cache_hit(tier: &str) {
    counter!(names::CACHE_HITS_TOTAL, "tier" => tier.to_string()).increment(1);
}

/// Record a cache miss.
pub fn record_cache_miss() {
    counter!(names::CACHE_MISSES_TOTAL).increment(1);
}

/// Set the number of cache entries.
pub fn set_cache_entries(tier: &str, count: usize) {
    gauge!(names::CACHE_ENTRIES, "tier" => tier.to_string()).set(count as f64);
}

/// Record a swallowed distributed-tier failure.
pub fn record_remote_error(op: &'static str) {
    counter!(names::CACHE_REMOTE_ERRORS_TOTAL, "op" => op).increment(1);
}
