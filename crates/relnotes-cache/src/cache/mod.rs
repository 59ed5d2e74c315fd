//! Two-tier caching system.
//!
//! ## Architecture
//!
//! - **L1 Cache (DashMap)**: In-memory, bounded, per-instance, TTL capped at 5 minutes
//! - **L2 Cache (Redis)**: Network, shared across instances, caller-provided TTL
//!
//! ## Cache Hierarchy
//!
//! ```text
//! GET request → L1 (DashMap) → L2 (Redis) → caller recomputes from source
//!                   ↓                ↓
//!               <1µs latency    ~5ms latency
//! ```
//!
//! ## Graceful Degradation
//!
//! If Redis is unavailable or disabled, the system automatically falls back
//! to L1-only mode. Redis failures are logged, never returned.

pub mod janitor;
pub mod local;
pub mod manager;
pub mod pattern;
pub mod redis_store;
pub mod release_notes;
pub mod remote;

pub use janitor::CacheJanitor;
pub use local::{CacheStats, LocalStore};
pub use manager::{CacheManager, CachePolicy};
pub use redis_store::{RedisConnector, RedisStore};
pub use release_notes::{ReleaseNote, ReleaseNoteCache, release_note_key};
pub use remote::{ErrorCallback, RemoteCache, RemoteConnector, RemoteState, RemoteStore};
