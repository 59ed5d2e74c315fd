//! Background sweep of expired L1 entries.
//!
//! L2 entries expire natively in Redis, so the janitor only touches the
//! in-process tier. Hosts that cannot keep a timer alive (serverless, edge)
//! should disable it and set `cache.opportunistic_sweep_ratio` instead.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::manager::CacheManager;

/// Shortest period the janitor ticks at; `tokio::time::interval` rejects zero.
const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Handle to the running janitor task. Dropping it stops the task.
pub struct CacheJanitor {
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl CacheJanitor {
    /// Spawn the janitor. The first sweep runs one `interval` after start.
    ///
    /// A zero `interval` is raised to one millisecond.
    pub fn start(manager: Arc<CacheManager>, interval: Duration) -> Self {
        let interval = interval.max(MIN_INTERVAL);
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            tracing::info!(interval_secs = interval.as_secs(), "Cache janitor started");

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        let removed = manager.cleanup();
                        if removed > 0 {
                            tracing::debug!(removed, "Cache janitor swept expired entries");
                        }
                    }
                }
            }

            tracing::info!("Cache janitor stopped");
        });

        Self {
            cancel,
            handle: Some(handle),
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stop the task and wait for it to exit.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "Cache janitor task failed");
            }
        }
    }
}

impl Drop for CacheJanitor {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
