//! Distributed (L2) store adapter.
//!
//! The adapter wraps an optional remote client behind a fail-open contract:
//! connection problems, command errors and timeouts are logged and turned
//! into misses or no-ops. Nothing in here returns an error to the caller.
//!
//! ## Lifecycle
//!
//! ```text
//! Uninitialized → Initializing → Ready
//!                      ↓           ↓ (error event)
//!                  Unavailable ←───┘
//! ```
//!
//! The connection attempt happens at most once per adapter. Concurrent early
//! callers all await the same attempt.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::OnceCell;

use crate::error::RemoteError;
use crate::metrics;

/// Default bound for a single remote operation.
pub const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_millis(5000);

/// Callback invoked by a remote client when it observes a connection-level
/// failure after construction.
pub type ErrorCallback = Arc<dyn Fn(&RemoteError) + Send + Sync>;

/// Capability set the adapter needs from a remote key-value client.
///
/// Any client satisfying this trait can back the distributed tier.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, RemoteError>;

    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration)
    -> Result<(), RemoteError>;

    async fn delete(&self, keys: &[String]) -> Result<(), RemoteError>;

    /// List keys matching a glob where `*` is the only wildcard.
    async fn keys_matching(&self, pattern: &str) -> Result<Vec<String>, RemoteError>;

    /// Register a listener for asynchronous connection errors.
    fn on_error(&self, callback: ErrorCallback);
}

/// Factory for the remote client, injected so tests can supply fakes.
#[async_trait]
pub trait RemoteConnector: Send + Sync {
    async fn connect(&self) -> Result<Arc<dyn RemoteStore>, RemoteError>;
}

/// Initialization state of the distributed tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteState {
    Uninitialized,
    Initializing,
    Ready,
    Unavailable,
}

impl RemoteState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Uninitialized,
            1 => Self::Initializing,
            2 => Self::Ready,
            _ => Self::Unavailable,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            Self::Uninitialized => 0,
            Self::Initializing => 1,
            Self::Ready => 2,
            Self::Unavailable => 3,
        }
    }
}

impl std::fmt::Display for RemoteState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Uninitialized => "uninitialized",
            Self::Initializing => "initializing",
            Self::Ready => "ready",
            Self::Unavailable => "unavailable",
        };
        f.write_str(s)
    }
}

/// Fail-open adapter over an optional [`RemoteStore`].
pub struct RemoteCache {
    connector: Option<Arc<dyn RemoteConnector>>,
    client: OnceCell<Option<Arc<dyn RemoteStore>>>,
    state: Arc<AtomicU8>,
    op_timeout: Duration,
}

impl RemoteCache {
    /// Create an adapter that connects through `connector` on first use.
    pub fn new(connector: Arc<dyn RemoteConnector>, op_timeout: Duration) -> Self {
        Self {
            connector: Some(connector),
            client: OnceCell::new(),
            state: Arc::new(AtomicU8::new(RemoteState::Uninitialized.as_u8())),
            op_timeout,
        }
    }

    /// Create an adapter with no remote endpoint configured.
    pub fn disabled() -> Self {
        Self {
            connector: None,
            client: OnceCell::new(),
            state: Arc::new(AtomicU8::new(RemoteState::Uninitialized.as_u8())),
            op_timeout: DEFAULT_OPERATION_TIMEOUT,
        }
    }

    pub fn state(&self) -> RemoteState {
        RemoteState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Run the one-time connection attempt, or wait for the one in flight.
    pub async fn ensure_initialized(&self) -> RemoteState {
        self.client.get_or_init(|| self.connect()).await;
        self.state()
    }

    async fn connect(&self) -> Option<Arc<dyn RemoteStore>> {
        let Some(connector) = self.connector.as_ref() else {
            tracing::debug!("no distributed cache configured, using local cache only");
            self.set_state(RemoteState::Unavailable);
            return None;
        };

        self.set_state(RemoteState::Initializing);

        let attempt = tokio::time::timeout(self.op_timeout, connector.connect()).await;
        let client = match attempt {
            Ok(Ok(client)) => client,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Failed to connect to distributed cache. Falling back to local cache.");
                self.set_state(RemoteState::Unavailable);
                return None;
            }
            Err(_) => {
                tracing::warn!(
                    timeout_ms = self.op_timeout.as_millis() as u64,
                    "Timed out connecting to distributed cache. Falling back to local cache."
                );
                self.set_state(RemoteState::Unavailable);
                return None;
            }
        };

        let state = Arc::clone(&self.state);
        client.on_error(Arc::new(move |e: &RemoteError| {
            let previous = state.swap(RemoteState::Unavailable.as_u8(), Ordering::AcqRel);
            if previous != RemoteState::Unavailable.as_u8() {
                tracing::error!(error = %e, "Distributed cache error, disabling distributed tier");
            }
        }));

        // An error event may already have fired during registration
        if self
            .state
            .compare_exchange(
                RemoteState::Initializing.as_u8(),
                RemoteState::Ready.as_u8(),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
        {
            tracing::info!("✓ Connected to distributed cache");
        }

        Some(client)
    }

    fn set_state(&self, state: RemoteState) {
        self.state.store(state.as_u8(), Ordering::Release);
    }

    /// Client handle if the tier is usable, after awaiting initialization.
    async fn active(&self) -> Option<&Arc<dyn RemoteStore>> {
        let client = self.client.get_or_init(|| self.connect()).await.as_ref()?;
        (self.state() == RemoteState::Ready).then_some(client)
    }

    /// Await `fut` under the operation timeout, logging and discarding errors.
    async fn bounded<T, F>(&self, op: &'static str, key: &str, fut: F) -> Option<T>
    where
        F: Future<Output = Result<T, RemoteError>>,
    {
        let result = match tokio::time::timeout(self.op_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(RemoteError::Timeout(self.op_timeout.as_millis() as u64)),
        };

        match result {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(op, key = %key, error = %e, "distributed cache error");
                metrics::record_remote_error(op);
                None
            }
        }
    }

    pub async fn get(&self, key: &str) -> Option<String> {
        let client = self.active().await?;
        self.bounded("get", key, client.get(key)).await.flatten()
    }

    pub async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) {
        if let Some(client) = self.active().await {
            if self
                .bounded("set", key, client.set_with_ttl(key, value, ttl))
                .await
                .is_some()
            {
                tracing::debug!(key = %key, ttl_secs = ttl.as_secs(), "cache set (L2)");
            }
        }
    }

    pub async fn delete(&self, key: &str) {
        if let Some(client) = self.active().await {
            let keys = [key.to_string()];
            self.bounded("delete", key, client.delete(&keys)).await;
        }
    }

    /// Delete every remote key matching `pattern` with one batched call.
    ///
    /// Returns the number of keys sent for deletion.
    pub async fn delete_keys_matching(&self, pattern: &str) -> usize {
        let Some(client) = self.active().await else {
            return 0;
        };

        let Some(keys) = self
            .bounded("keys", pattern, client.keys_matching(pattern))
            .await
        else {
            return 0;
        };

        if keys.is_empty() {
            return 0;
        }

        match self.bounded("delete", pattern, client.delete(&keys)).await {
            Some(()) => {
                tracing::debug!(pattern = %pattern, count = keys.len(), "pattern invalidated (L2)");
                keys.len()
            }
            None => 0,
        }
    }
}
