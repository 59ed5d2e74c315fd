use thiserror::Error;

/// Errors surfaced to cache callers.
///
/// Transport failures of the distributed tier never show up here; they are
/// logged and turned into misses. The only observable failure is a value
/// that the distributed tier returned but that cannot be decoded.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("malformed cached value for key '{key}': {source}")]
    Deserialize {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

impl CacheError {
    /// Create a new Deserialize error
    pub fn deserialize(key: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Deserialize {
            key: key.into(),
            source,
        }
    }
}

/// Failures inside the distributed store adapter.
///
/// These are swallowed at the adapter boundary.
#[derive(Debug, Clone, Error)]
pub enum RemoteError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("command error: {0}")]
    Command(String),

    #[error("operation timed out after {0} ms")]
    Timeout(u64),
}

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config build error: {0}")]
    Build(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}
