//! Error types for flag operations.

use thiserror::Error;

/// Result type for flag operations.
pub type FlagResult<T> = Result<T, FlagError>;

/// Flag errors.
///
/// Every error except [`FlagError::Configuration`] is scoped to the call that
/// produced it; the store stays usable. A failed evaluation means the state is
/// unknown, not that the feature is off.
#[derive(Debug, Error)]
pub enum FlagError {
    /// Unknown adapter name or missing store configuration
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A required argument was empty or absent
    #[error("Missing argument: {0}")]
    MissingArgument(&'static str),

    /// The identity has no usable `id`
    #[error("Invalid identity: {0}")]
    InvalidIdentity(String),

    /// Backing store fault (unreachable, command rejected)
    #[cfg(feature = "redis")]
    #[error("Store error: {0}")]
    Store(flaggr_redis::RedisError),

    /// Stored data could not be decoded or encoded
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A gate kept changing underneath a toggle
    #[error("Write conflict: {0}")]
    Conflict(String),

    /// The store was disconnected
    #[error("Store has been disconnected")]
    Disconnected,
}

impl FlagError {
    /// Create a configuration error.
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Configuration(msg.into())
    }

    /// Whether this error came from the backing store rather than the caller.
    pub fn is_storage_fault(&self) -> bool {
        match self {
            #[cfg(feature = "redis")]
            Self::Store(_) => true,
            Self::Serialization(_) | Self::Conflict(_) => true,
            _ => false,
        }
    }

    /// Whether the call was rejected because of its arguments.
    pub fn is_argument_error(&self) -> bool {
        matches!(self, Self::MissingArgument(_) | Self::InvalidIdentity(_))
    }
}

#[cfg(feature = "redis")]
impl From<flaggr_redis::RedisError> for FlagError {
    fn from(err: flaggr_redis::RedisError) -> Self {
        match err {
            flaggr_redis::RedisError::Closed => Self::Disconnected,
            other => Self::Store(other),
        }
    }
}

#[cfg(feature = "redis")]
impl From<redis::RedisError> for FlagError {
    fn from(err: redis::RedisError) -> Self {
        Self::Store(flaggr_redis::RedisError::Redis(err))
    }
}

impl From<serde_json::Error> for FlagError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
