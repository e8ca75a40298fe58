//! Adapter selection and store construction.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info};

#[cfg(feature = "redis")]
use flaggr_redis::RedisConfig;

use crate::error::{FlagError, FlagResult};
use crate::flag::Feature;
use crate::store::{FeatureStore, MemoryStore};

/// Name of the adapter used when none is configured.
pub const DEFAULT_ADAPTER: &str = "memory";

/// Storage adapter kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdapterKind {
    /// In-process store
    Memory,
    /// Shared Redis store
    Redis,
}

impl AdapterKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Redis => "redis",
        }
    }
}

impl fmt::Display for AdapterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AdapterKind {
    type Err = FlagError;

    fn from_str(name: &str) -> FlagResult<Self> {
        match name {
            "memory" => Ok(Self::Memory),
            "redis" => Ok(Self::Redis),
            other => Err(FlagError::config(format!("Could not find adapter {}", other))),
        }
    }
}

/// Flaggr configuration.
///
/// # Examples
///
/// ```
/// use flaggr_features::{AdapterKind, FlaggrConfig};
///
/// let config: FlaggrConfig = serde_json::from_str(r#"{"adapter": "memory"}"#).unwrap();
/// assert_eq!(config.adapter_kind().unwrap(), AdapterKind::Memory);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FlaggrConfig {
    /// Adapter name (`"memory"` or `"redis"`)
    pub adapter: String,

    /// Redis connection, required by the redis adapter
    #[cfg(feature = "redis")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redis: Option<RedisConfig>,

    /// Features the memory adapter starts with
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub features: Vec<Feature>,
}

impl Default for FlaggrConfig {
    fn default() -> Self {
        Self {
            adapter: DEFAULT_ADAPTER.to_string(),
            #[cfg(feature = "redis")]
            redis: None,
            features: Vec::new(),
        }
    }
}

impl FlaggrConfig {
    /// Configuration for an empty memory store.
    pub fn memory() -> Self {
        Self::default()
    }

    /// Configuration for a Redis store.
    #[cfg(feature = "redis")]
    pub fn redis(config: RedisConfig) -> Self {
        Self {
            adapter: AdapterKind::Redis.to_string(),
            redis: Some(config),
            features: Vec::new(),
        }
    }

    /// Seed the memory adapter.
    pub fn with_features(mut self, features: impl IntoIterator<Item = Feature>) -> Self {
        self.features.extend(features);
        self
    }

    /// Load configuration from environment variables.
    ///
    /// `FLAGGR_ADAPTER` picks the adapter. For the redis adapter the
    /// connection is read with [`RedisConfig::from_env`].
    pub fn from_env() -> FlagResult<Self> {
        let adapter = std::env::var("FLAGGR_ADAPTER").unwrap_or_else(|_| DEFAULT_ADAPTER.to_string());

        #[cfg(feature = "redis")]
        let redis = if adapter == AdapterKind::Redis.as_str() {
            Some(RedisConfig::from_env()?.build())
        } else {
            None
        };

        Ok(Self {
            adapter,
            #[cfg(feature = "redis")]
            redis,
            features: Vec::new(),
        })
    }

    /// Resolve the configured adapter name.
    pub fn adapter_kind(&self) -> FlagResult<AdapterKind> {
        self.adapter.parse()
    }
}

/// Build the store named by `config`.
///
/// # Errors
///
/// - `Configuration("Could not find adapter <name>")` for an unknown adapter
/// - `Configuration("Config not provided")` for the redis adapter without a
///   redis configuration
/// - a store error if Redis cannot be reached
pub async fn connect_store(config: &FlaggrConfig) -> FlagResult<Arc<dyn FeatureStore>> {
    let kind = config.adapter_kind()?;
    debug!(adapter = %kind, "Resolving feature store");

    let store: Arc<dyn FeatureStore> = match kind {
        AdapterKind::Memory => Arc::new(MemoryStore::with_features(config.features.iter().cloned())),
        AdapterKind::Redis => connect_redis(config).await?,
    };

    info!(adapter = store.store_type(), "Feature store ready");
    Ok(store)
}

#[cfg(feature = "redis")]
async fn connect_redis(config: &FlaggrConfig) -> FlagResult<Arc<dyn FeatureStore>> {
    let redis = config
        .redis
        .clone()
        .ok_or_else(|| FlagError::config("Config not provided"))?;

    Ok(Arc::new(crate::store::RedisStore::connect(redis).await?))
}

#[cfg(not(feature = "redis"))]
async fn connect_redis(_config: &FlaggrConfig) -> FlagResult<Arc<dyn FeatureStore>> {
    Err(FlagError::config(
        "The redis adapter requires the `redis` feature",
    ))
}
