//! # Flaggr Redis
//!
//! Redis connectivity for the Flaggr remote flag store.
//!
//! ## Features
//!
//! - **Flexible configuration**: connection string or structured object
//! - **Bounded reconnect**: exponential back-off capped at `retry_max_delay`
//!   (10 seconds by default) instead of retrying forever
//! - **Shared connection**: one multiplexed connection manager per service
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use flaggr_redis::{RedisConfig, RedisService};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = RedisConfig::from_url("redis://localhost?db=1")?;
//!     let redis = RedisService::connect(config).await?;
//!
//!     redis.health_check().await?;
//!     let features = redis.smembers("flagger_features").await?;
//!     println!("{:?}", features);
//!
//!     redis.close();
//!     Ok(())
//! }
//! ```

mod config;
mod error;
mod retry;
mod service;

pub use config::{
    DEFAULT_HOST, DEFAULT_PORT, DEFAULT_RETRY_MAX_DELAY, RedisConfig, RedisConfigBuilder,
    RedisOptions,
};
pub use error::{RedisError, Result};
pub use retry::ReconnectPolicy;
pub use service::RedisService;

// Re-export redis crate for convenience
pub use redis;

/// Prelude for common imports.
///
/// ```
/// use flaggr_redis::prelude::*;
/// ```
pub mod prelude {
    pub use crate::config::{RedisConfig, RedisConfigBuilder, RedisOptions};
    pub use crate::error::{RedisError, Result};
    pub use crate::retry::ReconnectPolicy;
    pub use crate::service::RedisService;
}
