//! Redis service shared by the flag stores.

use parking_lot::RwLock;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use std::collections::HashMap;
use tracing::{debug, info, warn};

use crate::{RedisConfig, RedisError, Result};

/// Redis service owning a multiplexed, auto-reconnecting connection.
///
/// The first connect and every later reconnect follow the same bounded
/// exponential backoff and per-attempt timeout (see
/// [`crate::ReconnectPolicy`]). A command issued while the server is
/// unreachable fails with an error instead of waiting.
pub struct RedisService {
    config: RedisConfig,
    connection: RwLock<Option<ConnectionManager>>,
}

impl RedisService {
    /// Connect to Redis.
    ///
    /// Fails once the reconnect policy's attempt budget is spent.
    pub async fn connect(config: RedisConfig) -> Result<Self> {
        let url = config.connection_url()?;
        let client =
            redis::Client::open(url.as_str()).map_err(|e| RedisError::Config(e.to_string()))?;

        let connection = ConnectionManager::new_with_config(client, config.connection_manager_config())
            .await
            .map_err(|e| {
                warn!(
                    host = %config.host,
                    port = config.port,
                    attempts = config.options.max_connect_attempts.max(1),
                    error = %e,
                    "Giving up connecting to Redis"
                );
                if e.is_timeout() {
                    RedisError::Timeout
                } else {
                    RedisError::Connection(e.to_string())
                }
            })?;

        info!(
            host = %config.host,
            port = config.port,
            db = config.db,
            "Redis connection established"
        );

        Ok(Self {
            config,
            connection: RwLock::new(Some(connection)),
        })
    }

    /// Get the configuration.
    pub fn config(&self) -> &RedisConfig {
        &self.config
    }

    /// Get a handle to the shared connection.
    ///
    /// Handles are cheap clones of the same multiplexed connection.
    pub fn connection(&self) -> Result<ConnectionManager> {
        self.connection.read().clone().ok_or(RedisError::Closed)
    }

    /// Release the connection. Returns `false` if it was already closed.
    ///
    /// Handles obtained earlier keep working until dropped; new calls fail
    /// with [`RedisError::Closed`].
    pub fn close(&self) -> bool {
        let was_open = self.connection.write().take().is_some();
        if was_open {
            info!(host = %self.config.host, port = self.config.port, "Redis connection closed");
        }
        was_open
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.connection.read().is_none()
    }

    /// Check if the connection is healthy.
    pub async fn health_check(&self) -> Result<()> {
        let mut conn = self.connection()?;
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| RedisError::Connection(e.to_string()))?;
        Ok(())
    }

    // Convenience methods for common operations

    /// Hash get.
    pub async fn hget(&self, key: &str, field: &str) -> Result<Option<String>> {
        let mut conn = self.connection()?;
        let value: Option<String> = conn.hget(key, field).await?;
        Ok(value)
    }

    /// Hash multi-get; one entry per requested field.
    pub async fn hmget(&self, key: &str, fields: &[&str]) -> Result<Vec<Option<String>>> {
        let mut conn = self.connection()?;
        let values: Vec<Option<String>> = redis::cmd("HMGET")
            .arg(key)
            .arg(fields)
            .query_async(&mut conn)
            .await?;
        Ok(values)
    }

    /// Hash set.
    pub async fn hset(&self, key: &str, field: &str, value: &str) -> Result<()> {
        let mut conn = self.connection()?;
        let _: () = conn.hset(key, field, value).await?;
        debug!(key = %key, field = %field, "HSET");
        Ok(())
    }

    /// Hash get all.
    pub async fn hgetall(&self, key: &str) -> Result<HashMap<String, String>> {
        let mut conn = self.connection()?;
        let value: HashMap<String, String> = conn.hgetall(key).await?;
        Ok(value)
    }

    /// Set members.
    pub async fn smembers(&self, key: &str) -> Result<Vec<String>> {
        let mut conn = self.connection()?;
        let members: Vec<String> = conn.smembers(key).await?;
        Ok(members)
    }

    /// Set is member.
    pub async fn sismember(&self, key: &str, member: &str) -> Result<bool> {
        let mut conn = self.connection()?;
        let is_member: bool = conn.sismember(key, member).await?;
        Ok(is_member)
    }
}
