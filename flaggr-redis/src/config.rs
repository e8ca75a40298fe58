//! Redis configuration.
//!
//! A configuration can be given either as a connection string
//! (`redis://host[:port][/db][?db=N]`, `rediss://` for TLS) or as a
//! structured object. Both deserialize into [`RedisConfig`].

use redis::aio::ConnectionManagerConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;
use url::Url;

use crate::{ReconnectPolicy, RedisError, Result};

/// Default Redis host.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default Redis port.
pub const DEFAULT_PORT: u16 = 6379;

/// Default ceiling for the reconnect back-off.
pub const DEFAULT_RETRY_MAX_DELAY: Duration = Duration::from_millis(10_000);

/// Redis configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RedisConfigRepr")]
pub struct RedisConfig {
    /// Host name or address.
    pub host: String,
    /// Port.
    pub port: u16,
    /// Database number.
    pub db: u32,
    /// Username for Redis 6+ ACL.
    pub username: Option<String>,
    /// Password.
    pub password: Option<String>,
    /// Use TLS (`rediss://`).
    pub tls: bool,
    /// Client options.
    pub options: RedisOptions,
}

/// Client options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RedisOptions {
    /// Ceiling for the delay between reconnect attempts (milliseconds).
    #[serde(with = "duration_millis")]
    pub retry_max_delay: Duration,
    /// Delay before the first reconnect attempt (milliseconds).
    #[serde(with = "duration_millis")]
    pub retry_initial_delay: Duration,
    /// Maximum number of attempts when establishing the connection.
    pub max_connect_attempts: u32,
    /// Timeout for a single connection attempt (milliseconds).
    #[serde(with = "duration_millis")]
    pub connection_timeout: Duration,
}

impl Default for RedisOptions {
    fn default() -> Self {
        Self {
            retry_max_delay: DEFAULT_RETRY_MAX_DELAY,
            retry_initial_delay: Duration::from_millis(100),
            max_connect_attempts: 5,
            connection_timeout: Duration::from_secs(5),
        }
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            db: 0,
            username: None,
            password: None,
            tls: false,
            options: RedisOptions::default(),
        }
    }
}

impl RedisConfig {
    /// Parse a connection string.
    ///
    /// ```
    /// use flaggr_redis::RedisConfig;
    ///
    /// let config = RedisConfig::from_url("redis://localhost?db=1").unwrap();
    /// assert_eq!(config.host, "localhost");
    /// assert_eq!(config.port, 6379);
    /// assert_eq!(config.db, 1);
    /// ```
    pub fn from_url(connection_string: &str) -> Result<Self> {
        let url = Url::parse(connection_string)
            .map_err(|e| RedisError::Config(format!("invalid redis url: {}", e)))?;

        let tls = match url.scheme() {
            "redis" => false,
            "rediss" => true,
            other => {
                return Err(RedisError::Config(format!(
                    "unsupported scheme `{}`",
                    other
                )));
            }
        };

        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .unwrap_or(DEFAULT_HOST)
            .to_string();

        let path_db = url
            .path_segments()
            .and_then(|mut segments| segments.next())
            .filter(|s| !s.is_empty());
        let query_db = url
            .query_pairs()
            .find(|(k, _)| k == "db")
            .map(|(_, v)| v.into_owned());

        let db = match query_db.as_deref().or(path_db) {
            Some(raw) => raw.parse().unwrap_or_else(|_| {
                warn!(db = %raw, "Unparseable database in redis url, using 0");
                0
            }),
            None => 0,
        };

        let username = Some(url.username())
            .filter(|u| !u.is_empty())
            .map(str::to_string);
        let password = url.password().map(str::to_string);

        Ok(Self {
            host,
            port: url.port().unwrap_or(DEFAULT_PORT),
            db,
            username,
            password,
            tls,
            options: RedisOptions::default(),
        })
    }

    /// Create a builder.
    pub fn builder() -> RedisConfigBuilder {
        RedisConfigBuilder::new()
    }

    /// Load configuration from environment variables.
    ///
    /// `REDIS_URL` seeds the builder; the individual variables override it.
    pub fn from_env() -> Result<RedisConfigBuilder> {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<RedisConfigBuilder> {
        let mut builder = match var("REDIS_URL") {
            Some(url) => RedisConfigBuilder::from_config(Self::from_url(&url)?),
            None => RedisConfigBuilder::new(),
        };

        if let Some(host) = var("REDIS_HOST") {
            builder = builder.host(host);
        }

        if let Some(port) = var("REDIS_PORT")
            && let Ok(port) = port.parse()
        {
            builder = builder.port(port);
        }

        if let Some(db) = var("REDIS_DB")
            && let Ok(db) = db.parse()
        {
            builder = builder.db(db);
        }

        if let Some(username) = var("REDIS_USERNAME") {
            builder = builder.username(username);
        }

        if let Some(password) = var("REDIS_PASSWORD") {
            builder = builder.password(password);
        }

        if var("REDIS_TLS").is_some() {
            builder = builder.tls(true);
        }

        Ok(builder)
    }

    /// Render the URL handed to the redis client.
    pub fn connection_url(&self) -> Result<String> {
        let scheme = if self.tls { "rediss" } else { "redis" };
        let host = if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]", self.host)
        } else {
            self.host.clone()
        };

        let mut url = Url::parse(&format!("{}://{}:{}/{}", scheme, host, self.port, self.db))
            .map_err(|e| RedisError::Config(format!("invalid redis address: {}", e)))?;

        if let Some(password) = &self.password {
            let username = self.username.as_deref().unwrap_or("");
            url.set_username(username)
                .and_then(|_| url.set_password(Some(password)))
                .map_err(|_| RedisError::Config("cannot attach credentials".to_string()))?;
        } else if let Some(username) = &self.username {
            url.set_username(username)
                .map_err(|_| RedisError::Config("cannot attach credentials".to_string()))?;
        }

        Ok(url.to_string())
    }

    /// Reconnect policy derived from the options.
    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy::new(self.options.max_connect_attempts, self.options.retry_max_delay)
            .with_initial_delay(self.options.retry_initial_delay)
    }

    /// Connection manager settings: the reconnect policy plus the
    /// per-attempt connect timeout. Used for the first connect and for every
    /// reconnect after it.
    pub fn connection_manager_config(&self) -> ConnectionManagerConfig {
        self.reconnect_policy()
            .connection_manager_config()
            .set_connection_timeout(Some(self.options.connection_timeout))
    }
}

impl std::str::FromStr for RedisConfig {
    type Err = RedisError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_url(s)
    }
}

/// Builder for Redis configuration.
#[derive(Default)]
pub struct RedisConfigBuilder {
    config: RedisConfig,
}

impl RedisConfigBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            config: RedisConfig::default(),
        }
    }

    /// Start from an existing configuration.
    pub fn from_config(config: RedisConfig) -> Self {
        Self { config }
    }

    /// Set the host.
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    /// Set the port.
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Set the database number.
    pub fn db(mut self, db: u32) -> Self {
        self.config.db = db;
        self
    }

    /// Set the username (Redis 6+ ACL).
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.config.username = Some(username.into());
        self
    }

    /// Set the password.
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.config.password = Some(password.into());
        self
    }

    /// Enable TLS.
    pub fn tls(mut self, enabled: bool) -> Self {
        self.config.tls = enabled;
        self
    }

    /// Set the reconnect back-off ceiling.
    pub fn retry_max_delay(mut self, delay: Duration) -> Self {
        self.config.options.retry_max_delay = delay;
        self
    }

    /// Set the number of connection attempts.
    pub fn max_connect_attempts(mut self, attempts: u32) -> Self {
        self.config.options.max_connect_attempts = attempts;
        self
    }

    /// Set the timeout for a single connection attempt.
    pub fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.config.options.connection_timeout = timeout;
        self
    }

    /// Build the configuration.
    pub fn build(self) -> RedisConfig {
        self.config
    }
}

/// Wire forms accepted when deserializing a [`RedisConfig`].
#[derive(Deserialize)]
#[serde(untagged)]
enum RedisConfigRepr {
    Url(String),
    Structured(StructuredConfig),
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct StructuredConfig {
    url: Option<String>,
    host: Option<String>,
    port: Option<u16>,
    db: Option<u32>,
    username: Option<String>,
    password: Option<String>,
    tls: bool,
    options: RedisOptions,
}

impl TryFrom<RedisConfigRepr> for RedisConfig {
    type Error = RedisError;

    fn try_from(repr: RedisConfigRepr) -> Result<Self> {
        match repr {
            RedisConfigRepr::Url(url) => Self::from_url(&url),
            RedisConfigRepr::Structured(s) => {
                let mut config = match s.url.as_deref() {
                    Some(url) => Self::from_url(url)?,
                    None => Self::default(),
                };

                if let Some(host) = s.host {
                    config.host = host;
                }
                if let Some(port) = s.port {
                    config.port = port;
                }
                if let Some(db) = s.db {
                    config.db = db;
                }
                if s.username.is_some() {
                    config.username = s.username;
                }
                if s.password.is_some() {
                    config.password = s.password;
                }
                config.tls |= s.tls;
                config.options = s.options;

                Ok(config)
            }
        }
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
