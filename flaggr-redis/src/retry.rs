//! Reconnect policy for the Redis connection.

use redis::aio::ConnectionManagerConfig;
use std::time::Duration;

/// Bounded exponential backoff used while (re)establishing a connection.
///
/// The delay doubles after every failed attempt but never exceeds
/// `max_delay`, and at most `max_attempts` connects are tried before the
/// error is handed back to the caller. The connection manager applies the
/// policy both to the first connect and to every later reconnect.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectPolicy {
    /// Maximum number of connection attempts (at least one is always made).
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub initial_delay: Duration,
    /// Ceiling for any single delay.
    pub max_delay: Duration,
    /// Growth factor between attempts.
    pub multiplier: f32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            multiplier: 2.0,
        }
    }
}

impl ReconnectPolicy {
    /// Create a policy with the given attempt budget and delay ceiling.
    pub fn new(max_attempts: u32, max_delay: Duration) -> Self {
        Self {
            max_attempts,
            max_delay,
            ..Default::default()
        }
    }

    /// Set the first delay.
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Retries allowed after the first attempt.
    pub fn retries(&self) -> usize {
        self.max_attempts.max(1) as usize - 1
    }

    /// Connection manager settings carrying this policy.
    pub fn connection_manager_config(&self) -> ConnectionManagerConfig {
        ConnectionManagerConfig::new()
            .set_min_delay(self.initial_delay)
            .set_max_delay(self.max_delay)
            .set_exponent_base(self.multiplier)
            .set_number_of_retries(self.retries())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retries() {
        assert_eq!(ReconnectPolicy::new(3, Duration::from_secs(1)).retries(), 2);
        assert_eq!(ReconnectPolicy::new(1, Duration::from_secs(1)).retries(), 0);

        // A zero budget still allows the first attempt only
        assert_eq!(ReconnectPolicy::new(0, Duration::from_secs(1)).retries(), 0);
    }

    #[test]
    fn test_connection_manager_config() {
        let policy = ReconnectPolicy::new(4, Duration::from_secs(10))
            .with_initial_delay(Duration::from_millis(250));

        let manager = policy.connection_manager_config();
        assert_eq!(manager.min_delay(), Duration::from_millis(250));
        assert_eq!(manager.max_delay(), Some(Duration::from_secs(10)));
        assert_eq!(manager.exponent_base(), 2.0);
        assert_eq!(manager.number_of_retries(), 3);
    }
}
