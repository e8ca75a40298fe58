//! Feature storage backends
//!
//! This module provides the storage backends behind [`crate::Flaggr`]:
//!
//! - **Memory**: a locked in-process map (default, single instance)
//! - **Redis**: a shared store for multi-instance deployments
//!
//! Both backends expose the same contract. Gate methods take keys already
//! derived by [`crate::keys`]; the stores never see identity objects.

mod memory;
#[cfg(feature = "redis")]
mod layout;
#[cfg(feature = "redis")]
mod redis;

pub use memory::MemoryStore;
#[cfg(feature = "redis")]
pub use redis::RedisStore;

use crate::error::FlagResult;
use crate::flag::Feature;
use crate::member::GroupMember;
use async_trait::async_trait;
use serde_json::Value;

/// Trait for feature storage backends
#[async_trait]
pub trait FeatureStore: Send + Sync {
    /// Names of all features, sorted.
    async fn list_features(&self) -> FlagResult<Vec<String>>;

    /// Create a feature, enabled. No-op if it already exists.
    async fn add_feature(&self, name: &str) -> FlagResult<()>;

    /// Remove a feature and all of its gates. No-op if absent.
    async fn remove_feature(&self, name: &str) -> FlagResult<()>;

    /// Get a feature, or `None` if it does not exist.
    async fn get_feature(&self, name: &str) -> FlagResult<Option<Feature>>;

    /// Turn the global switch on. No-op if the feature is absent.
    async fn enable_feature(&self, name: &str) -> FlagResult<()>;

    /// Turn the global switch off. No-op if the feature is absent.
    async fn disable_feature(&self, name: &str) -> FlagResult<()>;

    /// Global switch; `false` for unknown features.
    async fn is_enabled_globally(&self, name: &str) -> FlagResult<bool>;

    /// Create or replace a group gate, enabled. Creates the feature if absent.
    async fn register_group_gate(
        &self,
        feature: &str,
        group_key: &str,
        match_property: &str,
        match_value: Value,
    ) -> FlagResult<()>;

    /// Enable a group gate. Returns whether the gate existed.
    async fn enable_group_gate(&self, feature: &str, group_key: &str) -> FlagResult<bool>;

    /// Disable a group gate. Returns whether the gate existed.
    async fn disable_group_gate(&self, feature: &str, group_key: &str) -> FlagResult<bool>;

    /// Evaluate a group gate for `member`.
    async fn is_enabled_for_group(
        &self,
        feature: &str,
        group_key: &str,
        member: &dyn GroupMember,
    ) -> FlagResult<bool>;

    /// Create or replace a user gate, enabled. Creates the feature if absent.
    async fn register_user_gate(&self, feature: &str, user_key: &str) -> FlagResult<bool>;

    /// Enable a user gate. Returns whether the gate existed.
    async fn enable_user_gate(&self, feature: &str, user_key: &str) -> FlagResult<bool>;

    /// Disable a user gate. Returns whether the gate existed.
    async fn disable_user_gate(&self, feature: &str, user_key: &str) -> FlagResult<bool>;

    /// Evaluate a user gate.
    async fn is_enabled_for_user(&self, feature: &str, user_key: &str) -> FlagResult<bool>;

    /// Release the backend. Every later call fails with
    /// [`crate::FlagError::Disconnected`].
    async fn disconnect(&self) -> FlagResult<()>;

    /// Adapter name (`"memory"`, `"redis"`).
    fn store_type(&self) -> &'static str;
}
