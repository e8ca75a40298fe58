//! The `Flaggr` facade.
//!
//! Validates arguments, derives storage keys from group names and identity
//! ids, and delegates to the configured [`FeatureStore`].

use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::trace;

use crate::config::{FlaggrConfig, connect_store};
use crate::error::{FlagError, FlagResult};
use crate::flag::Feature;
use crate::keys::{group_key, user_key};
use crate::member::{GroupMember, Identity};
use crate::store::{FeatureStore, MemoryStore};

/// Options for [`Flaggr::is_enabled_with`].
///
/// A group check takes precedence over a user check; with neither, the
/// global switch is returned.
#[derive(Default, Clone, Copy)]
pub struct EvaluationOptions<'a> {
    /// Group name to check
    pub group: Option<&'a str>,
    /// Member tested against the group
    pub group_member: Option<&'a dyn GroupMember>,
    /// Identity to check
    pub user: Option<&'a dyn Identity>,
}

impl<'a> EvaluationOptions<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check `member` against the named group.
    pub fn group(mut self, group: &'a str, member: &'a dyn GroupMember) -> Self {
        self.group = Some(group);
        self.group_member = Some(member);
        self
    }

    /// Check a user gate.
    pub fn user(mut self, user: &'a dyn Identity) -> Self {
        self.user = Some(user);
        self
    }
}

impl fmt::Debug for EvaluationOptions<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EvaluationOptions")
            .field("group", &self.group)
            .field("group_member", &self.group_member.is_some())
            .field("user", &self.user.and_then(|user| user.identity_id()))
            .finish()
    }
}

/// Feature flag client.
///
/// Cheap to clone; clones share the same store.
///
/// # Examples
///
/// ```
/// use flaggr_features::{Flaggr, User};
///
/// # tokio_test::block_on(async {
/// let flaggr = Flaggr::in_memory();
///
/// flaggr.add("uploader").await?;
/// flaggr.register_user("uploader", &User::new("1")).await?;
///
/// assert!(flaggr.is_enabled_for_user("uploader", &User::new("1")).await?);
/// assert!(!flaggr.is_enabled_for_user("uploader", &User::new("2")).await?);
/// # Ok::<(), flaggr_features::FlagError>(())
/// # }).unwrap();
/// ```
#[derive(Clone)]
pub struct Flaggr {
    store: Arc<dyn FeatureStore>,
}

impl Flaggr {
    /// Wrap an existing store.
    pub fn new(store: Arc<dyn FeatureStore>) -> Self {
        Self { store }
    }

    /// Client over an empty memory store.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    /// Build the configured store and return a ready client.
    ///
    /// # Errors
    ///
    /// Fails with a configuration error for an unknown adapter or a missing
    /// redis configuration, or with a store error if Redis is unreachable.
    pub async fn connect(config: FlaggrConfig) -> FlagResult<Self> {
        Ok(Self::new(connect_store(&config).await?))
    }

    /// Name of the storage adapter in use.
    pub fn adapter_name(&self) -> &'static str {
        self.store.store_type()
    }

    /// The underlying store.
    pub fn store(&self) -> &Arc<dyn FeatureStore> {
        &self.store
    }

    /// Names of all features, sorted.
    pub async fn features(&self) -> FlagResult<Vec<String>> {
        self.store.list_features().await
    }

    /// Add a feature, enabled. Re-adding an existing feature changes nothing.
    pub async fn add(&self, feature: &str) -> FlagResult<()> {
        require("feature", feature)?;
        self.store.add_feature(feature).await
    }

    /// Remove a feature and its gates.
    pub async fn remove(&self, feature: &str) -> FlagResult<()> {
        require("feature", feature)?;
        self.store.remove_feature(feature).await
    }

    /// Get a feature and its gates.
    pub async fn get(&self, feature: &str) -> FlagResult<Option<Feature>> {
        require("feature", feature)?;
        self.store.get_feature(feature).await
    }

    /// Global switch of a feature; `false` if it does not exist.
    pub async fn is_enabled(&self, feature: &str) -> FlagResult<bool> {
        require("feature", feature)?;
        self.store.is_enabled_globally(feature).await
    }

    /// Evaluate a feature with optional group or user context.
    pub async fn is_enabled_with(
        &self,
        feature: &str,
        options: &EvaluationOptions<'_>,
    ) -> FlagResult<bool> {
        require("feature", feature)?;
        trace!(feature = %feature, options = ?options, "Evaluating feature");

        if let Some(group) = options.group {
            let member = options
                .group_member
                .ok_or(FlagError::MissingArgument("group_member"))?;
            return self.is_enabled_for_group(feature, group, member).await;
        }

        if let Some(user) = options.user {
            return self.is_enabled_for_user(feature, user).await;
        }

        self.store.is_enabled_globally(feature).await
    }

    /// Turn a feature on globally. No-op if it does not exist.
    pub async fn enable(&self, feature: &str) -> FlagResult<()> {
        require("feature", feature)?;
        self.store.enable_feature(feature).await
    }

    /// Turn a feature off globally. No-op if it does not exist.
    pub async fn disable(&self, feature: &str) -> FlagResult<()> {
        require("feature", feature)?;
        self.store.disable_feature(feature).await
    }

    /// Register a group: members whose `property` equals `value`.
    ///
    /// Creates the feature if needed and replaces an existing gate of the
    /// same name.
    pub async fn register_group(
        &self,
        feature: &str,
        group: &str,
        property: &str,
        value: impl Into<Value>,
    ) -> FlagResult<()> {
        require("feature", feature)?;
        require("group", group)?;
        require("property", property)?;
        self.store
            .register_group_gate(feature, &group_key(group), property, value.into())
            .await
    }

    /// Enable a group. Returns whether the group was registered.
    pub async fn enable_group(&self, feature: &str, group: &str) -> FlagResult<bool> {
        require("feature", feature)?;
        require("group", group)?;
        self.store.enable_group_gate(feature, &group_key(group)).await
    }

    /// Disable a group. Returns whether the group was registered.
    pub async fn disable_group(&self, feature: &str, group: &str) -> FlagResult<bool> {
        require("feature", feature)?;
        require("group", group)?;
        self.store.disable_group_gate(feature, &group_key(group)).await
    }

    /// Whether the feature is on for `member` through the named group.
    pub async fn is_enabled_for_group(
        &self,
        feature: &str,
        group: &str,
        member: &dyn GroupMember,
    ) -> FlagResult<bool> {
        require("feature", feature)?;
        require("group", group)?;
        self.store
            .is_enabled_for_group(feature, &group_key(group), member)
            .await
    }

    /// Register a user. Creates the feature if needed.
    pub async fn register_user(&self, feature: &str, user: &dyn Identity) -> FlagResult<bool> {
        require("feature", feature)?;
        let key = identity_key(user)?;
        self.store.register_user_gate(feature, &key).await
    }

    /// Enable a user. Returns whether the user was registered.
    pub async fn enable_user(&self, feature: &str, user: &dyn Identity) -> FlagResult<bool> {
        require("feature", feature)?;
        let key = identity_key(user)?;
        self.store.enable_user_gate(feature, &key).await
    }

    /// Disable a user. Returns whether the user was registered.
    pub async fn disable_user(&self, feature: &str, user: &dyn Identity) -> FlagResult<bool> {
        require("feature", feature)?;
        let key = identity_key(user)?;
        self.store.disable_user_gate(feature, &key).await
    }

    /// Whether the feature is on for `user`.
    pub async fn is_enabled_for_user(&self, feature: &str, user: &dyn Identity) -> FlagResult<bool> {
        require("feature", feature)?;
        let key = identity_key(user)?;
        self.store.is_enabled_for_user(feature, &key).await
    }

    /// Release the store. Safe to call more than once.
    pub async fn disconnect(&self) -> FlagResult<()> {
        self.store.disconnect().await
    }
}

impl fmt::Debug for Flaggr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Flaggr")
            .field("adapter", &self.adapter_name())
            .finish()
    }
}

fn require(name: &'static str, value: &str) -> FlagResult<()> {
    if value.is_empty() {
        return Err(FlagError::MissingArgument(name));
    }
    Ok(())
}

fn identity_key(user: &dyn Identity) -> FlagResult<String> {
    user.identity_id()
        .map(user_key)
        .ok_or_else(|| FlagError::InvalidIdentity("User passed has no id property".to_string()))
}
