//! In-memory feature store
//!
//! Every write takes the lock for its whole read-modify-write, so
//! concurrent callers are serialized. Evaluations copy what they need out of
//! the lock before consulting the member. Suitable for single-instance
//! deployments or testing. For shared state, use the Redis store.

use crate::error::{FlagError, FlagResult};
use crate::flag::{Feature, Gate, GroupGate, UserGate, evaluate_group, evaluate_user};
use crate::keys::{is_group_key, is_user_key};
use crate::member::GroupMember;
use crate::store::FeatureStore;
use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, trace};

type Features = BTreeMap<String, Feature>;

/// In-memory feature store
pub struct MemoryStore {
    /// `None` once disconnected
    features: RwLock<Option<Features>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        debug!("Creating new in-memory feature store");
        Self {
            features: RwLock::new(Some(BTreeMap::new())),
        }
    }

    /// Create a store seeded with features
    ///
    /// A later feature with the same name replaces an earlier one.
    pub fn with_features(features: impl IntoIterator<Item = Feature>) -> Self {
        let features: Features = features
            .into_iter()
            .map(|feature| (feature.name.clone(), feature))
            .collect();
        debug!(count = features.len(), "Creating seeded in-memory feature store");
        Self {
            features: RwLock::new(Some(features)),
        }
    }

    /// Number of stored features (for monitoring)
    pub fn len(&self) -> usize {
        self.features.read().as_ref().map_or(0, BTreeMap::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read<T>(&self, f: impl FnOnce(&Features) -> T) -> FlagResult<T> {
        let guard = self.features.read();
        let features = guard.as_ref().ok_or(FlagError::Disconnected)?;
        Ok(f(features))
    }

    fn write<T>(&self, f: impl FnOnce(&mut Features) -> T) -> FlagResult<T> {
        let mut guard = self.features.write();
        let features = guard.as_mut().ok_or(FlagError::Disconnected)?;
        Ok(f(features))
    }

    fn set_enabled(&self, name: &str, enabled: bool) -> FlagResult<()> {
        let found = self.write(|features| {
            features
                .get_mut(name)
                .map(|feature| feature.enabled = enabled)
                .is_some()
        })?;
        debug!(feature = %name, enabled = enabled, found = found, "Set global switch");
        Ok(())
    }

    fn set_gate_enabled(&self, feature: &str, key: &str, group: bool, enabled: bool) -> FlagResult<bool> {
        let key_matches = if group { is_group_key(key) } else { is_user_key(key) };
        if !key_matches {
            trace!(feature = %feature, key = %key, "Gate key does not match gate kind");
            return Ok(false);
        }

        let found = self.write(|features| {
            let Some(gate) = features.get_mut(feature).and_then(|f| f.gates.get_mut(key)) else {
                return false;
            };
            // A user gate is never toggled through a group call, and vice versa
            let kind_matches = matches!(gate, Gate::Group(_)) == group;
            if kind_matches {
                gate.set_enabled(enabled);
            }
            kind_matches
        })?;
        debug!(feature = %feature, key = %key, enabled = enabled, found = found, "Set gate");
        Ok(found)
    }

    fn insert_gate(&self, feature: &str, key: &str, gate: Gate) -> FlagResult<()> {
        self.write(|features| {
            features
                .entry(feature.to_string())
                .or_insert_with(|| Feature::new(feature))
                .gates
                .insert(key.to_string(), gate);
        })
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FeatureStore for MemoryStore {
    async fn list_features(&self) -> FlagResult<Vec<String>> {
        self.read(|features| features.keys().cloned().collect())
    }

    async fn add_feature(&self, name: &str) -> FlagResult<()> {
        let created = self.write(|features| {
            if features.contains_key(name) {
                return false;
            }
            features.insert(name.to_string(), Feature::new(name));
            true
        })?;
        debug!(feature = %name, created = created, "Add feature");
        Ok(())
    }

    async fn remove_feature(&self, name: &str) -> FlagResult<()> {
        let removed = self.write(|features| features.remove(name).is_some())?;
        debug!(feature = %name, removed = removed, "Remove feature");
        Ok(())
    }

    async fn get_feature(&self, name: &str) -> FlagResult<Option<Feature>> {
        self.read(|features| features.get(name).cloned())
    }

    async fn enable_feature(&self, name: &str) -> FlagResult<()> {
        self.set_enabled(name, true)
    }

    async fn disable_feature(&self, name: &str) -> FlagResult<()> {
        self.set_enabled(name, false)
    }

    async fn is_enabled_globally(&self, name: &str) -> FlagResult<bool> {
        let enabled = self.read(|features| features.get(name).is_some_and(|f| f.enabled))?;
        trace!(feature = %name, enabled = enabled, "Global check");
        Ok(enabled)
    }

    async fn register_group_gate(
        &self,
        feature: &str,
        group_key: &str,
        match_property: &str,
        match_value: Value,
    ) -> FlagResult<()> {
        let gate = Gate::Group(GroupGate::new(match_property, match_value));
        self.insert_gate(feature, group_key, gate)?;
        debug!(feature = %feature, group = %group_key, property = %match_property, "Register group gate");
        Ok(())
    }

    async fn enable_group_gate(&self, feature: &str, group_key: &str) -> FlagResult<bool> {
        self.set_gate_enabled(feature, group_key, true, true)
    }

    async fn disable_group_gate(&self, feature: &str, group_key: &str) -> FlagResult<bool> {
        self.set_gate_enabled(feature, group_key, true, false)
    }

    async fn is_enabled_for_group(
        &self,
        feature: &str,
        group_key: &str,
        member: &dyn GroupMember,
    ) -> FlagResult<bool> {
        if !is_group_key(group_key) {
            return Ok(false);
        }

        // Member accessors are caller code and run without the lock held
        let (feature_enabled, gate) = self.read(|features| {
            let record = features.get(feature);
            (
                record.map(|f| f.enabled),
                record.and_then(|f| f.group(group_key)).cloned(),
            )
        })?;
        let enabled = evaluate_group(feature_enabled, gate.as_ref(), member);
        trace!(feature = %feature, group = %group_key, enabled = enabled, "Group check");
        Ok(enabled)
    }

    async fn register_user_gate(&self, feature: &str, user_key: &str) -> FlagResult<bool> {
        self.insert_gate(feature, user_key, Gate::User(UserGate::new()))?;
        debug!(feature = %feature, user = %user_key, "Register user gate");
        Ok(true)
    }

    async fn enable_user_gate(&self, feature: &str, user_key: &str) -> FlagResult<bool> {
        self.set_gate_enabled(feature, user_key, false, true)
    }

    async fn disable_user_gate(&self, feature: &str, user_key: &str) -> FlagResult<bool> {
        self.set_gate_enabled(feature, user_key, false, false)
    }

    async fn is_enabled_for_user(&self, feature: &str, user_key: &str) -> FlagResult<bool> {
        if !is_user_key(user_key) {
            return Ok(false);
        }

        let enabled = self.read(|features| {
            let record = features.get(feature);
            evaluate_user(record.map(|f| f.enabled), record.and_then(|f| f.user(user_key)))
        })?;
        trace!(feature = %feature, user = %user_key, enabled = enabled, "User check");
        Ok(enabled)
    }

    async fn disconnect(&self) -> FlagResult<()> {
        if self.features.write().take().is_some() {
            debug!("In-memory feature store disconnected");
        }
        Ok(())
    }

    fn store_type(&self) -> &'static str {
        "memory"
    }
}
