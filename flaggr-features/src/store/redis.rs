//! Redis feature store
//!
//! Shares feature state across application instances. Requires the `redis`
//! feature to be enabled.
//!
//! Writes that touch both the feature set and a feature hash run as Lua
//! scripts, so they apply atomically. The global switch and gate toggle
//! scripts only write when the feature is listed, so they never resurrect a
//! removed feature. A gate toggle is a compare-and-set on the stored record:
//! if the record changed since it was read, the toggle is retried.
//!
//! The key prefix decides the gate kind. A group call on a `user-` key, or a
//! user call on a `group-` key, reports the gate as absent.

use async_trait::async_trait;
use flaggr_redis::{RedisConfig, RedisService};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, trace};

use super::layout::{
    decode_enabled, decode_feature, decode_gate, encode_enabled, encode_gate, toggle_gate,
};
use crate::error::{FlagError, FlagResult};
use crate::flag::{Feature, GroupGate, UserGate, evaluate_group, evaluate_user};
use crate::keys::{ENABLED_FIELD, FEATURES_SET_KEY, is_group_key, is_user_key};
use crate::member::GroupMember;
use crate::store::FeatureStore;

// KEYS: features set, feature hash. ARGV[1]: feature name.
const ADD_SCRIPT: &str = r#"
redis.call('SADD', KEYS[1], ARGV[1])
return redis.call('HSETNX', KEYS[2], ARGV[2], ARGV[3])
"#;

const REMOVE_SCRIPT: &str = r#"
redis.call('SREM', KEYS[1], ARGV[1])
return redis.call('DEL', KEYS[2])
"#;

const REGISTER_SCRIPT: &str = r#"
redis.call('SADD', KEYS[1], ARGV[1])
redis.call('HSETNX', KEYS[2], ARGV[2], ARGV[3])
redis.call('HSET', KEYS[2], ARGV[4], ARGV[5])
return 1
"#;

const SET_ENABLED_SCRIPT: &str = r#"
if redis.call('SISMEMBER', KEYS[1], ARGV[1]) == 1 then
    redis.call('HSET', KEYS[2], ARGV[2], ARGV[3])
    return 1
end
return 0
"#;

// ARGV: feature name, gate field, expected record, replacement record.
// Returns 1 when written, 0 when the feature or gate is gone, -1 on mismatch.
const TOGGLE_SCRIPT: &str = r#"
if redis.call('SISMEMBER', KEYS[1], ARGV[1]) == 0 then
    return 0
end
local current = redis.call('HGET', KEYS[2], ARGV[2])
if not current then
    return 0
end
if current ~= ARGV[3] then
    return -1
end
redis.call('HSET', KEYS[2], ARGV[2], ARGV[4])
return 1
"#;

const MAX_TOGGLE_ATTEMPTS: u32 = 5;

/// Redis-backed feature store
pub struct RedisStore {
    service: Arc<RedisService>,
}

impl RedisStore {
    /// Connect to Redis and create a store.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established within the
    /// configured attempt budget.
    pub async fn connect(config: RedisConfig) -> FlagResult<Self> {
        debug!(host = %config.host, port = config.port, "Connecting to Redis for feature flags");
        let service = RedisService::connect(config).await?;
        Ok(Self::from_service(Arc::new(service)))
    }

    /// Create a store on an existing service.
    pub fn from_service(service: Arc<RedisService>) -> Self {
        Self { service }
    }

    /// Get the underlying service.
    pub fn service(&self) -> &Arc<RedisService> {
        &self.service
    }

    async fn set_enabled(&self, name: &str, enabled: bool) -> FlagResult<()> {
        let mut conn = self.service.connection()?;
        let updated: i32 = redis::Script::new(SET_ENABLED_SCRIPT)
            .key(FEATURES_SET_KEY)
            .key(name)
            .arg(name)
            .arg(ENABLED_FIELD)
            .arg(encode_enabled(enabled))
            .invoke_async(&mut conn)
            .await?;

        debug!(feature = %name, enabled = enabled, found = updated == 1, "Set global switch");
        Ok(())
    }

    async fn insert_gate(&self, feature: &str, key: &str, encoded: String) -> FlagResult<()> {
        let mut conn = self.service.connection()?;
        let _: i32 = redis::Script::new(REGISTER_SCRIPT)
            .key(FEATURES_SET_KEY)
            .key(feature)
            .arg(feature)
            .arg(ENABLED_FIELD)
            .arg(encode_enabled(true))
            .arg(key)
            .arg(encoded)
            .invoke_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn set_gate_enabled(&self, feature: &str, key: &str, group: bool, enabled: bool) -> FlagResult<bool> {
        let key_matches = if group { is_group_key(key) } else { is_user_key(key) };
        if !key_matches {
            trace!(feature = %feature, key = %key, "Gate key does not match gate kind");
            return Ok(false);
        }

        for attempt in 1..=MAX_TOGGLE_ATTEMPTS {
            let Some(current) = self.service.hget(feature, key).await? else {
                debug!(feature = %feature, key = %key, "Gate not registered");
                return Ok(false);
            };
            let replacement = toggle_gate(key, &current, enabled)?;

            let mut conn = self.service.connection()?;
            let outcome: i32 = redis::Script::new(TOGGLE_SCRIPT)
                .key(FEATURES_SET_KEY)
                .key(feature)
                .arg(feature)
                .arg(key)
                .arg(&current)
                .arg(&replacement)
                .invoke_async(&mut conn)
                .await?;

            match outcome {
                1 => {
                    debug!(feature = %feature, key = %key, enabled = enabled, "Set gate");
                    return Ok(true);
                }
                0 => {
                    debug!(feature = %feature, key = %key, "Gate removed during toggle");
                    return Ok(false);
                }
                _ => debug!(feature = %feature, key = %key, attempt = attempt, "Gate changed during toggle, retrying"),
            }
        }

        Err(FlagError::Conflict(format!(
            "{} on {} kept changing across {} toggle attempts",
            key, feature, MAX_TOGGLE_ATTEMPTS
        )))
    }

    /// Fetch the `enabled` field and one gate field in a single round trip.
    async fn fetch_with_gate(&self, feature: &str, key: &str) -> FlagResult<(bool, Option<String>)> {
        let mut values = self
            .service
            .hmget(feature, &[ENABLED_FIELD, key])
            .await?
            .into_iter();

        let enabled = decode_enabled(values.next().flatten().as_deref())?;
        Ok((enabled, values.next().flatten()))
    }
}

#[async_trait]
impl FeatureStore for RedisStore {
    async fn list_features(&self) -> FlagResult<Vec<String>> {
        let mut names = self.service.smembers(FEATURES_SET_KEY).await?;
        names.sort();
        Ok(names)
    }

    async fn add_feature(&self, name: &str) -> FlagResult<()> {
        let mut conn = self.service.connection()?;
        let created: i32 = redis::Script::new(ADD_SCRIPT)
            .key(FEATURES_SET_KEY)
            .key(name)
            .arg(name)
            .arg(ENABLED_FIELD)
            .arg(encode_enabled(true))
            .invoke_async(&mut conn)
            .await?;

        debug!(feature = %name, created = created == 1, "Add feature");
        Ok(())
    }

    async fn remove_feature(&self, name: &str) -> FlagResult<()> {
        let mut conn = self.service.connection()?;
        let removed: i32 = redis::Script::new(REMOVE_SCRIPT)
            .key(FEATURES_SET_KEY)
            .key(name)
            .arg(name)
            .invoke_async(&mut conn)
            .await?;

        debug!(feature = %name, removed = removed == 1, "Remove feature");
        Ok(())
    }

    async fn get_feature(&self, name: &str) -> FlagResult<Option<Feature>> {
        if !self.service.sismember(FEATURES_SET_KEY, name).await? {
            return Ok(None);
        }

        let fields = self.service.hgetall(name).await?;
        decode_feature(name, fields).map(Some)
    }

    async fn enable_feature(&self, name: &str) -> FlagResult<()> {
        self.set_enabled(name, true).await
    }

    async fn disable_feature(&self, name: &str) -> FlagResult<()> {
        self.set_enabled(name, false).await
    }

    async fn is_enabled_globally(&self, name: &str) -> FlagResult<bool> {
        let raw = self.service.hget(name, ENABLED_FIELD).await?;
        let enabled = decode_enabled(raw.as_deref())?;
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
        let encoded = encode_gate(&GroupGate::new(match_property, match_value))?;
        self.insert_gate(feature, group_key, encoded).await?;
        debug!(feature = %feature, group = %group_key, property = %match_property, "Register group gate");
        Ok(())
    }

    async fn enable_group_gate(&self, feature: &str, group_key: &str) -> FlagResult<bool> {
        self.set_gate_enabled(feature, group_key, true, true).await
    }

    async fn disable_group_gate(&self, feature: &str, group_key: &str) -> FlagResult<bool> {
        self.set_gate_enabled(feature, group_key, true, false).await
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

        let (feature_enabled, raw) = self.fetch_with_gate(feature, group_key).await?;
        let gate = decode_gate::<GroupGate>(raw.as_deref())?;
        let enabled = evaluate_group(Some(feature_enabled), gate.as_ref(), member);
        trace!(feature = %feature, group = %group_key, enabled = enabled, "Group check");
        Ok(enabled)
    }

    async fn register_user_gate(&self, feature: &str, user_key: &str) -> FlagResult<bool> {
        let encoded = encode_gate(&UserGate::new())?;
        self.insert_gate(feature, user_key, encoded).await?;
        debug!(feature = %feature, user = %user_key, "Register user gate");
        Ok(true)
    }

    async fn enable_user_gate(&self, feature: &str, user_key: &str) -> FlagResult<bool> {
        self.set_gate_enabled(feature, user_key, false, true).await
    }

    async fn disable_user_gate(&self, feature: &str, user_key: &str) -> FlagResult<bool> {
        self.set_gate_enabled(feature, user_key, false, false).await
    }

    async fn is_enabled_for_user(&self, feature: &str, user_key: &str) -> FlagResult<bool> {
        if !is_user_key(user_key) {
            return Ok(false);
        }

        let (feature_enabled, raw) = self.fetch_with_gate(feature, user_key).await?;
        let gate = decode_gate::<UserGate>(raw.as_deref())?;
        let enabled = evaluate_user(Some(feature_enabled), gate.as_ref());
        trace!(feature = %feature, user = %user_key, enabled = enabled, "User check");
        Ok(enabled)
    }

    async fn disconnect(&self) -> FlagResult<()> {
        self.service.close();
        Ok(())
    }

    fn store_type(&self) -> &'static str {
        "redis"
    }
}

impl From<RedisService> for RedisStore {
    fn from(service: RedisService) -> Self {
        Self::from_service(Arc::new(service))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn store() -> RedisStore {
        let config = RedisConfig::from_url("redis://localhost:6379?db=1").unwrap();
        RedisStore::connect(config).await.unwrap()
    }

    #[tokio::test]
    #[ignore = "requires Redis"]
    async fn test_redis_layout() {
        let store = store().await;
        store.remove_feature("flaggr_layout_test").await.unwrap();

        store
            .register_group_gate("flaggr_layout_test", "group-admins", "admin", json!(true))
            .await
            .unwrap();
        store.register_user_gate("flaggr_layout_test", "user-1").await.unwrap();

        let fields = store.service().hgetall("flaggr_layout_test").await.unwrap();
        assert_eq!(fields["enabled"], "true");
        assert_eq!(fields["group-admins"], r#"{"enabled":true,"key":"admin","value":true}"#);
        assert_eq!(fields["user-1"], r#"{"enabled":true}"#);
        assert!(
            store
                .service()
                .sismember(FEATURES_SET_KEY, "flaggr_layout_test")
                .await
                .unwrap()
        );

        store.remove_feature("flaggr_layout_test").await.unwrap();
        assert!(store.get_feature("flaggr_layout_test").await.unwrap().is_none());
    }

    #[tokio::test]
    #[ignore = "requires Redis"]
    async fn test_switch_does_not_resurrect_removed_feature() {
        let store = store().await;
        store.remove_feature("flaggr_ghost_test").await.unwrap();

        store.enable_feature("flaggr_ghost_test").await.unwrap();

        assert!(store.service().hgetall("flaggr_ghost_test").await.unwrap().is_empty());
        assert!(!store.is_enabled_globally("flaggr_ghost_test").await.unwrap());
    }

    #[tokio::test]
    #[ignore = "requires Redis"]
    async fn test_gate_toggle_does_not_resurrect_removed_feature() {
        let store = store().await;
        let record = r#"{"enabled":true,"key":"admin","value":true}"#;
        store.remove_feature("flaggr_orphan_test").await.unwrap();

        // Leftover hash field with the feature no longer listed
        store
            .service()
            .hset("flaggr_orphan_test", "group-admins", record)
            .await
            .unwrap();

        assert!(!store.disable_group_gate("flaggr_orphan_test", "group-admins").await.unwrap());
        let fields = store.service().hgetall("flaggr_orphan_test").await.unwrap();
        assert_eq!(fields["group-admins"], record);
        assert!(!fields.contains_key("enabled"));

        store.remove_feature("flaggr_orphan_test").await.unwrap();
    }

    #[tokio::test]
    #[ignore = "requires Redis"]
    async fn test_gate_kind_follows_key_prefix() {
        let store = store().await;
        store.remove_feature("flaggr_kind_test").await.unwrap();
        store
            .register_group_gate("flaggr_kind_test", "group-admins", "admin", json!(true))
            .await
            .unwrap();

        assert!(!store.is_enabled_for_user("flaggr_kind_test", "group-admins").await.unwrap());
        assert!(!store.disable_user_gate("flaggr_kind_test", "group-admins").await.unwrap());
        assert_eq!(
            store.service().hget("flaggr_kind_test", "group-admins").await.unwrap().as_deref(),
            Some(r#"{"enabled":true,"key":"admin","value":true}"#)
        );

        store.remove_feature("flaggr_kind_test").await.unwrap();
    }

    #[tokio::test]
    #[ignore = "requires Redis"]
    async fn test_disconnect() {
        let store = store().await;
        store.disconnect().await.unwrap();
        store.disconnect().await.unwrap();

        assert!(matches!(
            store.list_features().await,
            Err(FlagError::Disconnected)
        ));
    }
}
