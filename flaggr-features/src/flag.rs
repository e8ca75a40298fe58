//! Feature records, gates, and gate evaluation.
//!
//! The evaluation rules live here once and are shared by every store:
//!
//! 1. A feature that does not exist, or whose global switch is off, is off
//!    for everyone, whatever its gates say.
//! 2. A missing or disabled gate evaluates to off.
//! 3. A group gate matches when the member's value for the gate's property
//!    equals the gate's match value. A member without the property is not a
//!    member. Numbers compare by value, so `1` equals `1.0`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::member::GroupMember;

/// A feature and its gates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    /// Feature name (unique within a store)
    pub name: String,

    /// Global switch; dominates every gate
    pub enabled: bool,

    /// Gates keyed by derived key (`group-<name>`, `user-<id>`)
    #[serde(default)]
    pub gates: BTreeMap<String, Gate>,
}

impl Feature {
    /// Create a new feature, enabled and without gates.
    ///
    /// # Examples
    ///
    /// ```
    /// use flaggr_features::Feature;
    ///
    /// let feature = Feature::new("uploader");
    /// assert!(feature.enabled);
    /// assert!(feature.gates.is_empty());
    /// ```
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            enabled: true,
            gates: BTreeMap::new(),
        }
    }

    /// Set the global switch.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Attach a group gate.
    pub fn with_group(mut self, group_key: impl Into<String>, gate: GroupGate) -> Self {
        self.gates.insert(group_key.into(), Gate::Group(gate));
        self
    }

    /// Attach a user gate.
    pub fn with_user(mut self, user_key: impl Into<String>, gate: UserGate) -> Self {
        self.gates.insert(user_key.into(), Gate::User(gate));
        self
    }

    pub fn group(&self, group_key: &str) -> Option<&GroupGate> {
        match self.gates.get(group_key) {
            Some(Gate::Group(gate)) => Some(gate),
            _ => None,
        }
    }

    pub fn user(&self, user_key: &str) -> Option<&UserGate> {
        match self.gates.get(user_key) {
            Some(Gate::User(gate)) => Some(gate),
            _ => None,
        }
    }

    /// Evaluate a group gate of this feature.
    pub fn is_enabled_for_group(&self, group_key: &str, member: &dyn GroupMember) -> bool {
        evaluate_group(Some(self.enabled), self.group(group_key), member)
    }

    /// Evaluate a user gate of this feature.
    pub fn is_enabled_for_user(&self, user_key: &str) -> bool {
        evaluate_user(Some(self.enabled), self.user(user_key))
    }
}

/// A gate attached to a feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Gate {
    Group(GroupGate),
    User(UserGate),
}

impl Gate {
    pub fn set_enabled(&mut self, enabled: bool) {
        match self {
            Self::Group(gate) => gate.enabled = enabled,
            Self::User(gate) => gate.enabled = enabled,
        }
    }
}

/// Group gate: members whose `match_property` equals `match_value`.
///
/// Serialized as `{"enabled", "key", "value"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupGate {
    pub enabled: bool,

    /// Property read from the member (dotted paths allowed)
    #[serde(rename = "key")]
    pub match_property: String,

    /// Value the property must equal
    #[serde(rename = "value")]
    pub match_value: Value,
}

impl GroupGate {
    /// Create an enabled group gate.
    pub fn new(match_property: impl Into<String>, match_value: impl Into<Value>) -> Self {
        Self {
            enabled: true,
            match_property: match_property.into(),
            match_value: match_value.into(),
        }
    }

    /// Whether `member` belongs to this group. Ignores `enabled`.
    pub fn matches(&self, member: &dyn GroupMember) -> bool {
        member
            .resolve(&self.match_property)
            .map(|property| values_equal(&property.value(), &self.match_value))
            .unwrap_or(false)
    }
}

/// Value equality where numbers compare numerically, at any depth.
fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => x == y,
            _ => match (x.as_u64(), y.as_u64()) {
                (Some(x), Some(y)) => x == y,
                _ => x.as_f64() == y.as_f64(),
            },
        },
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| values_equal(x, y))
        }
        (Value::Object(xs), Value::Object(ys)) => {
            xs.len() == ys.len()
                && xs
                    .iter()
                    .all(|(key, x)| ys.get(key).is_some_and(|y| values_equal(x, y)))
        }
        _ => a == b,
    }
}

/// User gate: presence means the user is registered against the feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UserGate {
    pub enabled: bool,
}

impl UserGate {
    /// Create an enabled user gate.
    pub fn new() -> Self {
        Self { enabled: true }
    }
}

impl Default for UserGate {
    fn default() -> Self {
        Self::new()
    }
}

/// Evaluate a group gate.
///
/// `feature_enabled` is `None` when the feature does not exist.
pub fn evaluate_group(
    feature_enabled: Option<bool>,
    gate: Option<&GroupGate>,
    member: &dyn GroupMember,
) -> bool {
    if feature_enabled != Some(true) {
        return false;
    }

    match gate {
        Some(gate) if gate.enabled => gate.matches(member),
        _ => false,
    }
}

/// Evaluate a user gate.
///
/// `feature_enabled` is `None` when the feature does not exist.
pub fn evaluate_user(feature_enabled: Option<bool>, gate: Option<&UserGate>) -> bool {
    feature_enabled == Some(true) && gate.is_some_and(|gate| gate.enabled)
}
