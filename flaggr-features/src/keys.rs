//! Storage key derivation.
//!
//! Gate records are stored under keys derived from the group name or the
//! user id, so registering the same group or user twice lands on the same
//! record.

use std::fmt::Display;

/// Prefix of every group gate key.
pub const GROUP_KEY_PREFIX: &str = "group-";

/// Prefix of every user gate key.
pub const USER_KEY_PREFIX: &str = "user-";

/// Redis set holding every feature name.
pub const FEATURES_SET_KEY: &str = "flagger_features";

/// Hash field holding a feature's global switch.
pub const ENABLED_FIELD: &str = "enabled";

/// Key for a named group.
///
/// ```
/// assert_eq!(flaggr_features::keys::group_key("admins"), "group-admins");
/// ```
pub fn group_key(group_name: &str) -> String {
    format!("{}{}", GROUP_KEY_PREFIX, group_name)
}

/// Key for a user id (the id, not the whole identity).
///
/// ```
/// assert_eq!(flaggr_features::keys::user_key(42), "user-42");
/// ```
pub fn user_key(user_id: impl Display) -> String {
    format!("{}{}", USER_KEY_PREFIX, user_id)
}

/// Whether `key` names a group gate.
pub fn is_group_key(key: &str) -> bool {
    key.starts_with(GROUP_KEY_PREFIX)
}

/// Whether `key` names a user gate.
pub fn is_user_key(key: &str) -> bool {
    key.starts_with(USER_KEY_PREFIX)
}
