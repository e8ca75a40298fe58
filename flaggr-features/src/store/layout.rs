//! Redis hash layout for features.
//!
//! One hash per feature, keyed by the feature name:
//!
//! | field          | value                                   |
//! |----------------|-----------------------------------------|
//! | `enabled`      | `"true"` / `"false"`                    |
//! | `group-<name>` | `{"enabled":..,"key":..,"value":..}`    |
//! | `user-<id>`    | `{"enabled":..}`                        |
//!
//! Feature names are members of the `flagger_features` set.

use serde::de::DeserializeOwned;
use std::collections::{BTreeMap, HashMap};
use tracing::warn;

use crate::error::{FlagError, FlagResult};
use crate::flag::{Feature, Gate, GroupGate, UserGate};
use crate::keys::{ENABLED_FIELD, is_group_key, is_user_key};

pub(crate) fn encode_enabled(enabled: bool) -> &'static str {
    if enabled { "true" } else { "false" }
}

/// Decode the `enabled` field. A missing field reads as off.
pub(crate) fn decode_enabled(raw: Option<&str>) -> FlagResult<bool> {
    match raw {
        None => Ok(false),
        Some("true") => Ok(true),
        Some("false") => Ok(false),
        Some(other) => Err(FlagError::Serialization(format!(
            "invalid enabled flag: {:?}",
            other
        ))),
    }
}

pub(crate) fn encode_gate<G: serde::Serialize>(gate: &G) -> FlagResult<String> {
    Ok(serde_json::to_string(gate)?)
}

pub(crate) fn decode_gate<G: DeserializeOwned>(raw: Option<&str>) -> FlagResult<Option<G>> {
    raw.map(serde_json::from_str).transpose().map_err(Into::into)
}

/// Re-encode a stored gate record with its `enabled` flag set.
///
/// The gate kind follows the key prefix, so a record of the other kind is a
/// decode error rather than a silent rewrite.
pub(crate) fn toggle_gate(key: &str, raw: &str, enabled: bool) -> FlagResult<String> {
    if is_group_key(key) {
        let mut gate: GroupGate = serde_json::from_str(raw)?;
        gate.enabled = enabled;
        encode_gate(&gate)
    } else if is_user_key(key) {
        let mut gate: UserGate = serde_json::from_str(raw)?;
        gate.enabled = enabled;
        encode_gate(&gate)
    } else {
        Err(FlagError::Serialization(format!("not a gate key: {:?}", key)))
    }
}

/// Rebuild a feature from its hash.
///
/// Fields that are neither `enabled` nor a gate key, or that fail to decode,
/// are skipped with a warning.
pub(crate) fn decode_feature(name: &str, fields: HashMap<String, String>) -> FlagResult<Feature> {
    let enabled = decode_enabled(fields.get(ENABLED_FIELD).map(String::as_str))?;
    let mut gates = BTreeMap::new();

    for (field, raw) in fields {
        let gate = if is_group_key(&field) {
            serde_json::from_str::<GroupGate>(&raw).map(Gate::Group)
        } else if is_user_key(&field) {
            serde_json::from_str::<UserGate>(&raw).map(Gate::User)
        } else {
            if field != ENABLED_FIELD {
                warn!(feature = %name, field = %field, "Skipping unknown feature field");
            }
            continue;
        };

        match gate {
            Ok(gate) => {
                gates.insert(field, gate);
            }
            Err(e) => {
                warn!(feature = %name, field = %field, error = %e, "Skipping undecodable gate");
            }
        }
    }

    Ok(Feature {
        name: name.to_string(),
        enabled,
        gates,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_enabled_field() {
        assert_eq!(encode_enabled(true), "true");
        assert_eq!(encode_enabled(false), "false");
        assert!(decode_enabled(Some("true")).unwrap());
        assert!(!decode_enabled(Some("false")).unwrap());
        assert!(!decode_enabled(None).unwrap());
        assert!(matches!(
            decode_enabled(Some("yes")),
            Err(FlagError::Serialization(_))
        ));
    }

    #[test]
    fn test_gate_encoding() {
        let group = GroupGate::new("plan", "pro");
        assert_eq!(
            encode_gate(&group).unwrap(),
            r#"{"enabled":true,"key":"plan","value":"pro"}"#
        );
        assert_eq!(encode_gate(&UserGate::new()).unwrap(), r#"{"enabled":true}"#);

        let back: Option<GroupGate> = decode_gate(Some(r#"{"enabled":false,"key":"plan","value":"pro"}"#)).unwrap();
        assert!(!back.unwrap().enabled);

        let missing: Option<UserGate> = decode_gate(None).unwrap();
        assert!(missing.is_none());

        let broken: FlagResult<Option<UserGate>> = decode_gate(Some("{"));
        assert!(broken.is_err());
    }

    #[test]
    fn test_toggle_gate() {
        let group = r#"{"enabled":true,"key":"admin","value":true}"#;
        assert_eq!(
            toggle_gate("group-admins", group, false).unwrap(),
            r#"{"enabled":false,"key":"admin","value":true}"#
        );
        assert_eq!(
            toggle_gate("user-1", r#"{"enabled":false}"#, true).unwrap(),
            r#"{"enabled":true}"#
        );

        // Group record under a user key is never flattened into a user gate
        assert!(toggle_gate("user-1", group, false).is_err());
        assert!(toggle_gate("group-admins", r#"{"enabled":true}"#, false).is_err());
        assert!(toggle_gate("enabled", "true", false).is_err());
    }

    #[test]
    fn test_user_decode_rejects_group_record() {
        let group = Some(r#"{"enabled":true,"key":"admin","value":true}"#);
        assert!(decode_gate::<UserGate>(group).is_err());
    }

    #[test]
    fn test_decode_feature() {
        let fields = HashMap::from([
            ("enabled".to_string(), "true".to_string()),
            (
                "group-admins".to_string(),
                r#"{"enabled":true,"key":"admin","value":true}"#.to_string(),
            ),
            ("user-1".to_string(), r#"{"enabled":false}"#.to_string()),
            ("user-2".to_string(), "not json".to_string()),
            ("owner".to_string(), "ops".to_string()),
        ]);

        let feature = decode_feature("uploader", fields).unwrap();

        assert_eq!(feature.name, "uploader");
        assert!(feature.enabled);
        assert_eq!(feature.gates.len(), 2);
        assert!(feature.is_enabled_for_group("group-admins", &json!({"admin": true})));
        assert!(!feature.is_enabled_for_user("user-1"));
    }

    #[test]
    fn test_decode_feature_without_enabled_field() {
        let feature = decode_feature("half-written", HashMap::new()).unwrap();
        assert!(!feature.enabled);
        assert!(feature.gates.is_empty());
    }
}
