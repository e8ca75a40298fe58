//! Evaluation context: group members and user identities.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Zero-argument accessor producing a member's comparison value.
pub type Accessor = Arc<dyn Fn() -> Value + Send + Sync>;

/// How a member exposes a property.
pub enum MemberProperty<'a> {
    /// A plain readable field
    Field(&'a Value),
    /// A zero-argument accessor, invoked on evaluation
    Accessor(&'a (dyn Fn() -> Value + Send + Sync)),
}

impl MemberProperty<'_> {
    /// The value compared against a group's match value.
    pub fn value(&self) -> Value {
        match self {
            Self::Field(value) => (*value).clone(),
            Self::Accessor(accessor) => accessor(),
        }
    }
}

/// Something that can be tested for membership of a group.
///
/// `resolve` returns `None` when the member has no such property at all,
/// which evaluates to "not a member" rather than an error.
pub trait GroupMember: Send + Sync {
    /// Resolve a (possibly dotted) property name.
    fn resolve(&self, property: &str) -> Option<MemberProperty<'_>>;
}

impl GroupMember for Value {
    fn resolve(&self, property: &str) -> Option<MemberProperty<'_>> {
        lookup_path(self, property).map(MemberProperty::Field)
    }
}

impl GroupMember for Map<String, Value> {
    fn resolve(&self, property: &str) -> Option<MemberProperty<'_>> {
        if let Some(value) = self.get(property) {
            return Some(MemberProperty::Field(value));
        }
        let (head, rest) = property.split_once('.')?;
        self.get(head)
            .and_then(|value| lookup_path(value, rest))
            .map(MemberProperty::Field)
    }
}

/// Look up `path` in `root`.
///
/// An exact key wins over a dotted path, so `"a.b"` is first tried as a
/// literal field name. Numeric segments index into arrays.
fn lookup_path<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    if let Some(value) = root.as_object().and_then(|map| map.get(path)) {
        return Some(value);
    }

    path.split('.').try_fold(root, |current, segment| match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// A group member built from fields and accessors.
///
/// # Examples
///
/// ```
/// use flaggr_features::{GroupMember, Member};
/// use serde_json::json;
///
/// let member = Member::new()
///     .with_field("plan", "pro")
///     .with_accessor("is_admin", || json!(true));
///
/// assert_eq!(member.resolve("is_admin").unwrap().value(), json!(true));
/// assert!(member.resolve("missing").is_none());
/// ```
#[derive(Clone)]
pub struct Member {
    fields: Value,
    accessors: HashMap<String, Accessor>,
}

impl Member {
    /// Create an empty member.
    pub fn new() -> Self {
        Self {
            fields: Value::Object(Map::new()),
            accessors: HashMap::new(),
        }
    }

    /// Create a member whose fields are the given JSON value.
    pub fn from_value(fields: Value) -> Self {
        Self {
            fields,
            accessors: HashMap::new(),
        }
    }

    /// Add a field.
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        if let Value::Object(map) = &mut self.fields {
            map.insert(name.into(), value.into());
        }
        self
    }

    /// Add an accessor. Accessors shadow fields of the same name.
    pub fn with_accessor<F, V>(mut self, name: impl Into<String>, accessor: F) -> Self
    where
        F: Fn() -> V + Send + Sync + 'static,
        V: Into<Value>,
    {
        self.accessors
            .insert(name.into(), Arc::new(move || accessor().into()));
        self
    }
}

impl Default for Member {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Member {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut accessors: Vec<&String> = self.accessors.keys().collect();
        accessors.sort();
        f.debug_struct("Member")
            .field("fields", &self.fields)
            .field("accessors", &accessors)
            .finish()
    }
}

impl GroupMember for Member {
    fn resolve(&self, property: &str) -> Option<MemberProperty<'_>> {
        if let Some(accessor) = self.accessors.get(property) {
            return Some(MemberProperty::Accessor(accessor.as_ref()));
        }
        lookup_path(&self.fields, property).map(MemberProperty::Field)
    }
}

/// Something with an id usable for user gates.
pub trait Identity: Send + Sync {
    /// The identity's id, or `None` if it has none.
    fn identity_id(&self) -> Option<String>;
}

impl Identity for Value {
    fn identity_id(&self) -> Option<String> {
        match self.get("id")? {
            Value::String(id) if !id.is_empty() => Some(id.clone()),
            Value::Number(id) => Some(id.to_string()),
            _ => None,
        }
    }
}

/// A minimal user identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct User {
    /// User id
    pub id: String,
}

impl User {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

impl Identity for User {
    fn identity_id(&self) -> Option<String> {
        Some(self.id.clone()).filter(|id| !id.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_field() {
        let member = json!({"admin": true});
        assert_eq!(member.resolve("admin").unwrap().value(), json!(true));
        assert!(member.resolve("owner").is_none());
    }

    #[test]
    fn test_json_dotted_path() {
        let member = json!({"account": {"plan": "pro", "seats": [3, 5]}});
        assert_eq!(member.resolve("account.plan").unwrap().value(), json!("pro"));
        assert_eq!(member.resolve("account.seats.1").unwrap().value(), json!(5));
        assert!(member.resolve("account.region").is_none());
    }

    #[test]
    fn test_literal_key_wins_over_path() {
        let member = json!({"a.b": 1, "a": {"b": 2}});
        assert_eq!(member.resolve("a.b").unwrap().value(), json!(1));
    }

    #[test]
    fn test_falsy_values_are_present() {
        let member = json!({"admin": false, "count": 0});
        assert_eq!(member.resolve("admin").unwrap().value(), json!(false));
        assert_eq!(member.resolve("count").unwrap().value(), json!(0));
    }

    #[test]
    fn test_map_member() {
        let mut map = Map::new();
        map.insert("team".into(), json!({"name": "core"}));
        assert_eq!(map.resolve("team.name").unwrap().value(), json!("core"));
        assert!(map.resolve("team.size").is_none());
    }

    #[test]
    fn test_member_accessor_shadows_field() {
        let member = Member::new()
            .with_field("role", "viewer")
            .with_accessor("role", || "editor");
        assert!(matches!(
            member.resolve("role"),
            Some(MemberProperty::Accessor(_))
        ));
        assert_eq!(member.resolve("role").unwrap().value(), json!("editor"));
    }

    #[test]
    fn test_member_from_value() {
        let member = Member::from_value(json!({"org": {"id": 9}}));
        assert_eq!(member.resolve("org.id").unwrap().value(), json!(9));
    }

    #[test]
    fn test_json_identity() {
        assert_eq!(json!({"id": "u-1"}).identity_id().as_deref(), Some("u-1"));
        assert_eq!(json!({"id": 12}).identity_id().as_deref(), Some("12"));
        assert_eq!(json!({"id": ""}).identity_id(), None);
        assert_eq!(json!({"id": null}).identity_id(), None);
        assert_eq!(json!({"name": "bob"}).identity_id(), None);
    }

    #[test]
    fn test_user_identity() {
        assert_eq!(User::new("1").identity_id().as_deref(), Some("1"));
        assert_eq!(User::new("").identity_id(), None);
    }
}
