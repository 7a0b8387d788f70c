use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An entity identity in canonical form.
///
/// Holds the compact JSON text of the identity value. Object members are
/// ordered by key, so equal identities always produce equal text and the
/// same hash, whatever Rust type they were read from: a `String` field and a
/// `&str` lookup argument meet at the same key. Floats with no fractional
/// part are written as integers, so `7.0` and `7u32` are the same identity.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdKey(String);

impl IdKey {
    /// Canonicalise an identity already read as a document value.
    pub fn from_value(value: &Value) -> Self {
        Self(canonical(value).to_string())
    }

    /// Canonicalise any serializable identity.
    pub fn of<T: Serialize + ?Sized>(id: &T) -> serde_json::Result<Self> {
        serde_json::to_value(id).map(|value| Self::from_value(&value))
    }

    /// The identity as a document value.
    pub fn to_value(&self) -> serde_json::Result<Value> {
        serde_json::from_str(&self.0)
    }

    /// True if the identity is JSON `null`.
    pub fn is_null(&self) -> bool {
        self.0 == "null"
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn canonical(value: &Value) -> Value {
    match value {
        Value::Number(number) if number.is_f64() => number
            .as_f64()
            .and_then(integral)
            .unwrap_or_else(|| value.clone()),
        Value::Array(items) => Value::Array(items.iter().map(canonical).collect()),
        Value::Object(members) => Value::Object(
            members
                .iter()
                .map(|(name, member)| (name.clone(), canonical(member)))
                .collect(),
        ),
        other => other.clone(),
    }
}

fn integral(float: f64) -> Option<Value> {
    if float.fract() != 0.0 {
        return None;
    }
    if float >= 0.0 && float < u64::MAX as f64 {
        Some(Value::from(float as u64))
    } else if float >= i64::MIN as f64 && float < 0.0 {
        Some(Value::from(float as i64))
    } else {
        None
    }
}

impl fmt::Debug for IdKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IdKey({})", self.0)
    }
}

impl fmt::Display for IdKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Storage key of one entity document: entity type plus identity.
///
/// The entity part is the full type path (`std::any::type_name`), so two
/// entity types that share a short name never share documents.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityKey {
    pub entity: String,
    pub id: IdKey,
}

impl EntityKey {
    pub fn new(entity: impl Into<String>, id: IdKey) -> Self {
        Self {
            entity: entity.into(),
            id,
        }
    }

    /// Key of the `E` document with identity `id`.
    pub fn of<E: ?Sized + 'static>(id: IdKey) -> Self {
        Self::new(entity_path::<E>(), id)
    }

    /// True if this key belongs to the named entity type.
    pub fn is(&self, entity: &str) -> bool {
        self.entity == entity
    }
}

/// Name under which documents of `E` are stored.
pub fn entity_path<E: ?Sized + 'static>() -> &'static str {
    std::any::type_name::<E>()
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.entity, self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashSet;

    #[test]
    fn owned_and_borrowed_strings_meet() {
        let owned = IdKey::of(&"1231".to_string()).unwrap();
        let borrowed = IdKey::of("1231").unwrap();
        assert_eq!(owned, borrowed);
        assert_eq!(owned.as_str(), "\"1231\"");
    }

    #[test]
    fn numbers_of_different_widths_meet() {
        assert_eq!(IdKey::of(&7u8).unwrap(), IdKey::of(&7i64).unwrap());
        assert_ne!(IdKey::of(&7).unwrap(), IdKey::of("7").unwrap());
    }

    #[test]
    fn integral_floats_meet_integers() {
        assert_eq!(IdKey::of(&7.0).unwrap(), IdKey::of(&7u32).unwrap());
        assert_eq!(IdKey::of(&-3.0f32).unwrap(), IdKey::of(&-3i8).unwrap());
        assert_eq!(IdKey::of(&-0.0).unwrap(), IdKey::of(&0).unwrap());
        assert_eq!(IdKey::of(&7.0).unwrap().as_str(), "7");
        assert_eq!(IdKey::of(&7.5).unwrap().as_str(), "7.5");
        assert_eq!(IdKey::of(&1e300).unwrap(), IdKey::from_value(&json!(1e300)));
        assert_eq!(
            IdKey::from_value(&json!({"shelf": 3.0, "slots": [9.0, 1.5]})),
            IdKey::from_value(&json!({"slots": [9, 1.5], "shelf": 3}))
        );
    }

    #[test]
    fn composite_identities_ignore_member_order() {
        let a = IdKey::from_value(&json!({"shelf": 3, "slot": 9}));
        let b = IdKey::from_value(&json!({"slot": 9, "shelf": 3}));
        assert_eq!(a, b);

        let keys: HashSet<_> = [a, b].into_iter().collect();
        assert_eq!(keys.len(), 1);
    }

    #[test]
    fn value_round_trip() {
        let value = json!(["a", 1, null]);
        assert_eq!(IdKey::from_value(&value).to_value().unwrap(), value);
    }

    #[test]
    fn null_identity() {
        assert!(IdKey::of(&Option::<String>::None).unwrap().is_null());
        assert!(!IdKey::of("null").unwrap().is_null());
    }

    #[test]
    fn entity_key_display() {
        let key = EntityKey::new("Book", IdKey::of("1231").unwrap());
        assert_eq!(key.to_string(), "Book#\"1231\"");
        assert!(key.is("Book"));
        assert!(!key.is("Shelf"));
    }

    #[test]
    fn same_short_name_different_types() {
        mod first {
            pub struct Book;
        }
        mod second {
            pub struct Book;
        }
        let id = IdKey::of("1").unwrap();
        let a = EntityKey::of::<first::Book>(id.clone());
        let b = EntityKey::of::<second::Book>(id);
        assert_ne!(a, b);
        assert!(a.entity.ends_with("first::Book"));
        assert!(a.is(entity_path::<first::Book>()));
        assert!(!b.is(entity_path::<first::Book>()));
    }

    #[test]
    fn entity_key_serde_is_stable() {
        let key = EntityKey::new("Book", IdKey::of(&42).unwrap());
        let text = serde_json::to_string(&key).unwrap();
        assert_eq!(text, r#"{"entity":"Book","id":"42"}"#);
        assert_eq!(serde_json::from_str::<EntityKey>(&text).unwrap(), key);
    }
}
