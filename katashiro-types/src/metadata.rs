//! Node metadata.
//!
//! Metadata is an insertion-ordered map of free-form annotations. A few
//! keys are recognized (see [`keys`]); everything else passes through
//! untouched. Lookups return `Option` since annotations are optional.

use crate::Value;
use indexmap::IndexMap;
use std::fmt;
use std::sync::Arc;

/// Converts a field's raw value to its string form.
pub type SerializeFn = Arc<dyn Fn(&Value) -> String + Send + Sync>;

/// Converts a field's raw value to its domain form.
pub type DeserializeFn = Arc<dyn Fn(&Value) -> Value + Send + Sync>;

/// Recognized metadata keys.
pub mod keys {
    /// Data type annotation. The value [`SEQ`] marks a sequence node.
    pub const DATATYPE: &str = "datatype";
    /// Sequence marker stored under [`DATATYPE`].
    pub const SEQ: &str = "seq";
    /// Serialize hook, see [`crate::MetaValue::Serializer`].
    pub const SERIALIZE: &str = "serialize";
    /// Deserialize hook, see [`crate::MetaValue::Deserializer`].
    pub const DESERIALIZE: &str = "deserialize";
}

/// A single metadata value.
#[derive(Clone)]
pub enum MetaValue {
    /// Plain annotation (label, doc string, type name, ...).
    Value(serde_json::Value),
    Serializer(SerializeFn),
    Deserializer(DeserializeFn),
    /// Metadata of another node, as produced by composition.
    Nested(Metadata),
}

impl MetaValue {
    #[must_use]
    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Value(v) => Some(v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        self.as_json().and_then(serde_json::Value::as_str)
    }

    #[must_use]
    pub fn as_nested(&self) -> Option<&Metadata> {
        match self {
            Self::Nested(m) => Some(m),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_serializer(&self) -> Option<&SerializeFn> {
        match self {
            Self::Serializer(f) => Some(f),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_deserializer(&self) -> Option<&DeserializeFn> {
        match self {
            Self::Deserializer(f) => Some(f),
            _ => None,
        }
    }
}

// Hooks compare by identity.
impl PartialEq for MetaValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Value(a), Self::Value(b)) => a == b,
            (Self::Serializer(a), Self::Serializer(b)) => Arc::ptr_eq(a, b),
            (Self::Deserializer(a), Self::Deserializer(b)) => Arc::ptr_eq(a, b),
            (Self::Nested(a), Self::Nested(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Debug for MetaValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(v) => write!(f, "{v}"),
            Self::Serializer(_) => f.write_str("<serialize fn>"),
            Self::Deserializer(_) => f.write_str("<deserialize fn>"),
            Self::Nested(m) => m.fmt(f),
        }
    }
}

impl From<serde_json::Value> for MetaValue {
    fn from(v: serde_json::Value) -> Self {
        Self::Value(v)
    }
}

impl From<&str> for MetaValue {
    fn from(s: &str) -> Self {
        Self::Value(serde_json::Value::from(s))
    }
}

impl From<String> for MetaValue {
    fn from(s: String) -> Self {
        Self::Value(serde_json::Value::from(s))
    }
}

impl From<bool> for MetaValue {
    fn from(b: bool) -> Self {
        Self::Value(serde_json::Value::from(b))
    }
}

impl From<i64> for MetaValue {
    fn from(i: i64) -> Self {
        Self::Value(serde_json::Value::from(i))
    }
}

impl From<Metadata> for MetaValue {
    fn from(m: Metadata) -> Self {
        Self::Nested(m)
    }
}

/// Insertion-ordered annotations attached to a schema node.
#[derive(Clone, Default, PartialEq)]
pub struct Metadata(IndexMap<String, MetaValue>);

impl Metadata {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Metadata carrying only the sequence marker.
    #[must_use]
    pub fn seq() -> Self {
        Self::new().with(keys::DATATYPE, keys::SEQ)
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<MetaValue>) -> Self {
        self.insert(key, value);
        self
    }

    /// Attaches a serialize hook.
    #[must_use]
    pub fn with_serializer<F>(self, f: F) -> Self
    where
        F: Fn(&Value) -> String + Send + Sync + 'static,
    {
        self.with(keys::SERIALIZE, MetaValue::Serializer(Arc::new(f)))
    }

    /// Attaches a deserialize hook.
    #[must_use]
    pub fn with_deserializer<F>(self, f: F) -> Self
    where
        F: Fn(&Value) -> Value + Send + Sync + 'static,
    {
        self.with(keys::DESERIALIZE, MetaValue::Deserializer(Arc::new(f)))
    }

    pub fn insert(
        &mut self,
        key: impl Into<String>,
        value: impl Into<MetaValue>,
    ) -> Option<MetaValue> {
        self.0.insert(key.into(), value.into())
    }

    /// Removes a key, keeping the order of the remaining entries.
    pub fn remove(&mut self, key: &str) -> Option<MetaValue> {
        self.0.shift_remove(key)
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&MetaValue> {
        self.0.get(key)
    }

    /// Shorthand for a string annotation.
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(MetaValue::as_str)
    }

    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &MetaValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Copies every entry of `other` into `self`, overriding existing keys.
    pub fn merge(&mut self, other: &Metadata) {
        for (k, v) in &other.0 {
            self.0.insert(k.clone(), v.clone());
        }
    }

    /// True when the sequence marker is present.
    #[must_use]
    pub fn is_seq(&self) -> bool {
        self.get_str(keys::DATATYPE) == Some(keys::SEQ)
    }

    /// Sets the sequence marker.
    pub fn mark_seq(&mut self) {
        self.insert(keys::DATATYPE, keys::SEQ);
    }

    #[must_use]
    pub fn serializer(&self) -> Option<&SerializeFn> {
        self.get(keys::SERIALIZE).and_then(MetaValue::as_serializer)
    }

    #[must_use]
    pub fn deserializer(&self) -> Option<&DeserializeFn> {
        self.get(keys::DESERIALIZE).and_then(MetaValue::as_deserializer)
    }

    /// Renders the plain annotations as JSON. Hooks are skipped.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        let mut map = serde_json::Map::new();
        for (k, v) in &self.0 {
            match v {
                MetaValue::Value(json) => {
                    map.insert(k.clone(), json.clone());
                }
                MetaValue::Nested(m) => {
                    map.insert(k.clone(), m.to_json());
                }
                MetaValue::Serializer(_) | MetaValue::Deserializer(_) => {}
            }
        }
        serde_json::Value::Object(map)
    }
}

impl fmt::Debug for Metadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.0.iter()).finish()
    }
}

impl<K: Into<String>, V: Into<MetaValue>> FromIterator<(K, V)> for Metadata {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl<'a> IntoIterator for &'a Metadata {
    type Item = (&'a String, &'a MetaValue);
    type IntoIter = indexmap::map::Iter<'a, String, MetaValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
