//! Navigable views over projected values.

use crate::lookup::Lookup;
use crate::{Error, Result};
use katashiro_schema::{Composite, Leaf, Node, NodeKind, Repeated};
use katashiro_types::{MetaValue, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::warn;

/// A value paired with the schema node it was projected through.
pub enum Wrapper {
    Field(FieldWrapper),
    Sequence(SequenceWrapper),
    Model(ModelWrapper),
}

impl Wrapper {
    /// Id of the schema node.
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Field(w) => w.schema.id(),
            Self::Sequence(w) => w.schema.id(),
            Self::Model(w) => w.schema.id(),
        }
    }

    #[must_use]
    pub fn kind(&self) -> NodeKind {
        match self {
            Self::Field(_) => NodeKind::Leaf,
            Self::Sequence(_) => NodeKind::Repeated,
            Self::Model(_) => NodeKind::Composite,
        }
    }

    #[must_use]
    pub fn node(&self) -> Node {
        match self {
            Self::Field(w) => w.node(),
            Self::Sequence(w) => w.node(),
            Self::Model(w) => w.node(),
        }
    }

    #[must_use]
    pub fn value(&self) -> &Value {
        match self {
            Self::Field(w) => &w.value,
            Self::Sequence(w) => &w.value,
            Self::Model(w) => &w.value,
        }
    }

    /// Metadata entry of the schema node.
    #[must_use]
    pub fn meta(&self, key: &str) -> Option<&MetaValue> {
        match self {
            Self::Field(w) => w.meta(key),
            Self::Sequence(w) => w.meta(key),
            Self::Model(w) => w.meta(key),
        }
    }

    /// Attribute of a model; fails with [`Error::NotAModel`] otherwise.
    pub fn attr(&self, name: &str) -> Result<Arc<Wrapper>> {
        match self {
            Self::Model(w) => w.attr(name),
            _ => Err(Error::NotAModel {
                schema: self.id().to_string(),
            }),
        }
    }

    /// Elements of a sequence; fails with [`Error::NotIterable`] otherwise.
    pub fn elements(&self) -> Result<Vec<Arc<Wrapper>>> {
        match self {
            Self::Sequence(w) => w.elements(),
            _ => Err(Error::NotIterable {
                schema: self.id().to_string(),
            }),
        }
    }

    /// String form: the field's serializer for fields, plain formatting of
    /// the value for everything else.
    #[must_use]
    pub fn serialize(&self) -> String {
        match self {
            Self::Field(w) => w.serialize(),
            _ => self.value().to_string(),
        }
    }

    #[must_use]
    pub fn as_field(&self) -> Option<&FieldWrapper> {
        match self {
            Self::Field(w) => Some(w),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_sequence(&self) -> Option<&SequenceWrapper> {
        match self {
            Self::Sequence(w) => Some(w),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_model(&self) -> Option<&ModelWrapper> {
        match self {
            Self::Model(w) => Some(w),
            _ => None,
        }
    }
}

impl fmt::Display for Wrapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.serialize())
    }
}

impl fmt::Debug for Wrapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Field(w) => w.fmt(f),
            Self::Sequence(w) => w.fmt(f),
            Self::Model(w) => w.fmt(f),
        }
    }
}

// ── Field ────────────────────────────────────────────────────────

/// A leaf value.
pub struct FieldWrapper {
    value: Value,
    schema: Arc<Leaf>,
}

impl FieldWrapper {
    pub(crate) fn new(value: Value, schema: Arc<Leaf>) -> Self {
        Self { value, schema }
    }

    #[must_use]
    pub fn value(&self) -> &Value {
        &self.value
    }

    #[must_use]
    pub fn node(&self) -> Node {
        Node::Leaf(Arc::clone(&self.schema))
    }

    #[must_use]
    pub fn meta(&self, key: &str) -> Option<&MetaValue> {
        self.schema.metadata().get(key)
    }

    /// Runs the `serialize` hook, or formats the raw value if there is none.
    #[must_use]
    pub fn serialize(&self) -> String {
        match self.schema.metadata().serializer() {
            Some(hook) => hook(&self.value),
            None => self.value.to_string(),
        }
    }

    /// Runs the `deserialize` hook, or returns the raw value if there is none.
    #[must_use]
    pub fn deserialize(&self) -> Value {
        match self.schema.metadata().deserializer() {
            Some(hook) => hook(&self.value),
            None => self.value.clone(),
        }
    }
}

impl fmt::Display for FieldWrapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.serialize())
    }
}

impl fmt::Debug for FieldWrapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldWrapper")
            .field("schema", &self.schema.id())
            .field("value", &self.value)
            .finish()
    }
}

// ── Sequence ─────────────────────────────────────────────────────

/// Objects are cached by identity; scalars by position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum ElementKey {
    Object(usize),
    Position(usize),
}

/// A list value projected through a [`Repeated`] node.
///
/// Element wrappers are built on first iteration and reused afterwards.
pub struct SequenceWrapper {
    value: Value,
    schema: Arc<Repeated>,
    lookup: Lookup,
    elements: RwLock<HashMap<ElementKey, Arc<Wrapper>>>,
}

impl SequenceWrapper {
    /// `Null` counts as an empty list; any other non-list is rejected.
    pub(crate) fn new(value: Value, schema: Arc<Repeated>, lookup: Lookup) -> Result<Self> {
        if !matches!(value, Value::List(_) | Value::Null) {
            return Err(Error::NotIterable {
                schema: schema.id().to_string(),
            });
        }
        Ok(Self {
            value,
            schema,
            lookup,
            elements: RwLock::new(HashMap::new()),
        })
    }

    #[must_use]
    pub fn value(&self) -> &Value {
        &self.value
    }

    #[must_use]
    pub fn node(&self) -> Node {
        Node::Repeated(Arc::clone(&self.schema))
    }

    #[must_use]
    pub fn meta(&self, key: &str) -> Option<&MetaValue> {
        self.schema.metadata().get(key)
    }

    fn items(&self) -> &[Value] {
        self.value.as_list().unwrap_or_default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items().is_empty()
    }

    /// Wraps each element, in order.
    pub fn iter(&self) -> impl Iterator<Item = Result<Arc<Wrapper>>> + '_ {
        self.items()
            .iter()
            .enumerate()
            .map(|(position, item)| self.element(position, item))
    }

    pub fn elements(&self) -> Result<Vec<Arc<Wrapper>>> {
        self.iter().collect()
    }

    /// Element at `index`.
    ///
    /// Iterate instead; positional access is kept for older callers and can
    /// be switched off with `index-access = false`.
    #[deprecated(note = "iterate with `iter()` or `elements()` instead")]
    pub fn get(&self, index: usize) -> Result<Option<Arc<Wrapper>>> {
        if !self.lookup.index_access() {
            return Err(Error::IndexAccessDisabled {
                schema: self.schema.id().to_string(),
            });
        }
        warn!(schema = %self.schema.id(), index, "index access on a sequence is deprecated");
        self.items()
            .get(index)
            .map(|item| self.element(index, item))
            .transpose()
    }

    fn element(&self, position: usize, item: &Value) -> Result<Arc<Wrapper>> {
        let key = item
            .identity()
            .map_or(ElementKey::Position(position), ElementKey::Object);
        if let Some(wrapper) = self
            .elements
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
        {
            return Ok(Arc::clone(wrapper));
        }

        let wrapper = self.lookup.create_wrapper(item.clone(), self.schema.child())?;
        let mut elements = self.elements.write().unwrap_or_else(PoisonError::into_inner);
        Ok(Arc::clone(elements.entry(key).or_insert(wrapper)))
    }
}

impl fmt::Debug for SequenceWrapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SequenceWrapper")
            .field("schema", &self.schema.id())
            .field("len", &self.len())
            .finish()
    }
}

// ── Model ────────────────────────────────────────────────────────

/// An object projected through a [`Composite`] node.
pub struct ModelWrapper {
    value: Value,
    schema: Arc<Composite>,
    lookup: Lookup,
    pool: RwLock<HashMap<String, Arc<Wrapper>>>,
}

impl ModelWrapper {
    pub(crate) fn new(value: Value, schema: Arc<Composite>, lookup: Lookup) -> Self {
        Self {
            value,
            schema,
            lookup,
            pool: RwLock::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn value(&self) -> &Value {
        &self.value
    }

    #[must_use]
    pub fn node(&self) -> Node {
        Node::Composite(Arc::clone(&self.schema))
    }

    #[must_use]
    pub fn meta(&self, key: &str) -> Option<&MetaValue> {
        self.schema.metadata().get(key)
    }

    /// Wrapper for attribute `name`, built on first access.
    ///
    /// Later calls with the same name return the same `Arc`.
    pub fn attr(&self, name: &str) -> Result<Arc<Wrapper>> {
        if let Some(wrapper) = self
            .pool
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
        {
            return Ok(Arc::clone(wrapper));
        }

        if !self.value.is_object() {
            return Err(Error::NotAnObject {
                attribute: name.to_string(),
                schema: self.schema.id().to_string(),
            });
        }
        let node = self.lookup.resolve_child_schema(&self.value, &self.schema, name)?;
        let value = self.value.get_field(name).ok_or_else(|| Error::MissingValue {
            attribute: name.to_string(),
            type_name: self.value.type_tag().short_name().to_string(),
        })?;
        let wrapper = self.lookup.create_wrapper(value, &node)?;

        let mut pool = self.pool.write().unwrap_or_else(PoisonError::into_inner);
        Ok(Arc::clone(pool.entry(name.to_string()).or_insert(wrapper)))
    }
}

impl fmt::Debug for ModelWrapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelWrapper")
            .field("schema", &self.schema.id())
            .field("value", &self.value)
            .finish()
    }
}
