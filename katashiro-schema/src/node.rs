//! The schema node model.

use crate::registry::Alias;
use crate::{Error, Result, algebra};
use katashiro_types::Metadata;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, OnceLock};

/// Discriminant of a [`Node`], for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Leaf,
    Composite,
    Repeated,
    Alias,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Leaf => "leaf",
            Self::Composite => "composite",
            Self::Repeated => "repeated",
            Self::Alias => "alias",
        })
    }
}

/// A schema node.
///
/// Every variant is reference counted, so cloning a node or building a new
/// tree out of existing children never copies subtrees.
#[derive(Clone)]
pub enum Node {
    Leaf(Arc<Leaf>),
    Composite(Arc<Composite>),
    Repeated(Arc<Repeated>),
    Alias(Arc<Alias>),
}

impl Node {
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Leaf(l) => &l.id,
            Self::Composite(c) => &c.id,
            Self::Repeated(r) => &r.id,
            Self::Alias(a) => a.name(),
        }
    }

    #[must_use]
    pub fn kind(&self) -> NodeKind {
        match self {
            Self::Leaf(_) => NodeKind::Leaf,
            Self::Composite(_) => NodeKind::Composite,
            Self::Repeated(_) => NodeKind::Repeated,
            Self::Alias(_) => NodeKind::Alias,
        }
    }

    #[must_use]
    pub fn metadata(&self) -> &Metadata {
        match self {
            Self::Leaf(l) => &l.metadata,
            Self::Composite(c) => &c.metadata,
            Self::Repeated(r) => &r.metadata,
            Self::Alias(a) => a.metadata(),
        }
    }

    /// Direct children. Leaves and unresolved aliases have none.
    #[must_use]
    pub fn children(&self) -> &[Node] {
        match self {
            Self::Composite(c) => &c.children,
            Self::Repeated(r) => &r.children,
            Self::Leaf(_) | Self::Alias(_) => &[],
        }
    }

    /// Shallow copy of `(children, metadata)`.
    ///
    /// A leaf (or alias) decomposes into a one-element list holding itself,
    /// so the algebra can treat it as a single-field domain.
    #[must_use]
    pub fn decompose(&self) -> (Vec<Node>, Metadata) {
        match self {
            Self::Leaf(_) | Self::Alias(_) => (vec![self.clone()], self.metadata().clone()),
            Self::Composite(_) | Self::Repeated(_) => {
                (self.children().to_vec(), self.metadata().clone())
            }
        }
    }

    /// True for repeated nodes and for sequence-tagged aliases or metadata.
    #[must_use]
    pub fn is_seq(&self) -> bool {
        match self {
            Self::Repeated(_) => true,
            Self::Alias(a) => a.is_seq(),
            Self::Leaf(_) | Self::Composite(_) => self.metadata().is_seq(),
        }
    }

    /// True for nodes without children of their own (leaves and aliases).
    #[must_use]
    pub fn is_leaf_level(&self) -> bool {
        matches!(self, Self::Leaf(_) | Self::Alias(_))
    }

    /// Follows an alias to its resolved tree; other nodes return themselves.
    pub fn resolved(&self) -> Result<Node> {
        match self {
            Self::Alias(a) => a.resolve(),
            _ => Ok(self.clone()),
        }
    }

    /// Looks up a direct child by id, resolving aliases.
    pub fn field(&self, name: &str) -> Result<Option<Node>> {
        match self {
            Self::Composite(c) => c.field(name),
            Self::Repeated(r) if r.child().id() == name => r.child().resolved().map(Some),
            Self::Alias(a) => a.resolve()?.field(name),
            Self::Repeated(_) | Self::Leaf(_) => Ok(None),
        }
    }

    /// Clones this node under a new id. Children are shared.
    #[must_use]
    pub fn with_id(&self, id: &str) -> Node {
        self.reshaped(id, self.metadata().clone())
    }

    pub(crate) fn reshaped(&self, id: &str, metadata: Metadata) -> Node {
        match self {
            Self::Leaf(_) => Leaf::with_metadata(id, metadata).into(),
            Self::Composite(c) => Composite::from_parts(id, c.children.clone(), metadata).into(),
            Self::Repeated(r) => Repeated::from_parts(id, r.children.clone(), metadata).into(),
            Self::Alias(a) => a.renamed(id, metadata).into(),
        }
    }

    /// Fully-qualified leaf paths under this node.
    #[must_use]
    pub fn declared(&self) -> Vec<String> {
        algebra::declared(self)
    }

    /// Builds the id of a descendant path under this node.
    #[must_use]
    pub fn child_id(&self, sub_id: &str) -> String {
        algebra::child_id(self, sub_id)
    }

    #[must_use]
    pub fn as_composite(&self) -> Option<&Arc<Composite>> {
        match self {
            Self::Composite(c) => Some(c),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_repeated(&self) -> Option<&Arc<Repeated>> {
        match self {
            Self::Repeated(r) => Some(r),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_leaf(&self) -> Option<&Arc<Leaf>> {
        match self {
            Self::Leaf(l) => Some(l),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_alias(&self) -> Option<&Arc<Alias>> {
        match self {
            Self::Alias(a) => Some(a),
            _ => None,
        }
    }

    /// True when both handles point at the same node.
    #[must_use]
    pub fn ptr_eq(&self, other: &Node) -> bool {
        match (self, other) {
            (Self::Leaf(a), Self::Leaf(b)) => Arc::ptr_eq(a, b),
            (Self::Composite(a), Self::Composite(b)) => Arc::ptr_eq(a, b),
            (Self::Repeated(a), Self::Repeated(b)) => Arc::ptr_eq(a, b),
            (Self::Alias(a), Self::Alias(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Leaf(l) => l.fmt(f),
            Self::Composite(c) => c.fmt(f),
            Self::Repeated(r) => r.fmt(f),
            Self::Alias(a) => a.fmt(f),
        }
    }
}

impl From<Leaf> for Node {
    fn from(l: Leaf) -> Self {
        Self::Leaf(Arc::new(l))
    }
}

impl From<Composite> for Node {
    fn from(c: Composite) -> Self {
        Self::Composite(Arc::new(c))
    }
}

impl From<Repeated> for Node {
    fn from(r: Repeated) -> Self {
        Self::Repeated(Arc::new(r))
    }
}

impl From<Alias> for Node {
    fn from(a: Alias) -> Self {
        Self::Alias(Arc::new(a))
    }
}

impl From<Arc<Composite>> for Node {
    fn from(c: Arc<Composite>) -> Self {
        Self::Composite(c)
    }
}

impl From<Arc<Repeated>> for Node {
    fn from(r: Arc<Repeated>) -> Self {
        Self::Repeated(r)
    }
}

/// A named field (atom).
#[derive(Debug, Clone)]
pub struct Leaf {
    id: String,
    metadata: Metadata,
}

impl Leaf {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self::with_metadata(id, Metadata::new())
    }

    #[must_use]
    pub fn with_metadata(id: impl Into<String>, metadata: Metadata) -> Self {
        Self {
            id: id.into(),
            metadata,
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }
}

/// An ordered set of uniquely-named children (domain).
#[derive(Debug, Clone)]
pub struct Composite {
    id: String,
    children: Vec<Node>,
    metadata: Metadata,
    index: OnceLock<HashMap<String, usize>>,
}

impl Composite {
    /// Builds a composite, rejecting duplicate child ids.
    pub fn new(id: impl Into<String>, children: Vec<Node>, metadata: Metadata) -> Result<Self> {
        let id = id.into();
        ensure_unique(&id, &children)?;
        Ok(Self::from_parts(id, children, metadata))
    }

    #[must_use]
    pub fn empty(id: impl Into<String>) -> Self {
        Self::from_parts(id, Vec::new(), Metadata::new())
    }

    /// Callers guarantee child ids are unique.
    pub(crate) fn from_parts(
        id: impl Into<String>,
        children: Vec<Node>,
        metadata: Metadata,
    ) -> Self {
        Self {
            id: id.into(),
            children,
            metadata,
            index: OnceLock::new(),
        }
    }

    /// Appends a field during construction.
    ///
    /// The same uniqueness rule as [`crate::compose`] applies: a field whose
    /// id is already present is rejected with [`Error::Conflict`].
    pub fn with_field(mut self, field: impl Into<Node>) -> Result<Self> {
        let field = field.into();
        if self.children.iter().any(|c| c.id() == field.id()) {
            return Err(Error::Conflict {
                id: field.id().to_string(),
                left: self.id.clone(),
                right: self.id,
            });
        }
        self.children.push(field);
        self.index = OnceLock::new();
        Ok(self)
    }

    /// Replaces the metadata.
    #[must_use]
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn children(&self) -> &[Node] {
        &self.children
    }

    #[must_use]
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.children.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    #[must_use]
    pub fn decompose(&self) -> (Vec<Node>, Metadata) {
        (self.children.clone(), self.metadata.clone())
    }

    fn index(&self) -> &HashMap<String, usize> {
        self.index.get_or_init(|| {
            self.children
                .iter()
                .enumerate()
                .map(|(i, c)| (c.id().to_string(), i))
                .collect()
        })
    }

    /// The raw child with this id; aliases are returned unresolved.
    #[must_use]
    pub fn child(&self, name: &str) -> Option<&Node> {
        self.index().get(name).map(|&i| &self.children[i])
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.index().contains_key(name)
    }

    /// The child with this id, with aliases swapped for their resolved tree.
    pub fn field(&self, name: &str) -> Result<Option<Node>> {
        self.child(name).map(Node::resolved).transpose()
    }

    #[must_use]
    pub fn declared(&self) -> Vec<String> {
        algebra::declared_children(&self.children)
    }

    /// Composes two nodes; see [`crate::compose`].
    pub fn compose(&self, other: &Node) -> Result<Composite> {
        algebra::compose(&Node::from(self.clone()), other)
    }

    /// Chaining form of [`Composite::compose`].
    pub fn and(self, other: impl Into<Node>) -> Result<Composite> {
        algebra::compose(&Node::from(self), &other.into())
    }

    pub fn include<P>(&self, predicate: P, deep: bool) -> Composite
    where
        P: Fn(&Node) -> bool,
    {
        algebra::include_composite(self, &predicate, deep)
    }

    pub fn exclude<P>(&self, predicate: P, deep: bool) -> Composite
    where
        P: Fn(&Node) -> bool,
    {
        algebra::include_composite(self, &|n: &Node| !predicate(n), deep)
    }

    /// Drops the direct children with these ids.
    #[must_use]
    pub fn cut<S: AsRef<str>>(&self, ids: &[S]) -> Composite {
        self.exclude(|n| ids.iter().any(|id| id.as_ref() == n.id()), false)
    }

    /// Keeps only the direct children with these ids.
    #[must_use]
    pub fn only<S: AsRef<str>>(&self, ids: &[S]) -> Composite {
        self.include(|n| ids.iter().any(|id| id.as_ref() == n.id()), false)
    }

    /// Renames nodes anywhere in the tree; see [`crate::rename`].
    pub fn rename<I, K, V>(&self, names: I) -> Result<Node>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let names: HashMap<String, String> =
            names.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        algebra::rename(&Node::from(self.clone()), &names)
    }
}

/// A sequence node: exactly one element template.
#[derive(Debug, Clone)]
pub struct Repeated {
    id: String,
    children: Vec<Node>,
    metadata: Metadata,
}

impl Repeated {
    /// Builds a sequence node. Fails unless exactly one child is given.
    ///
    /// The sequence marker is added to `metadata` if missing.
    pub fn new(id: impl Into<String>, children: Vec<Node>, metadata: Metadata) -> Result<Self> {
        let id = id.into();
        if children.len() != 1 {
            return Err(Error::MalformedSequence {
                id,
                count: children.len(),
            });
        }
        Ok(Self::from_parts(id, children, metadata))
    }

    /// Sequence of `child` with default metadata.
    #[must_use]
    pub fn of(id: impl Into<String>, child: impl Into<Node>) -> Self {
        Self::from_parts(id, vec![child.into()], Metadata::seq())
    }

    /// Callers guarantee `children.len() == 1`.
    pub(crate) fn from_parts(
        id: impl Into<String>,
        children: Vec<Node>,
        mut metadata: Metadata,
    ) -> Self {
        debug_assert_eq!(children.len(), 1);
        if !metadata.is_seq() {
            metadata.mark_seq();
        }
        Self {
            id: id.into(),
            children,
            metadata,
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The element template.
    #[must_use]
    pub fn child(&self) -> &Node {
        &self.children[0]
    }

    #[must_use]
    pub fn children(&self) -> &[Node] {
        &self.children
    }

    #[must_use]
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    #[must_use]
    pub fn decompose(&self) -> (Vec<Node>, Metadata) {
        (self.children.clone(), self.metadata.clone())
    }

    #[must_use]
    pub fn declared(&self) -> Vec<String> {
        algebra::declared_children(&self.children)
    }
}

pub(crate) fn ensure_unique(id: &str, children: &[Node]) -> Result<()> {
    let mut seen = HashSet::with_capacity(children.len());
    for child in children {
        if !seen.insert(child.id()) {
            return Err(Error::Conflict {
                id: child.id().to_string(),
                left: id.to_string(),
                right: id.to_string(),
            });
        }
    }
    Ok(())
}
