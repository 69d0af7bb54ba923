//! Named schemas and forward references.
//!
//! Schemas that refer to each other by name (`Odd.next -> Even`,
//! `Even.next -> Odd`) are declared in two phases: every name is registered
//! first, and each [`Alias`] looks its target up only on first use.

use crate::node::{Node, Repeated};
use crate::{Error, Result, algebra};
use katashiro_types::Metadata;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, Mutex, OnceLock, PoisonError, RwLock, Weak};
use std::thread::{self, ThreadId};
use tracing::debug;

#[derive(Default)]
struct RegistryInner {
    schemas: RwLock<HashMap<String, Node>>,
}

/// A name → schema map.
///
/// Cloning a `Registry` yields another handle to the same map.
#[derive(Clone, Default)]
pub struct Registry {
    inner: Arc<RegistryInner>,
}

static GLOBAL: OnceLock<Registry> = OnceLock::new();

impl Registry {
    /// Creates an isolated, empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide default registry. Cleared only by [`Registry::reset`].
    pub fn global() -> &'static Registry {
        GLOBAL.get_or_init(Registry::new)
    }

    /// Registers `node` under `name`, replacing any previous entry.
    pub fn register(&self, name: impl Into<String>, node: impl Into<Node>) {
        let name = name.into();
        let node = node.into();
        debug!(name = %name, kind = %node.kind(), "Registering schema");
        self.write().insert(name, node);
    }

    /// Registers `node` under its own id and returns it.
    pub fn declare(&self, node: impl Into<Node>) -> Node {
        let node = node.into();
        self.register(node.id().to_string(), node.clone());
        node
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<Node> {
        self.read().get(name).cloned()
    }

    /// Looks up `name` and follows it if it is an alias.
    pub fn resolve(&self, name: &str) -> Result<Node> {
        self.get(name)
            .ok_or_else(|| Error::UnknownSchema(name.to_string()))?
            .resolved()
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.read().contains_key(name)
    }

    /// Registered names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.read().keys().cloned().collect();
        names.sort();
        names
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Removes every registered schema.
    pub fn reset(&self) {
        self.write().clear();
    }

    /// Creates an alias `name` referring to the schema registered as
    /// `referenced`. The alias itself is not registered.
    ///
    /// When `metadata` carries the sequence marker the alias resolves to a
    /// [`Repeated`] node.
    pub fn alias(
        &self,
        name: impl Into<String>,
        referenced: impl Into<String>,
        metadata: Metadata,
    ) -> Node {
        Alias {
            name: name.into(),
            referenced: referenced.into(),
            metadata,
            registry: Arc::downgrade(&self.inner),
            resolved: OnceLock::new(),
            resolving: Mutex::new(HashSet::new()),
        }
        .into()
    }

    /// Sequence alias: `name` is zero or more of `referenced`.
    pub fn seq_alias(&self, name: impl Into<String>, referenced: impl Into<String>) -> Node {
        self.alias(name, referenced, Metadata::seq())
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, Node>> {
        self.inner.schemas.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, Node>> {
        self.inner.schemas.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry").field("names", &self.names()).finish()
    }
}

/// A named reference to another registered schema, resolved once.
pub struct Alias {
    name: String,
    referenced: String,
    metadata: Metadata,
    registry: Weak<RegistryInner>,
    resolved: OnceLock<Node>,
    /// Threads currently inside `resolve` for this alias.
    resolving: Mutex<HashSet<ThreadId>>,
}

impl Alias {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name of the schema this alias stands for.
    #[must_use]
    pub fn referenced(&self) -> &str {
        &self.referenced
    }

    #[must_use]
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    #[must_use]
    pub fn is_seq(&self) -> bool {
        self.metadata.is_seq()
    }

    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.resolved.get().is_some()
    }

    /// Builds the id of a descendant path under this alias.
    #[must_use]
    pub fn child_id(&self, sub_id: &str) -> String {
        algebra::join_path(&self.name, self.is_seq(), sub_id)
    }

    /// The referenced tree cloned under this alias's name.
    ///
    /// A sequence alias wraps the clone (named after the referenced schema)
    /// in a [`Repeated`] node named after the alias. Otherwise the alias
    /// metadata is layered over the referenced metadata. The result is
    /// computed once; if two threads race, the first stored result wins.
    pub fn resolve(&self) -> Result<Node> {
        if let Some(node) = self.resolved.get() {
            return Ok(node.clone());
        }

        let _guard = ResolvingGuard::enter(self)?;
        let registry = self
            .registry
            .upgrade()
            .ok_or_else(|| Error::RegistryDropped(self.name.clone()))?;
        let target = registry
            .schemas
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&self.referenced)
            .cloned()
            .ok_or_else(|| Error::UnknownSchema(self.referenced.clone()))?;
        let target = target.resolved()?;

        let node: Node = if self.is_seq() {
            let element = target.with_id(&self.referenced);
            Repeated::new(self.name.clone(), vec![element], self.metadata.clone())?.into()
        } else {
            let mut metadata = target.metadata().clone();
            metadata.merge(&self.metadata);
            target.reshaped(&self.name, metadata)
        };
        debug!(
            alias = %self.name,
            referenced = %self.referenced,
            kind = %node.kind(),
            "Resolved alias"
        );
        Ok(self.resolved.get_or_init(|| node).clone())
    }

    pub(crate) fn renamed(&self, name: &str, metadata: Metadata) -> Alias {
        Alias {
            name: name.to_string(),
            referenced: self.referenced.clone(),
            metadata,
            registry: self.registry.clone(),
            resolved: OnceLock::new(),
            resolving: Mutex::new(HashSet::new()),
        }
    }
}

impl fmt::Debug for Alias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Alias")
            .field("name", &self.name)
            .field("referenced", &self.referenced)
            .field("seq", &self.is_seq())
            .field("resolved", &self.is_resolved())
            .finish()
    }
}

/// Marks an alias as being resolved by the current thread.
struct ResolvingGuard<'a> {
    alias: &'a Alias,
    thread: ThreadId,
}

impl<'a> ResolvingGuard<'a> {
    fn enter(alias: &'a Alias) -> Result<Self> {
        let thread = thread::current().id();
        let mut resolving = alias.resolving.lock().unwrap_or_else(PoisonError::into_inner);
        if !resolving.insert(thread) {
            return Err(Error::CyclicAlias(alias.name.clone()));
        }
        Ok(Self { alias, thread })
    }
}

impl Drop for ResolvingGuard<'_> {
    fn drop(&mut self) {
        self.alias
            .resolving
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.thread);
    }
}
