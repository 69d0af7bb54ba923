//! Scene-scoped schema-resolution caches.
//!
//! A [`Scene`] remembers which schema node corresponds to "attribute X of a
//! value of type T projected through schema S". The answer does not depend
//! on the particular instance, so every projection started in the same
//! scene shares it. Schemas are told apart by identity: a cut view keeps
//! its source's id but gets its own entries.

use crate::Result;
use katashiro_schema::{Composite, Node};
use katashiro_types::TypeTag;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock, PoisonError, RwLock};
use tracing::{debug, trace};

/// Name of the default, unnamed scene.
pub const DEFAULT_SCENE: &str = "";

static GLOBAL: OnceLock<SceneStore> = OnceLock::new();

/// A set of named scenes.
///
/// Clones share the same scenes. [`SceneStore::global`] is the process-wide
/// default; tests build their own with [`SceneStore::new`].
#[derive(Clone, Default)]
pub struct SceneStore {
    scenes: Arc<RwLock<HashMap<String, Arc<Scene>>>>,
}

impl SceneStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide store, created on first use.
    pub fn global() -> &'static SceneStore {
        GLOBAL.get_or_init(SceneStore::new)
    }

    /// Returns the scene with this name, creating it if needed.
    pub fn scene(&self, name: &str) -> Arc<Scene> {
        if let Some(scene) = self
            .scenes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
        {
            return Arc::clone(scene);
        }

        let mut scenes = self.scenes.write().unwrap_or_else(PoisonError::into_inner);
        let scene = scenes.entry(name.to_string()).or_insert_with(|| {
            debug!(scene = %name, "creating scene");
            Arc::new(Scene::new(name))
        });
        Arc::clone(scene)
    }

    /// Names of all scenes created so far, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .scenes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.scenes.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every scene. Lookups holding a scene keep their own handle.
    pub fn reset(&self) {
        self.scenes.write().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

impl std::fmt::Debug for SceneStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SceneStore").field("scenes", &self.names()).finish()
    }
}

/// Cache key: (type of the parent value, parent schema address, attribute).
type SchemaKey = (TypeTag, usize, String);

/// A cached child schema. Holding the parent keeps its address from being
/// reused while the entry exists.
struct SchemaEntry {
    parent: Arc<Composite>,
    node: Node,
}

fn schema_key(tag: TypeTag, parent: &Arc<Composite>, attribute: &str) -> SchemaKey {
    (tag, Arc::as_ptr(parent).addr(), attribute.to_string())
}

/// One resolution namespace.
pub struct Scene {
    name: String,
    schemas: RwLock<HashMap<SchemaKey, SchemaEntry>>,
    roots: RwLock<HashMap<TypeTag, Node>>,
    resolutions: AtomicUsize,
    hits: AtomicUsize,
}

/// Counters exposed by [`Scene::stats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SceneStats {
    /// Child schemas computed on a cache miss.
    pub resolutions: usize,
    /// Lookups answered from the cache.
    pub hits: usize,
    /// Cached child schemas.
    pub entries: usize,
    /// Root bindings recorded by `project`.
    pub roots: usize,
}

impl Scene {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            schemas: RwLock::new(HashMap::new()),
            roots: RwLock::new(HashMap::new()),
            resolutions: AtomicUsize::new(0),
            hits: AtomicUsize::new(0),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the cached schema for `(tag, parent, attribute)`, computing it
    /// with `resolve` on a miss.
    ///
    /// `parent` is matched by identity, not by id, so two composites sharing
    /// an id never see each other's children. Two threads may both miss and
    /// both compute; the first insert wins and the loser adopts the stored
    /// node. Errors are returned as-is and leave the cache untouched.
    pub fn get_or_resolve<F>(
        &self,
        tag: TypeTag,
        parent: &Arc<Composite>,
        attribute: &str,
        resolve: F,
    ) -> Result<Node>
    where
        F: FnOnce() -> Result<Node>,
    {
        let key = schema_key(tag, parent, attribute);
        if let Some(entry) = self
            .schemas
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
            .filter(|entry| Arc::ptr_eq(&entry.parent, parent))
        {
            self.hits.fetch_add(1, Ordering::Relaxed);
            trace!(
                scene = %self.name,
                parent = %parent.id(),
                attribute = %attribute,
                "schema cache hit"
            );
            return Ok(entry.node.clone());
        }

        let node = resolve()?;
        self.resolutions.fetch_add(1, Ordering::Relaxed);
        debug!(
            scene = %self.name,
            type_name = tag.short_name(),
            parent = %parent.id(),
            attribute = %attribute,
            schema = %node.id(),
            "resolved child schema"
        );

        let mut schemas = self.schemas.write().unwrap_or_else(PoisonError::into_inner);
        let entry = schemas.entry(key).or_insert_with(|| SchemaEntry {
            parent: Arc::clone(parent),
            node,
        });
        Ok(entry.node.clone())
    }

    /// Records the schema a type was projected through at top level.
    ///
    /// The first binding for a type is kept; the stored node is returned.
    pub fn bind_root(&self, tag: TypeTag, node: &Node) -> Node {
        let mut roots = self.roots.write().unwrap_or_else(PoisonError::into_inner);
        roots
            .entry(tag)
            .or_insert_with(|| {
                debug!(
                    scene = %self.name,
                    type_name = tag.short_name(),
                    schema = %node.id(),
                    "bound root schema"
                );
                node.clone()
            })
            .clone()
    }

    /// The root schema bound for `tag`, if any.
    pub fn root(&self, tag: TypeTag) -> Option<Node> {
        self.roots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&tag)
            .cloned()
    }

    pub fn stats(&self) -> SceneStats {
        SceneStats {
            resolutions: self.resolutions.load(Ordering::Relaxed),
            hits: self.hits.load(Ordering::Relaxed),
            entries: self.schemas.read().unwrap_or_else(PoisonError::into_inner).len(),
            roots: self.roots.read().unwrap_or_else(PoisonError::into_inner).len(),
        }
    }

    /// Forgets every cached schema and root binding, and zeroes the counters.
    pub fn clear(&self) {
        self.schemas.write().unwrap_or_else(PoisonError::into_inner).clear();
        self.roots.write().unwrap_or_else(PoisonError::into_inner).clear();
        self.resolutions.store(0, Ordering::Relaxed);
        self.hits.store(0, Ordering::Relaxed);
    }
}

impl std::fmt::Debug for Scene {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scene")
            .field("name", &self.name)
            .field("stats", &self.stats())
            .finish()
    }
}
