//! The projection entry point.

use crate::scene::{Scene, SceneStore};
use crate::wrapper::{FieldWrapper, ModelWrapper, SequenceWrapper, Wrapper};
use crate::{Error, LookupConfig, Result};
use katashiro_schema::{Composite, Node};
use katashiro_types::Value;
use std::sync::Arc;
use tracing::debug;

/// Everything an [`AdHocConstructor`] gets to work with.
pub struct AdHocRequest<'a> {
    pub scene: &'a Scene,
    /// Schema of the object the attribute was read from.
    pub parent: &'a Composite,
    pub attribute: &'a str,
    /// The object the attribute was read from.
    pub owner: &'a Value,
    /// The attribute's value, if the object has one.
    pub value: Option<&'a Value>,
}

/// Builds a schema for an attribute its parent schema does not declare.
///
/// Nodes returned here are cached in the scene like declared fields, so an
/// implementation must give the same answer for every instance of a type.
pub trait AdHocConstructor: Send + Sync {
    fn construct(&self, request: &AdHocRequest<'_>) -> Result<Node>;
}

impl<F> AdHocConstructor for F
where
    F: Fn(&AdHocRequest<'_>) -> Result<Node> + Send + Sync,
{
    fn construct(&self, request: &AdHocRequest<'_>) -> Result<Node> {
        self(request)
    }
}

/// Rejects every undeclared attribute.
#[derive(Debug, Clone, Copy, Default)]
pub struct Strict;

impl AdHocConstructor for Strict {
    fn construct(&self, request: &AdHocRequest<'_>) -> Result<Node> {
        Err(unresolved(request))
    }
}

/// Resolves an undeclared attribute through the root binding of its value's
/// type, i.e. the schema that type was first projected through at top level
/// in the same scene.
#[derive(Debug, Clone, Copy, Default)]
pub struct FromRootBindings;

impl AdHocConstructor for FromRootBindings {
    fn construct(&self, request: &AdHocRequest<'_>) -> Result<Node> {
        request
            .value
            .filter(|v| v.is_object())
            .and_then(|v| request.scene.root(v.type_tag()))
            .map(|root| root.with_id(request.attribute))
            .ok_or_else(|| unresolved(request))
    }
}

fn unresolved(request: &AdHocRequest<'_>) -> Error {
    Error::UnresolvedAttribute {
        attribute: request.attribute.to_string(),
        schema: request.parent.id().to_string(),
    }
}

/// Binds values to schema nodes within one scene.
///
/// Cheap to clone; every wrapper holds a clone so it can build its children.
#[derive(Clone)]
pub struct Lookup {
    scene: Arc<Scene>,
    ad_hoc: Arc<dyn AdHocConstructor>,
    index_access: bool,
}

impl Lookup {
    /// A lookup over `scene` in the process-wide store.
    pub fn new(scene: &str) -> Self {
        Self::in_store(SceneStore::global(), scene)
    }

    pub fn in_store(store: &SceneStore, scene: &str) -> Self {
        Self {
            scene: store.scene(scene),
            ad_hoc: Arc::new(Strict),
            index_access: true,
        }
    }

    pub fn from_config(store: &SceneStore, config: &LookupConfig) -> Self {
        Self {
            index_access: config.index_access,
            ..Self::in_store(store, &config.scene)
        }
    }

    /// Replaces the hook used for undeclared attributes.
    #[must_use]
    pub fn with_ad_hoc(mut self, hook: impl AdHocConstructor + 'static) -> Self {
        self.ad_hoc = Arc::new(hook);
        self
    }

    #[must_use]
    pub fn with_index_access(mut self, enabled: bool) -> Self {
        self.index_access = enabled;
        self
    }

    pub fn scene(&self) -> &Arc<Scene> {
        &self.scene
    }

    pub fn index_access(&self) -> bool {
        self.index_access
    }

    /// Projects `value` through `node`.
    ///
    /// For object values the node is also recorded as the root binding of
    /// the value's type in this scene.
    pub fn project(&self, value: impl Into<Value>, node: &Node) -> Result<Arc<Wrapper>> {
        let value = value.into();
        if value.is_object() {
            self.scene.bind_root(value.type_tag(), &node.resolved()?);
        }
        self.create_wrapper(value, node)
    }

    /// Builds the wrapper matching the node's kind. Aliases are resolved
    /// first.
    pub fn create_wrapper(&self, value: Value, node: &Node) -> Result<Arc<Wrapper>> {
        let wrapper = match node.resolved()? {
            Node::Leaf(leaf) => Wrapper::Field(FieldWrapper::new(value, leaf)),
            Node::Repeated(seq) => {
                Wrapper::Sequence(SequenceWrapper::new(value, seq, self.clone())?)
            }
            Node::Composite(composite) => {
                Wrapper::Model(ModelWrapper::new(value, composite, self.clone()))
            }
            Node::Alias(alias) => {
                // `resolved` never hands back an alias.
                return Err(katashiro_schema::Error::CyclicAlias(alias.name().to_string()).into());
            }
        };
        Ok(Arc::new(wrapper))
    }

    /// Finds the schema of attribute `attribute` on `parent_value`, which is
    /// projected through `parent`.
    ///
    /// Declared fields win; anything else goes to the ad hoc hook. Successful
    /// answers are shared by every value of the same type projected through
    /// this same `parent` in the scene.
    pub fn resolve_child_schema(
        &self,
        parent_value: &Value,
        parent: &Arc<Composite>,
        attribute: &str,
    ) -> Result<Node> {
        self.scene
            .get_or_resolve(parent_value.type_tag(), parent, attribute, || {
                if let Some(node) = parent.field(attribute)? {
                    return Ok(node);
                }
                debug!(
                    scene = %self.scene.name(),
                    schema = %parent.id(),
                    attribute = %attribute,
                    "constructing ad hoc schema"
                );
                let value = parent_value.get_field(attribute);
                self.ad_hoc.construct(&AdHocRequest {
                    scene: &self.scene,
                    parent,
                    attribute,
                    owner: parent_value,
                    value: value.as_ref(),
                })
            })
    }
}

impl std::fmt::Debug for Lookup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lookup")
            .field("scene", &self.scene.name())
            .field("index_access", &self.index_access)
            .finish_non_exhaustive()
    }
}
