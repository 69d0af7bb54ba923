//! Lazy projection of runtime values through schema trees.
//!
//! [`Lookup::project`] pairs a value with a schema node and returns a
//! [`Wrapper`]:
//! - [`FieldWrapper`] for leaves, with `serialize()` / `deserialize()` through
//!   the leaf's metadata hooks
//! - [`SequenceWrapper`] for repeated nodes, which lazily wraps each element
//! - [`ModelWrapper`] for composites, which resolves attributes on first access
//!
//! Two caches keep navigation cheap. Each wrapper memoizes its children, so
//! navigating the same path twice yields the same `Arc`. Each [`Scene`]
//! memoizes which schema node corresponds to "attribute X of type T under
//! schema S", so that work is shared by every instance projected in the
//! scene.

mod config;
mod lookup;
mod scene;
mod wrapper;

pub use config::LookupConfig;
pub use lookup::{AdHocConstructor, AdHocRequest, FromRootBindings, Lookup, Strict};
pub use scene::{DEFAULT_SCENE, Scene, SceneStats, SceneStore};
pub use wrapper::{FieldWrapper, ModelWrapper, SequenceWrapper, Wrapper};

pub use katashiro_types::{FieldAccessor, JsonObject, MetaValue, Metadata, TypeTag, Value};

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while projecting values.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("attribute not found: '{attribute}' is not declared by '{schema}'")]
    UnresolvedAttribute { attribute: String, schema: String },

    #[error("value of type {type_name} has no attribute '{attribute}'")]
    MissingValue {
        attribute: String,
        type_name: String,
    },

    #[error("cannot read '{attribute}' of '{schema}': value is not an object")]
    NotAnObject { attribute: String, schema: String },

    #[error("value projected through sequence '{schema}' is not a list")]
    NotIterable { schema: String },

    #[error("'{schema}' is not a composite schema")]
    NotAModel { schema: String },

    #[error("index access on sequence '{schema}' is disabled")]
    IndexAccessDisabled { schema: String },

    #[error("schema error: {0}")]
    Schema(#[from] katashiro_schema::Error),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
