//! Runtime value and metadata types for Katashiro.
//!
//! This crate defines the representation-agnostic types that the schema
//! algebra and the projection engine both depend on:
//! - [`Value`]: a runtime value that can be projected through a schema
//! - [`FieldAccessor`]: the "get named field" contract objects implement
//! - [`TypeTag`]: the runtime class identity used as a cache key
//! - [`Metadata`] / [`MetaValue`]: free-form node annotations, including
//!   the `serialize` / `deserialize` hooks
//!
//! Schema nodes themselves live in `katashiro-schema`; wrappers live in
//! `katashiro-projection`.

mod metadata;
mod value;

pub use metadata::{DeserializeFn, MetaValue, Metadata, SerializeFn, keys};
pub use value::{FieldAccessor, JsonObject, TypeTag, Value};
