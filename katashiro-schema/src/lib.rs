//! Schema trees and the domain algebra.
//!
//! A schema is a tree of [`Node`]s:
//! - [`Leaf`]: a named field with metadata
//! - [`Composite`]: an ordered set of uniquely-named children
//! - [`Repeated`]: exactly one element template, "zero or more of this"
//! - [`Alias`]: a named forward reference, resolved once on first use
//!
//! The algebra ([`compose`], [`include`], [`exclude`], [`rename`], plus
//! `cut` / `only` on [`Composite`]) never mutates its inputs; it returns new
//! trees that share unchanged subtrees with the originals.
//!
//! Named and mutually-recursive schemas are declared in a [`Registry`].

mod algebra;
mod node;
mod registry;
mod shorthand;

pub use algebra::{child_id, compose, declared, exclude, include, rename};
pub use node::{Composite, Leaf, Node, NodeKind, Repeated};
pub use registry::{Alias, Registry};
pub use shorthand::{Shape, shorthand};

pub use katashiro_types::{MetaValue, Metadata};

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while building or transforming schemas.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("conflict: field '{id}' appears in both {left} and {right}")]
    Conflict {
        id: String,
        left: String,
        right: String,
    },

    #[error("malformed sequence '{id}': expected exactly one child, got {count}")]
    MalformedSequence { id: String, count: usize },

    #[error("unknown schema: {0}")]
    UnknownSchema(String),

    #[error("alias '{0}' refers back to itself without a concrete target")]
    CyclicAlias(String),

    #[error("registry dropped before alias '{0}' was resolved")]
    RegistryDropped(String),
}
