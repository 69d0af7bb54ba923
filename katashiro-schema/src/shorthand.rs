//! Compact tree construction.
//!
//! ```
//! use katashiro_schema::{Metadata, Shape, shorthand};
//!
//! let school = shorthand(
//!     "school",
//!     vec![
//!         Shape::from("name"),
//!         Shape::group_with(
//!             "students",
//!             vec![Shape::group("student", vec!["name".into(), "grade".into()])],
//!             Metadata::seq(),
//!         ),
//!     ],
//!     None,
//! )
//! .unwrap();
//! assert_eq!(school.declared(), vec!["name", "students[].name", "students[].grade"]);
//! ```

use crate::node::{Composite, Leaf, Node, Repeated};
use crate::Result;
use katashiro_types::Metadata;

/// One entry of a [`shorthand`] description.
#[derive(Debug, Clone)]
pub enum Shape {
    /// A plain leaf.
    Field(String),
    /// A nested group. Sequence-tagged metadata makes it a [`Repeated`].
    Group(String, Vec<Shape>, Option<Metadata>),
    /// An existing tree placed under a new id.
    Embed(String, Node),
}

impl Shape {
    #[must_use]
    pub fn field(id: impl Into<String>) -> Self {
        Self::Field(id.into())
    }

    #[must_use]
    pub fn group(id: impl Into<String>, shapes: Vec<Shape>) -> Self {
        Self::Group(id.into(), shapes, None)
    }

    #[must_use]
    pub fn group_with(id: impl Into<String>, shapes: Vec<Shape>, metadata: Metadata) -> Self {
        Self::Group(id.into(), shapes, Some(metadata))
    }

    #[must_use]
    pub fn embed(id: impl Into<String>, node: impl Into<Node>) -> Self {
        Self::Embed(id.into(), node.into())
    }
}

impl From<&str> for Shape {
    fn from(id: &str) -> Self {
        Self::field(id)
    }
}

/// Builds a tree from a nested description.
///
/// Duplicate ids among siblings fail with [`crate::Error::Conflict`]; a
/// sequence-tagged group with other than one entry fails with
/// [`crate::Error::MalformedSequence`].
pub fn shorthand(id: &str, shapes: Vec<Shape>, metadata: Option<Metadata>) -> Result<Node> {
    let metadata = metadata.unwrap_or_default();
    let mut domain = Composite::empty(id);
    for shape in shapes {
        let field: Node = match shape {
            Shape::Field(id) => Leaf::new(id).into(),
            Shape::Group(id, shapes, metadata) => shorthand(&id, shapes, metadata)?,
            Shape::Embed(id, node) => node.with_id(&id),
        };
        domain = domain.with_field(field)?;
    }

    if metadata.is_seq() {
        let (children, _) = domain.decompose();
        Ok(Repeated::new(id, children, metadata)?.into())
    } else {
        Ok(domain.with_metadata(metadata).into())
    }
}
