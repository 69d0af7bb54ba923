//! Structural operators over schema trees.
//!
//! None of these mutate their inputs. Unchanged subtrees are shared with the
//! source tree; metadata maps are shallow-copied.

use crate::node::{Composite, Node, Repeated, ensure_unique};
use crate::{Error, Result};
use katashiro_types::Metadata;
use std::collections::{HashMap, HashSet};

/// Concatenates the children of `x` and `y` into a new composite named
/// after `x`.
///
/// The result's metadata is keyed by the operand ids
/// (`{x.id: x.metadata, y.id: y.metadata}`), not merged key by key.
/// Fails with [`Error::Conflict`] when a child id appears in both operands.
pub fn compose(x: &Node, y: &Node) -> Result<Composite> {
    let (mut fields, x_metadata) = x.decompose();
    let (y_fields, y_metadata) = y.decompose();

    let candidates: HashSet<&str> = fields.iter().map(Node::id).collect();
    if let Some(dup) = y_fields.iter().find(|f| candidates.contains(f.id())) {
        return Err(Error::Conflict {
            id: dup.id().to_string(),
            left: x.id().to_string(),
            right: y.id().to_string(),
        });
    }
    fields.extend(y_fields);

    let metadata = Metadata::new()
        .with(x.id(), x_metadata)
        .with(y.id(), y_metadata);
    Ok(Composite::from_parts(x.id(), fields, metadata))
}

/// Keeps the parts of `node` accepted by `predicate`.
///
/// With `deep`, the predicate is applied at leaf level only (leaves and
/// aliases); composites and sequences survive when at least one descendant
/// does, and empty ones are dropped from their parent. Without `deep`, the
/// predicate is applied to the direct children, which are kept as-is.
///
/// In both modes, metadata entries keyed by a surviving child's id are
/// carried over. If nothing survives, the result is an empty composite
/// named after `node`.
pub fn include<P>(node: &Node, predicate: P, deep: bool) -> Node
where
    P: Fn(&Node) -> bool,
{
    let kept = if deep {
        include_deep(node, &predicate)
    } else {
        include_shallow(node, &predicate)
    };
    kept.unwrap_or_else(|| Composite::empty(node.id()).into())
}

/// `include` with the predicate negated.
pub fn exclude<P>(node: &Node, predicate: P, deep: bool) -> Node
where
    P: Fn(&Node) -> bool,
{
    include(node, |n: &Node| !predicate(n), deep)
}

pub(crate) fn include_composite(
    composite: &Composite,
    predicate: &dyn Fn(&Node) -> bool,
    deep: bool,
) -> Composite {
    let (children, metadata) = if deep {
        filter_deep(composite.children(), composite.metadata(), predicate)
    } else {
        filter_shallow(composite.children(), composite.metadata(), predicate)
    };
    Composite::from_parts(composite.id(), children, metadata)
}

fn include_deep(node: &Node, predicate: &dyn Fn(&Node) -> bool) -> Option<Node> {
    match node {
        Node::Leaf(_) | Node::Alias(_) => predicate(node).then(|| node.clone()),
        Node::Composite(c) => {
            let kept = include_composite(c, predicate, true);
            (!kept.is_empty()).then(|| kept.into())
        }
        Node::Repeated(r) => {
            let (children, metadata) = filter_deep(r.children(), r.metadata(), predicate);
            (!children.is_empty()).then(|| Repeated::from_parts(r.id(), children, metadata).into())
        }
    }
}

fn include_shallow(node: &Node, predicate: &dyn Fn(&Node) -> bool) -> Option<Node> {
    match node {
        Node::Leaf(_) | Node::Alias(_) => predicate(node).then(|| node.clone()),
        Node::Composite(c) => Some(include_composite(c, predicate, false).into()),
        Node::Repeated(r) => {
            let (children, metadata) = filter_shallow(r.children(), r.metadata(), predicate);
            (!children.is_empty()).then(|| Repeated::from_parts(r.id(), children, metadata).into())
        }
    }
}

fn filter_deep(
    children: &[Node],
    metadata: &Metadata,
    predicate: &dyn Fn(&Node) -> bool,
) -> (Vec<Node>, Metadata) {
    let kept: Vec<Node> = children
        .iter()
        .filter_map(|c| include_deep(c, predicate))
        .collect();
    let metadata = carry_metadata(&kept, metadata);
    (kept, metadata)
}

fn filter_shallow(
    children: &[Node],
    metadata: &Metadata,
    predicate: &dyn Fn(&Node) -> bool,
) -> (Vec<Node>, Metadata) {
    let kept: Vec<Node> = children.iter().filter(|&c| predicate(c)).cloned().collect();
    let metadata = carry_metadata(&kept, metadata);
    (kept, metadata)
}

fn carry_metadata(kept: &[Node], metadata: &Metadata) -> Metadata {
    kept.iter()
        .filter_map(|c| metadata.get(c.id()).map(|v| (c.id().to_string(), v.clone())))
        .collect()
}

/// Clones `node` with ids substituted per `names`, the root included.
///
/// Metadata is copied verbatim and subtrees without renamed nodes are
/// shared. Fails with [`Error::Conflict`] if a rename makes two siblings
/// share an id.
pub fn rename(node: &Node, names: &HashMap<String, String>) -> Result<Node> {
    let new_id = names.get(node.id()).map(String::as_str);
    match node {
        Node::Leaf(_) | Node::Alias(_) => Ok(match new_id {
            Some(id) => node.with_id(id),
            None => node.clone(),
        }),
        Node::Composite(c) => {
            let children = rename_all(c.children(), names)?;
            let id = new_id.unwrap_or(c.id());
            ensure_unique(id, &children)?;
            Ok(Composite::from_parts(id, children, c.metadata().clone()).into())
        }
        Node::Repeated(r) => {
            let children = rename_all(r.children(), names)?;
            let id = new_id.unwrap_or(r.id());
            Ok(Repeated::from_parts(id, children, r.metadata().clone()).into())
        }
    }
}

fn rename_all(children: &[Node], names: &HashMap<String, String>) -> Result<Vec<Node>> {
    children.iter().map(|c| rename(c, names)).collect()
}

/// Id of the path `sub_id` below `parent`.
///
/// `"person.name"` under a plain node `family` is `"family.person.name"`;
/// under a sequence `children` it is `"children[].name"` (the element
/// template's own id is replaced by `[]`).
#[must_use]
pub fn child_id(parent: &Node, sub_id: &str) -> String {
    join_path(parent.id(), parent.is_seq(), sub_id)
}

pub(crate) fn join_path(parent: &str, seq: bool, sub_id: &str) -> String {
    if !seq {
        return format!("{parent}.{sub_id}");
    }
    match sub_id.split_once('.') {
        Some((_, tail)) => format!("{parent}[].{tail}"),
        None => format!("{parent}[]"),
    }
}

/// Fully-qualified leaf paths under `node`.
///
/// Aliases contribute their own id and are not expanded, so cyclic schemas
/// terminate.
#[must_use]
pub fn declared(node: &Node) -> Vec<String> {
    declared_children(node.children())
}

pub(crate) fn declared_children(children: &[Node]) -> Vec<String> {
    let mut paths = Vec::new();
    for child in children {
        match child {
            Node::Leaf(_) | Node::Alias(_) => paths.push(child.id().to_string()),
            Node::Composite(_) | Node::Repeated(_) => {
                for sub in declared(child) {
                    paths.push(child_id(child, &sub));
                }
            }
        }
    }
    paths
}
