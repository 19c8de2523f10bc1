//! The query tree.
//!
//! Nodes live in an arena ([`QueryTree`]) and refer to each other through
//! [`NodeId`] handles. A node owns its children through constraint slots
//! (grouped and virtual-field constraints) and include slots; the parent is a
//! non-owning back-reference recorded with the slot that anchors the node.
//!
//! Four node kinds exist. `Main` is the root of a [`Query`].
//! `IncludeVirtualField` is the root of a projected relation and behaves like
//! `Main` for its own subtree. `Grouped` and `VirtualField` nodes only hold
//! constraints; selection, includes, directives and aliases called on them
//! are forwarded to the nearest ancestor that owns those concerns.

mod builder;
mod constraints;
mod fields;
mod handle;
mod include;
mod merge;
mod predicate;

pub use builder::{QueryBuilder, QueryMut};
pub use handle::{Query, QueryRef};
pub use include::IncludeVf;
pub use predicate::{FieldValue, GroupFn, Predicate, QuerySource, VfSource};

use std::cell::OnceCell;

use indexmap::IndexMap;

use crate::args::ArgList;
use crate::directive::Directives;
use crate::error::QueryError;
use crate::select::SelectSet;
use crate::siblings::SiblingRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Main,
    Grouped,
    VirtualField,
    IncludeVirtualField,
}

impl NodeKind {
    /// Which concerns a node of this kind handles itself.
    pub fn ownership(self) -> Ownership {
        match self {
            NodeKind::Main | NodeKind::IncludeVirtualField => Ownership::ALL,
            NodeKind::Grouped | NodeKind::VirtualField => Ownership::CONSTRAINTS_ONLY,
        }
    }

    /// Main and include nodes anchor their own sibling registry.
    pub fn is_top_level(self) -> bool {
        matches!(self, NodeKind::Main | NodeKind::IncludeVirtualField)
    }

    pub fn name(self) -> &'static str {
        match self {
            NodeKind::Main => "main",
            NodeKind::Grouped => "grouped",
            NodeKind::VirtualField => "virtual field",
            NodeKind::IncludeVirtualField => "include",
        }
    }
}

/// Per-kind table of locally owned concerns. A concern that is not owned is
/// forwarded to the parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ownership {
    pub select: bool,
    pub include: bool,
    pub directives: bool,
    pub alias: bool,
    pub constraints: bool,
}

impl Ownership {
    const ALL: Ownership = Ownership {
        select: true,
        include: true,
        directives: true,
        alias: true,
        constraints: true,
    };

    const CONSTRAINTS_ONLY: Ownership = Ownership {
        select: false,
        include: false,
        directives: false,
        alias: false,
        constraints: true,
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Concern {
    Select,
    Include,
    Directives,
    Alias,
}

impl Ownership {
    fn owns(&self, concern: Concern) -> bool {
        match concern {
            Concern::Select => self.select,
            Concern::Include => self.include,
            Concern::Directives => self.directives,
            Concern::Alias => self.alias,
        }
    }
}

/// Where a node hangs under its parent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Slot {
    Arg(usize),
    Include(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParentLink {
    pub node: NodeId,
    pub slot: Slot,
}

#[derive(Debug, Clone)]
pub struct QueryNode {
    kind: NodeKind,
    ownership: Ownership,
    model: Option<String>,
    constraints: ArgList,
    select: SelectSet,
    includes: IndexMap<String, IncludeVf>,
    directives: Directives,
    alias: Option<String>,
    parent: Option<ParentLink>,
    has_vf: bool,
    has_variables: bool,
    all_args_selected: bool,
    /// Nodes from the nearest top-level ancestor down to this node
    ancestors: OnceCell<Vec<NodeId>>,
    siblings: Option<SiblingRegistry>,
}

impl QueryNode {
    fn new(kind: NodeKind, model: Option<String>) -> Self {
        QueryNode {
            kind,
            ownership: kind.ownership(),
            model,
            constraints: ArgList::new(),
            select: SelectSet::new(),
            includes: IndexMap::new(),
            directives: Directives::new(),
            alias: None,
            parent: None,
            has_vf: false,
            has_variables: false,
            all_args_selected: false,
            ancestors: OnceCell::new(),
            siblings: kind.is_top_level().then(SiblingRegistry::default),
        }
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn ownership(&self) -> Ownership {
        self.ownership
    }

    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    pub fn constraints(&self) -> &ArgList {
        &self.constraints
    }

    pub fn select(&self) -> &SelectSet {
        &self.select
    }

    pub fn includes(&self) -> &IndexMap<String, IncludeVf> {
        &self.includes
    }

    pub fn directives(&self) -> &Directives {
        &self.directives
    }

    pub fn alias(&self) -> Option<&str> {
        self.alias.as_deref()
    }

    pub fn parent(&self) -> Option<&ParentLink> {
        self.parent.as_ref()
    }

    pub fn has_vf(&self) -> bool {
        self.has_vf
    }

    pub fn has_variables(&self) -> bool {
        self.has_variables
    }

    pub fn all_args_selected(&self) -> bool {
        self.all_args_selected
    }

    pub(crate) fn siblings(&self) -> Option<&SiblingRegistry> {
        self.siblings.as_ref()
    }
}

/// Arena holding every node of one query.
///
/// Slots of removed nodes are reused by later allocations, so a [`NodeId`]
/// must not be kept past the removal of its node.
#[derive(Debug, Clone, Default)]
pub struct QueryTree {
    nodes: Vec<Option<QueryNode>>,
    vacant: Vec<usize>,
}

impl QueryTree {
    pub(crate) fn alloc(&mut self, kind: NodeKind, model: Option<String>) -> NodeId {
        let node = Some(QueryNode::new(kind, model));
        match self.vacant.pop() {
            Some(slot) => {
                self.nodes[slot] = node;
                NodeId(slot)
            }
            None => {
                self.nodes.push(node);
                NodeId(self.nodes.len() - 1)
            }
        }
    }

    pub fn node(&self, id: NodeId) -> Result<&QueryNode, QueryError> {
        self.nodes
            .get(id.0)
            .and_then(Option::as_ref)
            .ok_or(QueryError::DetachedNode(id.0))
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> Result<&mut QueryNode, QueryError> {
        self.nodes
            .get_mut(id.0)
            .and_then(Option::as_mut)
            .ok_or(QueryError::DetachedNode(id.0))
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.node(id).is_ok()
    }

    /// Number of live nodes.
    pub fn len(&self) -> usize {
        self.nodes.len() - self.vacant.len()
    }

    /// Number of arena slots, live or vacant.
    pub fn capacity(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn set_parent(&mut self, id: NodeId, link: ParentLink) -> Result<(), QueryError> {
        self.node_mut(id)?.parent = Some(link);
        self.invalidate_ancestors(id)
    }

    fn invalidate_ancestors(&mut self, id: NodeId) -> Result<(), QueryError> {
        let node = self.node_mut(id)?;
        node.ancestors = OnceCell::new();
        for child in self.children(id)? {
            self.invalidate_ancestors(child)?;
        }
        Ok(())
    }

    /// Nested constraint nodes and include nodes directly under `id`.
    pub fn children(&self, id: NodeId) -> Result<Vec<NodeId>, QueryError> {
        let node = self.node(id)?;
        Ok(node
            .constraints
            .iter()
            .filter_map(|arg| arg.nested())
            .chain(node.includes.values().map(|inc| inc.query))
            .collect())
    }

    /// Drops `id` and everything below it from the arena.
    pub(crate) fn free(&mut self, id: NodeId) -> Result<(), QueryError> {
        for child in self.children(id)? {
            self.free(child)?;
        }
        if let Some(slot) = self.nodes.get_mut(id.0)
            && slot.take().is_some()
        {
            self.vacant.push(id.0);
        }
        Ok(())
    }

    pub fn parent_of(&self, id: NodeId) -> Result<Option<NodeId>, QueryError> {
        Ok(self.node(id)?.parent.as_ref().map(|link| link.node))
    }

    /// Path from the nearest top-level node (Main or include) down to `id`,
    /// both ends included. Cached until the node's parent changes.
    pub fn ancestors(&self, id: NodeId) -> Result<&[NodeId], QueryError> {
        let node = self.node(id)?;
        if let Some(path) = node.ancestors.get() {
            return Ok(path.as_slice());
        }
        let mut path = vec![id];
        let mut current = node;
        while !current.kind.is_top_level() {
            let Some(link) = &current.parent else {
                break;
            };
            path.push(link.node);
            current = self.node(link.node)?;
        }
        path.reverse();
        Ok(node.ancestors.get_or_init(|| path).as_slice())
    }

    /// The top-level node whose sibling registry covers `id`.
    pub fn top_level(&self, id: NodeId) -> Result<NodeId, QueryError> {
        Ok(self.ancestors(id)?[0])
    }

    /// Walks up from `id` to the first node that owns `concern`.
    pub(crate) fn owner_of(&self, id: NodeId, concern: Concern) -> Result<NodeId, QueryError> {
        let mut current = id;
        loop {
            let node = self.node(current)?;
            if node.ownership.owns(concern) {
                return Ok(current);
            }
            match &node.parent {
                Some(link) => current = link.node,
                None => {
                    return Err(QueryError::UnexpectedNodeKind {
                        operation: "forwarding to a parent",
                        kind: node.kind.name(),
                    });
                }
            }
        }
    }

    /// Marks `id` and its ancestors as containing a virtual-field constraint.
    pub(crate) fn mark_has_vf(&mut self, id: NodeId) -> Result<(), QueryError> {
        let mut current = Some(id);
        while let Some(cur) = current {
            let node = self.node_mut(cur)?;
            node.has_vf = true;
            current = node.parent.as_ref().map(|l| l.node);
        }
        Ok(())
    }

    /// Marks `id` and its ancestors as referencing variables.
    pub(crate) fn mark_has_variables(&mut self, id: NodeId) -> Result<(), QueryError> {
        let mut current = Some(id);
        while let Some(cur) = current {
            let node = self.node_mut(cur)?;
            if node.has_variables {
                break;
            }
            node.has_variables = true;
            current = node.parent.as_ref().map(|l| l.node);
        }
        Ok(())
    }

    /// Model of a relation reached through `vf` from `owner`.
    fn related_model(&self, owner: NodeId, vf: &str) -> Result<Option<String>, QueryError> {
        Ok(self
            .node(owner)?
            .model
            .as_ref()
            .map(|m| format!("{m}.{vf}")))
    }
}
