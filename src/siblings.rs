//! Cross-branch index of grouped and virtual-field sub-queries.
//!
//! Every top-level node (the Main query or an include) keeps a registry of
//! the grouped and virtual-field nodes beneath it, bucketed by the run
//! (`group_index`) of the top-level constraint they hang from. Within a
//! bucket each member lists the members it may share constraints with, so a
//! downstream consumer can deduplicate constraints between independent
//! branches without changing what the predicate matches.

use std::collections::BTreeMap;

use crate::args::Join;
use crate::error::QueryError;
use crate::query::{NodeId, NodeKind, QueryTree, Slot};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiblingEntry {
    pub query: NodeId,
    /// Positions (within the same group) of members this one can share with
    pub shares_with: Vec<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SiblingGroup {
    pub members: Vec<SiblingEntry>,
}

impl SiblingGroup {
    pub fn position(&self, node: NodeId) -> Option<usize> {
        self.members.iter().position(|m| m.query == node)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SiblingRegistry {
    groups: BTreeMap<usize, SiblingGroup>,
}

impl SiblingRegistry {
    pub fn group(&self, group_index: usize) -> Option<&SiblingGroup> {
        self.groups.get(&group_index)
    }

    pub fn groups(&self) -> impl Iterator<Item = (usize, &SiblingGroup)> {
        self.groups.iter().map(|(k, g)| (*k, g))
    }

    pub fn is_empty(&self) -> bool {
        self.groups.values().all(|g| g.members.is_empty())
    }

    /// Members `node` may share constraints with.
    pub fn shareable_with(&self, node: NodeId) -> Vec<NodeId> {
        for group in self.groups.values() {
            if let Some(pos) = group.position(node) {
                return group.members[pos]
                    .shares_with
                    .iter()
                    .map(|&i| group.members[i].query)
                    .collect();
            }
        }
        Vec::new()
    }

    pub(crate) fn register(
        &mut self,
        tree: &QueryTree,
        group_index: usize,
        node: NodeId,
    ) -> Result<(), QueryError> {
        let group = self.groups.entry(group_index).or_default();
        let position = group.members.len();
        let mut shares_with = Vec::new();
        for (i, member) in group.members.iter_mut().enumerate() {
            if can_share(tree, member.query, node)? {
                member.shares_with.push(position);
                shares_with.push(i);
            }
        }
        tracing::debug!(
            node = node.index(),
            group = group_index,
            shares = shares_with.len(),
            "registered sibling query"
        );
        group.members.push(SiblingEntry {
            query: node,
            shares_with,
        });
        Ok(())
    }

    /// Removes `node` and, recursively, every nested node it holds.
    pub(crate) fn deregister(
        &mut self,
        tree: &QueryTree,
        group_index: usize,
        node: NodeId,
    ) -> Result<(), QueryError> {
        let Some(group) = self.groups.get_mut(&group_index) else {
            return Ok(());
        };
        let Some(removed) = group.position(node) else {
            return Ok(());
        };
        for member in &mut group.members {
            member.shares_with.retain(|&i| i != removed);
            for i in &mut member.shares_with {
                if *i > removed {
                    *i -= 1;
                }
            }
        }
        group.members.remove(removed);
        tracing::debug!(node = node.index(), group = group_index, "deregistered sibling query");

        for arg in tree.node(node)?.constraints() {
            if let Some(nested) = arg.nested() {
                self.deregister(tree, group_index, nested)?;
            }
        }
        Ok(())
    }

    /// Re-keys the groups after the top-level run `removed` disappeared.
    pub(crate) fn collapse_group(&mut self, removed: usize) {
        let groups = std::mem::take(&mut self.groups);
        self.groups = groups
            .into_iter()
            .filter(|(k, _)| *k != removed)
            .map(|(k, g)| if k > removed { (k - 1, g) } else { (k, g) })
            .collect();
    }
}

/// Registry bucket for `node`: the run of the top-level constraint it hangs
/// from. `None` for top-level nodes themselves.
pub fn group_index(tree: &QueryTree, node: NodeId) -> Result<Option<usize>, QueryError> {
    let path = tree.ancestors(node)?;
    let (Some(&top), Some(&first)) = (path.first(), path.get(1)) else {
        return Ok(None);
    };
    let Some(Slot::Arg(idx)) = tree.node(first)?.parent().map(|l| &l.slot) else {
        return Ok(None);
    };
    Ok(tree
        .node(top)?
        .constraints()
        .get(*idx)
        .map(|arg| arg.group_index))
}

/// Constraint slots from the top-level node down to `node`, as
/// `(owner, arg_index)` pairs.
fn slot_path(tree: &QueryTree, node: NodeId) -> Result<Vec<(NodeId, usize)>, QueryError> {
    let mut slots = Vec::new();
    for &n in &tree.ancestors(node)?[1..] {
        if let Some(link) = tree.node(n)?.parent()
            && let Slot::Arg(idx) = link.slot
        {
            slots.push((link.node, idx));
        }
    }
    Ok(slots)
}

/// Where two branches split below a shared constraint: the node holding the
/// diverging slots and the slot index on each side.
pub fn common_ancestor(
    tree: &QueryTree,
    a: NodeId,
    b: NodeId,
) -> Result<Option<(NodeId, usize, usize)>, QueryError> {
    let path_a = slot_path(tree, a)?;
    let path_b = slot_path(tree, b)?;
    let split = path_a
        .iter()
        .zip(&path_b)
        .position(|(x, y)| x != y)
        .unwrap_or(path_a.len().min(path_b.len()));
    if split == 0 || split >= path_a.len() || split >= path_b.len() {
        return Ok(None);
    }
    Ok(Some((path_a[split].0, path_a[split].1, path_b[split].1)))
}

/// Whether `inner` lies under `outer` (or is `outer`).
pub fn is_in_path(tree: &QueryTree, outer: NodeId, inner: NodeId) -> Result<bool, QueryError> {
    Ok(tree.ancestors(inner)?.contains(&outer))
}

/// A virtual-field node nested (at any depth) inside another virtual-field
/// node of the same top-level scope.
pub fn is_nested_vf_group(tree: &QueryTree, node: NodeId) -> Result<bool, QueryError> {
    if tree.node(node)?.kind() != NodeKind::VirtualField {
        return Ok(false);
    }
    let path = tree.ancestors(node)?;
    for &n in &path[..path.len() - 1] {
        if tree.node(n)?.kind() == NodeKind::VirtualField {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Whether two sub-queries may share deduplicated constraints.
///
/// They must target the same model and neither may contain the other. Below
/// a common constraint, every slot after the first branch point up to the
/// second must be AND-joined. Without a common constraint, sharing is refused
/// only for nested virtual-field groups.
pub fn can_share(tree: &QueryTree, a: NodeId, b: NodeId) -> Result<bool, QueryError> {
    if tree.node(a)?.model() != tree.node(b)?.model()
        || is_in_path(tree, a, b)?
        || is_in_path(tree, b, a)?
    {
        return Ok(false);
    }
    match common_ancestor(tree, a, b)? {
        None => Ok(!is_nested_vf_group(tree, a)? && !is_nested_vf_group(tree, b)?),
        Some((holder, i, j)) => {
            let (lo, hi) = if i < j { (i, j) } else { (j, i) };
            let args = tree.node(holder)?.constraints();
            Ok(((lo + 1)..=hi).all(|k| args.get(k).is_none_or(|arg| arg.join != Some(Join::Or))))
        }
    }
}
