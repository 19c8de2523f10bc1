use crate::args::{ArgKind, Join};
use crate::error::QueryError;
use crate::query::{Concern, NodeId, QueryTree};

impl QueryTree {
    /// Merges the content of `src` (possibly in another tree) into `dst`
    /// without changing the kind of `dst`.
    ///
    /// Constraints are appended; when `dst` already has some, the copied
    /// list becomes an alternative (`dst OR src`).
    pub(crate) fn build_from(
        &mut self,
        dst: NodeId,
        src_tree: &QueryTree,
        src: NodeId,
    ) -> Result<(), QueryError> {
        self.merge_extras(dst, src_tree, src)?;
        let first_join = if self.node(dst)?.constraints.is_empty() {
            None
        } else {
            Some(Join::Or)
        };
        for (i, arg) in src_tree.node(src)?.constraints.iter().enumerate() {
            let join = if i == 0 { first_join } else { arg.join };
            self.copy_arg(dst, src_tree, arg, join)?;
        }
        Ok(())
    }

    /// Merges everything but the constraints: select, includes, directives
    /// and alias, each into the node of `dst`'s chain that owns it.
    pub(crate) fn merge_extras(
        &mut self,
        dst: NodeId,
        src_tree: &QueryTree,
        src: NodeId,
    ) -> Result<(), QueryError> {
        let source = src_tree.node(src)?;
        for field in source.select.values() {
            self.select_field(dst, field.clone())?;
        }
        for inc in source.includes.values() {
            let target = self.get_or_init_include(dst, &inc.name)?;
            self.build_from(target, src_tree, inc.query)?;
        }
        if !source.directives.is_empty() {
            let owner = self.owner_of(dst, Concern::Directives)?;
            self.node_mut(owner)?.directives.merge(&source.directives);
        }
        if let Some(alias) = &source.alias {
            let owner = self.owner_of(dst, Concern::Alias)?;
            self.node_mut(owner)?.alias = Some(alias.clone());
        }
        if source.has_variables {
            self.mark_has_variables(dst)?;
        }
        Ok(())
    }

    /// Structural comparison of two nodes, possibly in different trees.
    pub(crate) fn is_different_than(
        &self,
        a: NodeId,
        other: &QueryTree,
        b: NodeId,
        exclude_select: bool,
    ) -> Result<bool, QueryError> {
        let (x, y) = (self.node(a)?, other.node(b)?);
        if x.kind != y.kind
            || x.model != y.model
            || x.alias != y.alias
            || x.directives != y.directives
            || x.constraints.len() != y.constraints.len()
            || x.includes.len() != y.includes.len()
        {
            return Ok(true);
        }
        if !exclude_select
            && (x.select.len() != y.select.len()
                || x
                    .select
                    .iter()
                    .any(|(name, f)| y.select.get(name).is_none_or(|g| f.is_different_than(g))))
        {
            return Ok(true);
        }
        for (p, q) in x.constraints.iter().zip(&y.constraints) {
            if p.join != q.join || p.negated != q.negated || p.group_index != q.group_index {
                return Ok(true);
            }
            let differs = match (&p.kind, &q.kind) {
                (ArgKind::KeyValue(l), ArgKind::KeyValue(r)) => l != r,
                (ArgKind::Grouped { query: l }, ArgKind::Grouped { query: r }) => {
                    self.is_different_than(*l, other, *r, exclude_select)?
                }
                (
                    ArgKind::VirtualField {
                        name: ln,
                        query: l,
                        is_many: lm,
                    },
                    ArgKind::VirtualField {
                        name: rn,
                        query: r,
                        is_many: rm,
                    },
                ) => ln != rn || lm != rm || self.is_different_than(*l, other, *r, exclude_select)?,
                _ => true,
            };
            if differs {
                return Ok(true);
            }
        }
        for (name, inc) in &x.includes {
            let Some(theirs) = y.includes.get(name) else {
                return Ok(true);
            };
            if self.is_different_than(inc.query, other, theirs.query, exclude_select)? {
                return Ok(true);
            }
        }
        Ok(false)
    }
}
