use crate::args::{ArgKind, Join};
use crate::error::QueryError;
use crate::query::predicate::{GroupFn, Predicate, QuerySource};
use crate::query::{Concern, NodeId, NodeKind, ParentLink, QueryMut, QueryTree, Slot};
use crate::select::Selection;

/// A related collection projected into the result, shaped by its own query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncludeVf {
    pub name: String,
    pub query: NodeId,
}

impl QueryTree {
    /// Include node for `name` on `owner`, if present.
    pub(crate) fn include_node(&self, owner: NodeId, name: &str) -> Result<Option<NodeId>, QueryError> {
        Ok(self.node(owner)?.includes.get(name).map(|inc| inc.query))
    }

    pub(crate) fn get_or_init_include(&mut self, id: NodeId, name: &str) -> Result<NodeId, QueryError> {
        let owner = self.owner_of(id, Concern::Include)?;
        if let Some(query) = self.include_node(owner, name)? {
            return Ok(query);
        }
        let model = self.related_model(owner, name)?;
        let query = self.alloc(NodeKind::IncludeVirtualField, model);
        self.node_mut(owner)?.includes.insert(
            name.to_string(),
            IncludeVf {
                name: name.to_string(),
                query,
            },
        );
        self.set_parent(
            query,
            ParentLink {
                node: owner,
                slot: Slot::Include(name.to_string()),
            },
        )?;
        tracing::debug!(owner = owner.index(), node = query.index(), include = name, "created include");
        Ok(query)
    }

    pub(crate) fn include(&mut self, id: NodeId, name: &str, fields: Selection) -> Result<(), QueryError> {
        let query = self.get_or_init_include(id, name)?;
        self.select(query, fields)
    }

    pub(crate) fn include_with(&mut self, id: NodeId, name: &str, f: GroupFn<'_>) -> Result<(), QueryError> {
        let query = self.get_or_init_include(id, name)?;
        f(&mut QueryMut { tree: self, id: query })
    }

    pub(crate) fn include_query(
        &mut self,
        id: NodeId,
        name: &str,
        source: QuerySource<'_>,
    ) -> Result<(), QueryError> {
        let query = self.get_or_init_include(id, name)?;
        self.build_from(query, source.tree, source.node)
    }

    /// Includes every related record: the include loses its constraints and
    /// selects `fields`, or passes related records through when `None`.
    pub(crate) fn include_all(
        &mut self,
        id: NodeId,
        name: &str,
        fields: Option<Selection>,
    ) -> Result<(), QueryError> {
        let query = self.get_or_init_include(id, name)?;
        self.clear_include_constraints(query)?;
        self.de_select_all(query)?;
        match fields {
            Some(fields) => self.select(query, fields),
            None => Ok(()),
        }
    }

    pub(crate) fn clear_include_constraints(&mut self, query: NodeId) -> Result<(), QueryError> {
        while let Some(last) = self.node(query)?.constraints.len().checked_sub(1) {
            self.remove_constraint(query, last)?;
        }
        Ok(())
    }

    /// Returns whether an include was removed.
    pub(crate) fn remove_include(&mut self, id: NodeId, name: &str) -> Result<bool, QueryError> {
        let owner = self.owner_of(id, Concern::Include)?;
        match self.node_mut(owner)?.includes.shift_remove(name) {
            Some(inc) => {
                self.free(inc.query)?;
                tracing::debug!(owner = owner.index(), include = name, "removed include");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Includes nested relations along `path` and selects `fields` on the
    /// last one.
    pub(crate) fn include_at_path(
        &mut self,
        id: NodeId,
        path: &[&str],
        fields: Selection,
    ) -> Result<(), QueryError> {
        if path.is_empty() {
            return Err(QueryError::EmptyPath);
        }
        let mut current = id;
        for name in path {
            current = self.get_or_init_include(current, name)?;
        }
        self.select(current, fields)
    }

    /// Derives the predicate of include `name` from the virtual-field
    /// constraints on `name` already present in the query, keeping their
    /// joins, then selects every field those constraints touch.
    ///
    /// Does nothing when no such constraint exists.
    pub(crate) fn include_from_constraints(
        &mut self,
        id: NodeId,
        name: &str,
        extra: Option<Selection>,
    ) -> Result<(), QueryError> {
        let owner = self.owner_of(id, Concern::Include)?;
        if !self.does_query_have_vf(owner, name)? {
            return Ok(());
        }
        let query = self.get_or_init_include(owner, name)?;
        if let Some(extra) = extra {
            self.select(query, extra)?;
        }
        let snapshot = self.clone();
        self.add_include_from_constraints(&snapshot, owner, name, query)?;
        self.select_all_query_args(query, query)
    }

    fn add_include_from_constraints(
        &mut self,
        src_tree: &QueryTree,
        src: NodeId,
        name: &str,
        target: NodeId,
    ) -> Result<(), QueryError> {
        let mut next_join = None;
        for arg in src_tree.node(src)?.constraints.iter() {
            match arg.join {
                Some(Join::Or) => next_join = Some(Join::Or),
                Some(Join::And) if next_join.is_none() => next_join = Some(Join::And),
                _ => {}
            }
            let join = next_join.or(Some(Join::And));
            match &arg.kind {
                ArgKind::VirtualField { name: vf, query, .. } if vf == name => {
                    if src_tree.node(*query)?.constraints.is_empty() {
                        continue;
                    }
                    let source = QuerySource {
                        tree: src_tree,
                        node: *query,
                    };
                    self.add_constraint(target, Predicate::Query(source), false, join)?;
                    next_join = None;
                }
                ArgKind::Grouped { query } if src_tree.does_query_have_vf(*query, name)? => {
                    let query = *query;
                    let group = Predicate::group(move |g| {
                        g.tree.add_include_from_constraints(src_tree, query, name, g.id)
                    });
                    self.add_constraint(target, group, false, join)?;
                    next_join = None;
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Whether `name` is included on the node owning the includes of `id`.
    pub(crate) fn is_vf_included(&self, id: NodeId, name: &str) -> Result<bool, QueryError> {
        let owner = self.owner_of(id, Concern::Include)?;
        Ok(self.node(owner)?.includes.contains_key(name))
    }
}
