use crate::args::{Arg, ArgKind, Join, KeyValueArg};
use crate::error::QueryError;
use crate::operator::Operator;
use crate::query::predicate::{FieldValue, Predicate, VfSource};
use crate::query::{Concern, NodeId, NodeKind, ParentLink, QueryMut, QueryTree, Slot};
use crate::result::{Related, related};
use crate::select::SelectField;
use crate::siblings;
use crate::value::{Map, Value, type_name};

/// Where a new constraint entry goes.
#[derive(Debug, Clone, Copy)]
enum Placement {
    Push(Option<Join>),
    Replace(usize),
}

enum Nested {
    Grouped,
    VirtualField { name: String, is_many: bool },
}

/// Virtual-field source after validation.
enum VfBody<'p> {
    Builder(crate::query::GroupFn<'p>),
    Fields(Vec<(String, Value)>, Operator),
    Query(crate::query::QuerySource<'p>),
}

fn field_predicate(field: String, value: FieldValue<'_>, operator: Operator) -> Predicate<'_> {
    match value {
        FieldValue::Value(value) => Predicate::Field {
            field,
            operator,
            value,
        },
        FieldValue::VirtualField(f) => Predicate::VirtualField {
            name: field,
            is_many: true,
            source: VfSource::Builder(f),
        },
    }
}

/// A multi-entry field map as one AND-chained group.
fn and_chain(fields: Vec<(String, FieldValue<'_>)>, operator: Operator) -> Predicate<'_> {
    Predicate::group(move |g| {
        for (i, (field, value)) in fields.into_iter().enumerate() {
            let join = (i > 0).then_some(Join::And);
            g.tree
                .add_constraint(g.id, field_predicate(field, value, operator), false, join)?;
        }
        Ok(())
    })
}

impl QueryTree {
    /// Adds a constraint to the list of `id`.
    ///
    /// `join` may only be omitted while the list is empty.
    pub(crate) fn add_constraint(
        &mut self,
        id: NodeId,
        pred: Predicate<'_>,
        negated: bool,
        join: Option<Join>,
    ) -> Result<(), QueryError> {
        let join = if self.node(id)?.constraints.is_empty() {
            None
        } else {
            Some(join.ok_or(QueryError::MissingJoin)?)
        };
        match pred {
            Predicate::Fields { fields, operator } => {
                if fields.len() > 1 && join == Some(Join::Or) {
                    // `a OR (b AND c)`, not `a OR b AND c`
                    return self.place(id, and_chain(fields, operator), negated, Placement::Push(join));
                }
                let mut join = join;
                for (field, value) in fields {
                    self.place(
                        id,
                        field_predicate(field, value, operator),
                        negated,
                        Placement::Push(join),
                    )?;
                    join = Some(Join::And);
                }
                Ok(())
            }
            pred => self.place(id, pred, negated, Placement::Push(join)),
        }
    }

    /// Replaces the constraint at `index`, keeping its join and run.
    pub(crate) fn replace_constraint(
        &mut self,
        id: NodeId,
        index: usize,
        pred: Predicate<'_>,
        negated: bool,
    ) -> Result<(), QueryError> {
        if index >= self.node(id)?.constraints.len() {
            return Err(QueryError::ConstraintOutOfRange(index));
        }
        tracing::debug!(node = id.index(), index, "replacing constraint");
        let pred = match pred {
            Predicate::Fields { mut fields, operator } if fields.len() == 1 => {
                let (field, value) = fields.remove(0);
                field_predicate(field, value, operator)
            }
            Predicate::Fields { fields, operator } => and_chain(fields, operator),
            pred => pred,
        };
        self.place(id, pred, negated, Placement::Replace(index))
    }

    fn place(
        &mut self,
        id: NodeId,
        pred: Predicate<'_>,
        negated: bool,
        at: Placement,
    ) -> Result<(), QueryError> {
        match pred {
            Predicate::Field {
                field,
                operator,
                value,
            } => {
                let arg = KeyValueArg::new(field, operator, value)?;
                let bound = arg.variable.is_some();
                let index = self.put_arg(id, ArgKind::KeyValue(arg), negated, at)?;
                if bound {
                    self.mark_has_variables(id)?;
                }
                self.after_placed(id, index)
            }
            Predicate::Fields { fields, operator } => {
                self.place(id, and_chain(fields, operator), negated, at)
            }
            Predicate::Group(f) => {
                let (child, index) = self.attach_nested(id, Nested::Grouped, negated, at)?;
                f(&mut QueryMut { tree: self, id: child })?;
                if self.node(child)?.constraints.is_empty() {
                    self.remove_constraint(id, index)?;
                    return Ok(());
                }
                self.after_placed(id, index)
            }
            Predicate::Query(source) => {
                if source.tree.node(source.node)?.constraints.is_empty() {
                    if let Placement::Replace(index) = at {
                        self.remove_constraint(id, index)?;
                    }
                    return self.merge_extras(id, source.tree, source.node);
                }
                let (child, index) = self.attach_nested(id, Nested::Grouped, negated, at)?;
                self.build_from(child, source.tree, source.node)?;
                self.after_placed(id, index)
            }
            Predicate::VirtualField {
                name,
                is_many,
                source,
            } => {
                let body = match source {
                    VfSource::Builder(f) => VfBody::Builder(f),
                    VfSource::Fields { fields, operator } => VfBody::Fields(fields, operator),
                    VfSource::Query(q) => VfBody::Query(q),
                    VfSource::Value(Value::Object(map)) => {
                        VfBody::Fields(map.into_iter().collect(), Operator::Equal)
                    }
                    VfSource::Value(other) => {
                        return Err(QueryError::InvalidVirtualFieldValue(
                            type_name(&other).to_string(),
                        ));
                    }
                };
                let (child, index) =
                    self.attach_nested(id, Nested::VirtualField { name, is_many }, negated, at)?;
                match body {
                    VfBody::Builder(f) => f(&mut QueryMut { tree: self, id: child })?,
                    VfBody::Fields(fields, operator) => {
                        for (i, (field, value)) in fields.into_iter().enumerate() {
                            let join = (i > 0).then_some(Join::And);
                            self.add_constraint(
                                child,
                                Predicate::op(field, operator, value),
                                false,
                                join,
                            )?;
                        }
                    }
                    VfBody::Query(q) => self.build_from(child, q.tree, q.node)?,
                }
                self.after_placed(id, index)
            }
        }
    }

    fn put_arg(
        &mut self,
        id: NodeId,
        kind: ArgKind,
        negated: bool,
        at: Placement,
    ) -> Result<usize, QueryError> {
        match at {
            Placement::Push(join) => Ok(self.node_mut(id)?.constraints.push(kind, negated, join)),
            Placement::Replace(index) => {
                let old = self
                    .node(id)?
                    .constraints
                    .get(index)
                    .ok_or(QueryError::ConstraintOutOfRange(index))?
                    .nested();
                if let Some(old) = old {
                    self.deregister_sibling(old)?;
                    self.free(old)?;
                }
                self.node_mut(id)?.constraints.replace(index, kind, negated)?;
                Ok(index)
            }
        }
    }

    /// Creates a nested node, anchors it in a new (or replaced) slot of `id`
    /// and registers it with the sibling registry.
    fn attach_nested(
        &mut self,
        id: NodeId,
        nested: Nested,
        negated: bool,
        at: Placement,
    ) -> Result<(NodeId, usize), QueryError> {
        if let Placement::Replace(index) = at
            && index >= self.node(id)?.constraints.len()
        {
            return Err(QueryError::ConstraintOutOfRange(index));
        }
        let (child, kind) = match nested {
            Nested::Grouped => {
                let model = self.node(id)?.model.clone();
                let child = self.alloc(NodeKind::Grouped, model);
                (child, ArgKind::Grouped { query: child })
            }
            Nested::VirtualField { name, is_many } => {
                let model = self.related_model(id, &name)?;
                let child = self.alloc(NodeKind::VirtualField, model);
                (
                    child,
                    ArgKind::VirtualField {
                        name,
                        query: child,
                        is_many,
                    },
                )
            }
        };
        let is_vf = matches!(kind, ArgKind::VirtualField { .. });
        let index = self.put_arg(id, kind, negated, at)?;
        self.set_parent(
            child,
            ParentLink {
                node: id,
                slot: Slot::Arg(index),
            },
        )?;
        if is_vf {
            self.mark_has_vf(id)?;
        }
        self.register_sibling(child)?;
        Ok((child, index))
    }

    /// Appends a copy of `arg`, and of the subtree it holds, from `src_tree`.
    pub(super) fn copy_arg(
        &mut self,
        dst: NodeId,
        src_tree: &QueryTree,
        arg: &Arg,
        join: Option<Join>,
    ) -> Result<(), QueryError> {
        let (nested, source) = match &arg.kind {
            ArgKind::KeyValue(kv) => {
                let bound = kv.variable.is_some();
                self.put_arg(dst, ArgKind::KeyValue(kv.clone()), arg.negated, Placement::Push(join))?;
                if bound {
                    self.mark_has_variables(dst)?;
                }
                return Ok(());
            }
            ArgKind::Grouped { query } => (Nested::Grouped, *query),
            ArgKind::VirtualField {
                name,
                query,
                is_many,
            } => (
                Nested::VirtualField {
                    name: name.clone(),
                    is_many: *is_many,
                },
                *query,
            ),
        };
        let (child, _) = self.attach_nested(dst, nested, arg.negated, Placement::Push(join))?;
        self.build_from(child, src_tree, source)
    }

    /// Selects what a new entry touches when its list has all arguments
    /// selected.
    fn after_placed(&mut self, id: NodeId, index: usize) -> Result<(), QueryError> {
        if self.node(id)?.all_args_selected {
            self.select_arg(id, id, index)?;
        }
        Ok(())
    }

    pub(crate) fn remove_constraint(&mut self, id: NodeId, index: usize) -> Result<Arg, QueryError> {
        let nested = self
            .node(id)?
            .constraints
            .get(index)
            .ok_or(QueryError::ConstraintOutOfRange(index))?
            .nested();
        if let Some(n) = nested {
            self.deregister_sibling(n)?;
        }
        let removed = self.node_mut(id)?.constraints.remove(index)?;
        let shifted: Vec<(usize, NodeId)> = self
            .node(id)?
            .constraints
            .iter()
            .skip(index)
            .filter_map(|a| a.nested().map(|n| (a.arg_index, n)))
            .collect();
        for (i, n) in shifted {
            self.node_mut(n)?.parent = Some(ParentLink {
                node: id,
                slot: Slot::Arg(i),
            });
        }
        if let Some(n) = nested {
            self.free(n)?;
        }
        let node = self.node_mut(id)?;
        if removed.collapsed
            && node.kind.is_top_level()
            && let Some(registry) = node.siblings.as_mut()
        {
            registry.collapse_group(removed.arg.group_index);
        }
        tracing::debug!(
            node = id.index(),
            index,
            collapsed = removed.collapsed,
            "removed constraint"
        );
        Ok(removed.arg)
    }

    fn register_sibling(&mut self, node: NodeId) -> Result<(), QueryError> {
        let Some(group) = siblings::group_index(self, node)? else {
            return Ok(());
        };
        let top = self.top_level(node)?;
        let mut registry = self.node_mut(top)?.siblings.take().unwrap_or_default();
        let result = registry.register(self, group, node);
        self.node_mut(top)?.siblings = Some(registry);
        result
    }

    fn deregister_sibling(&mut self, node: NodeId) -> Result<(), QueryError> {
        let Some(group) = siblings::group_index(self, node)? else {
            return Ok(());
        };
        let top = self.top_level(node)?;
        let mut registry = self.node_mut(top)?.siblings.take().unwrap_or_default();
        let result = registry.deregister(self, group, node);
        self.node_mut(top)?.siblings = Some(registry);
        result
    }

    pub(crate) fn check_record(
        &self,
        id: NodeId,
        record: &Value,
        variables: &Map,
    ) -> Result<bool, QueryError> {
        let node = self.node(id)?;
        if node.constraints.is_empty() {
            return Ok(true);
        }
        if record.as_object().is_none() {
            return Ok(false);
        }
        let mut failure = None;
        let matched = node.constraints.check_with(|arg| {
            match self.check_arg(arg, record, variables) {
                Ok(hit) => hit,
                Err(e) => {
                    failure.get_or_insert(e);
                    false
                }
            }
        });
        match failure {
            Some(e) => Err(e),
            None => Ok(matched),
        }
    }

    fn check_arg(&self, arg: &Arg, record: &Value, variables: &Map) -> Result<bool, QueryError> {
        match &arg.kind {
            ArgKind::KeyValue(kv) => Ok(kv.check(record, variables, arg.negated)),
            ArgKind::Grouped { query } => {
                Ok(self.check_record(*query, record, variables)? != arg.negated)
            }
            ArgKind::VirtualField {
                name,
                query,
                is_many,
            } => {
                let Some(refs) = record.get(name).filter(|r| r.is_truthy()) else {
                    return Ok(false);
                };
                if !*is_many {
                    return Ok(self.check_record(*query, refs, variables)? != arg.negated);
                }
                // many: one related record passing (or failing, when negated) is enough
                let hit = |r: &Value| -> Result<bool, QueryError> {
                    Ok(self.check_record(*query, r, variables)? != arg.negated)
                };
                match related(refs) {
                    Related::Keyed(items) => {
                        for (_, r) in items {
                            if hit(r)? {
                                return Ok(true);
                            }
                        }
                        Ok(false)
                    }
                    Related::Listed(items) => {
                        for r in items {
                            if hit(r)? {
                                return Ok(true);
                            }
                        }
                        Ok(false)
                    }
                    Related::Single(r) => hit(r),
                }
            }
        }
    }

    /// Whether a virtual-field constraint on `name` with its own constraints
    /// exists in `id` or its grouped constraints.
    pub(crate) fn does_query_have_vf(&self, id: NodeId, name: &str) -> Result<bool, QueryError> {
        let node = self.node(id)?;
        if !node.has_vf {
            return Ok(false);
        }
        for arg in &node.constraints {
            match &arg.kind {
                ArgKind::VirtualField { name: n, query, .. } if n == name => {
                    if !self.node(*query)?.constraints.is_empty() {
                        return Ok(true);
                    }
                }
                ArgKind::Grouped { query } => {
                    if self.does_query_have_vf(*query, name)? {
                        return Ok(true);
                    }
                }
                _ => {}
            }
        }
        Ok(false)
    }

    /// Selects every field the constraints (and includes) of `source`
    /// reference into `target`. Calling it on a node for itself a second
    /// time does nothing.
    pub(crate) fn select_all_query_args(
        &mut self,
        target: NodeId,
        source: NodeId,
    ) -> Result<(), QueryError> {
        if target == source {
            let node = self.node_mut(target)?;
            if node.all_args_selected {
                return Ok(());
            }
            node.all_args_selected = true;
        }
        for index in 0..self.node(source)?.constraints.len() {
            self.select_arg(target, source, index)?;
        }
        let includes: Vec<(String, NodeId)> = self
            .node(source)?
            .includes
            .values()
            .map(|inc| (inc.name.clone(), inc.query))
            .collect();
        let source_owner = self.owner_of(source, Concern::Include)?;
        let target_owner = self.owner_of(target, Concern::Include)?;
        for (name, query) in includes {
            if source_owner == target_owner {
                self.select_all_query_args(query, query)?;
            } else {
                let existed = self.include_node(target_owner, &name)?.is_some();
                let include = self.get_or_init_include(target_owner, &name)?;
                self.select_all_query_args(include, query)?;
                if existed {
                    self.clear_include_constraints(include)?;
                }
            }
        }
        Ok(())
    }

    fn select_arg(&mut self, target: NodeId, source: NodeId, index: usize) -> Result<(), QueryError> {
        let Some(arg) = self.node(source)?.constraints.get(index) else {
            return Ok(());
        };
        match arg.kind.clone() {
            ArgKind::KeyValue(kv) => {
                if !self.is_field_selected(target, &kv.field)? {
                    self.select_field(target, SelectField::new(kv.field))?;
                }
                Ok(())
            }
            ArgKind::Grouped { query } => self.select_all_query_args(target, query),
            ArgKind::VirtualField { name, query, .. } => {
                let owner = self.owner_of(target, Concern::Include)?;
                let existed = self.include_node(owner, &name)?.is_some();
                let include = self.get_or_init_include(owner, &name)?;
                self.select_all_query_args(include, query)?;
                if existed {
                    // the include keeps the selection, not the filter it was built from
                    self.clear_include_constraints(include)?;
                }
                Ok(())
            }
        }
    }

    /// Applies a data patch to every constraint and directive variable under
    /// `id`. Virtual-field constraints and includes read the patch nested
    /// under their field name.
    pub(crate) fn update_query_args(
        &mut self,
        id: NodeId,
        data: &Map,
        variables: &mut Map,
    ) -> Result<(), QueryError> {
        let mut nested = Vec::new();
        let node = self.node_mut(id)?;
        node.directives.update_variables(data, variables);
        for field in node.select.values() {
            field.directives.update_variables(data, variables);
        }
        for arg in node.constraints.iter_mut() {
            match &mut arg.kind {
                ArgKind::KeyValue(kv) => kv.update(data, variables)?,
                ArgKind::Grouped { query } => nested.push((*query, None)),
                ArgKind::VirtualField { name, query, .. } => {
                    nested.push((*query, Some(name.clone())));
                }
            }
        }
        for inc in node.includes.values() {
            nested.push((inc.query, Some(inc.name.clone())));
        }
        for (query, field) in nested {
            match field {
                None => self.update_query_args(query, data, variables)?,
                Some(field) => {
                    if let Some(Value::Object(patch)) = data.get(&field) {
                        self.update_query_args(query, patch, variables)?;
                    }
                }
            }
        }
        Ok(())
    }
}
