use crate::args::{ArgList, Join};
use crate::error::QueryError;
use crate::query::builder::{QueryBuilder, QueryMut};
use crate::query::{NodeId, NodeKind, QueryNode, QueryTree};
use crate::result::{self, Payload, ResponseFormat, ResponseShape};
use crate::siblings::{self, SiblingRegistry};
use crate::value::{Map, Value};

/// A query: an owned tree rooted at a `Main` node.
///
/// Cloning copies the whole tree, so a clone can be changed without
/// affecting the original.
#[derive(Debug, Clone)]
pub struct Query {
    tree: QueryTree,
    root: NodeId,
}

impl Default for Query {
    fn default() -> Self {
        Query::with_model(None)
    }
}

impl Query {
    pub fn new(model: impl Into<String>) -> Self {
        Query::with_model(Some(model.into()))
    }

    pub(crate) fn with_model(model: Option<String>) -> Self {
        let mut tree = QueryTree::default();
        let root = tree.alloc(NodeKind::Main, model);
        Query { tree, root }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn tree(&self) -> &QueryTree {
        &self.tree
    }

    pub fn model(&self) -> Option<&str> {
        self.tree.node(self.root).ok().and_then(QueryNode::model)
    }

    pub fn view(&self) -> QueryRef<'_> {
        QueryRef::new(&self.tree, self.root)
    }

    /// Read-only view of any node of this query.
    pub fn node(&self, id: NodeId) -> Result<QueryRef<'_>, QueryError> {
        self.tree.node(id)?;
        Ok(QueryRef::new(&self.tree, id))
    }

    /// Builder cursor on any node of this query.
    pub fn node_mut(&mut self, id: NodeId) -> Result<QueryMut<'_>, QueryError> {
        self.tree.node(id)?;
        Ok(QueryMut {
            tree: &mut self.tree,
            id,
        })
    }

    pub fn check_record(&self, record: &Value, variables: &Map) -> Result<bool, QueryError> {
        self.tree.check_record(self.root, record, variables)
    }

    pub fn build_result(&self, variables: &Map, record: &Value) -> Result<Value, QueryError> {
        result::build_result(&self.tree, self.root, variables, record)
    }

    /// Filters and projects `payload.records` with the payload's own format
    /// and shape.
    pub fn get(&self, payload: &mut Payload) -> Result<Value, QueryError> {
        result::get(&self.tree, self.root, payload)
    }

    fn get_as(
        &self,
        payload: &mut Payload,
        format: ResponseFormat,
        shape: ResponseShape,
    ) -> Result<Value, QueryError> {
        payload.response_format = format;
        payload.response_shape = shape;
        self.get(payload)
    }

    pub fn get_all(&self, payload: &mut Payload) -> Result<Value, QueryError> {
        self.get_as(payload, ResponseFormat::RecordsResults, ResponseShape::Object)
    }

    /// Same as [`Query::get_all`]; kept for callers preparing a mutation.
    pub fn get_all_for_mutation(&self, payload: &mut Payload) -> Result<Value, QueryError> {
        self.get_all(payload)
    }

    pub fn get_all_array(&self, payload: &mut Payload) -> Result<Value, QueryError> {
        self.get_as(payload, ResponseFormat::RecordsResults, ResponseShape::Array)
    }

    pub fn get_all_records(&self, payload: &mut Payload) -> Result<Value, QueryError> {
        self.get_as(payload, ResponseFormat::Records, ResponseShape::Object)
    }

    pub fn get_all_records_array(&self, payload: &mut Payload) -> Result<Value, QueryError> {
        self.get_as(payload, ResponseFormat::Records, ResponseShape::Array)
    }

    pub fn get_one(&self, payload: &mut Payload) -> Result<Value, QueryError> {
        self.get_as(payload, ResponseFormat::RecordsResults, ResponseShape::Single)
    }

    pub fn get_one_record(&self, payload: &mut Payload) -> Result<Value, QueryError> {
        self.get_as(payload, ResponseFormat::Records, ResponseShape::Single)
    }

    /// A new query whose only constraint is a group holding this query's
    /// constraints. Select, includes, directives and alias move to the new
    /// root.
    pub fn convert_to_grouped(&self) -> Result<Query, QueryError> {
        let mut grouped = Query::with_model(self.model().map(str::to_string));
        grouped.where_(self)?;
        tracing::debug!(nodes = grouped.tree.len(), "converted query to grouped");
        Ok(grouped)
    }

    /// Combines this query with `other` as `(self) join (other)`.
    pub fn merge_query(&mut self, other: &Query, join: Join) -> Result<&mut Self, QueryError> {
        let mut merged = Query::with_model(self.model().map(str::to_string));
        merged.where_(&*self)?;
        merged.add_constraint(other, false, Some(join))?;
        tracing::debug!(join = join.as_str(), "merged queries");
        *self = merged;
        Ok(self)
    }

    pub fn is_different_than(&self, other: &Query, exclude_select: bool) -> Result<bool, QueryError> {
        self.view().is_different_than(other.view(), exclude_select)
    }

    /// Sibling registry anchored at the top-level node `top` (the root or an
    /// include node).
    pub fn siblings(&self, top: NodeId) -> Result<Option<&SiblingRegistry>, QueryError> {
        Ok(self.tree.node(top)?.siblings())
    }

    /// Grouped and virtual-field nodes `id` may share constraints with.
    pub fn shareable_siblings(&self, id: NodeId) -> Result<Vec<NodeId>, QueryError> {
        let top = self.tree.top_level(id)?;
        Ok(self
            .siblings(top)?
            .map(|registry| registry.shareable_with(id))
            .unwrap_or_default())
    }

    pub fn can_share(&self, a: NodeId, b: NodeId) -> Result<bool, QueryError> {
        siblings::can_share(&self.tree, a, b)
    }

    pub fn get_filter_fn(&self) -> Result<(), QueryError> {
        Err(QueryError::Deprecated("get_filter_fn", "check_record"))
    }

    pub fn is_root_query(&self) -> Result<bool, QueryError> {
        Err(QueryError::Deprecated("is_root_query", "the node kind"))
    }
}

impl QueryBuilder for Query {
    fn target(&mut self) -> QueryMut<'_> {
        QueryMut {
            tree: &mut self.tree,
            id: self.root,
        }
    }
}

/// Read-only view of one node.
#[derive(Debug, Clone, Copy)]
pub struct QueryRef<'a> {
    tree: &'a QueryTree,
    id: NodeId,
}

impl<'a> QueryRef<'a> {
    pub(crate) fn new(tree: &'a QueryTree, id: NodeId) -> Self {
        QueryRef { tree, id }
    }

    pub fn tree(&self) -> &'a QueryTree {
        self.tree
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn node(&self) -> Result<&'a QueryNode, QueryError> {
        self.tree.node(self.id)
    }

    pub fn constraints(&self) -> Result<&'a ArgList, QueryError> {
        Ok(self.node()?.constraints())
    }

    /// Node held by the grouped or virtual-field constraint at `index`.
    pub fn child(&self, index: usize) -> Result<Option<QueryRef<'a>>, QueryError> {
        Ok(self
            .constraints()?
            .get(index)
            .and_then(|arg| arg.nested())
            .map(|id| QueryRef::new(self.tree, id)))
    }

    /// Query of the include `name`.
    pub fn include(&self, name: &str) -> Result<Option<QueryRef<'a>>, QueryError> {
        Ok(self
            .node()?
            .includes()
            .get(name)
            .map(|inc| QueryRef::new(self.tree, inc.query)))
    }

    /// Copies this node and its subtree into a new standalone query.
    pub fn to_query(&self) -> Result<Query, QueryError> {
        let mut query = Query::with_model(self.node()?.model().map(str::to_string));
        query.tree.build_from(query.root, self.tree, self.id)?;
        Ok(query)
    }

    pub fn check_record(&self, record: &Value, variables: &Map) -> Result<bool, QueryError> {
        self.tree.check_record(self.id, record, variables)
    }

    pub fn build_result(&self, variables: &Map, record: &Value) -> Result<Value, QueryError> {
        result::build_result(self.tree, self.id, variables, record)
    }

    pub fn does_query_have_vf(&self, name: &str) -> Result<bool, QueryError> {
        self.tree.does_query_have_vf(self.id, name)
    }

    pub fn is_vf_included(&self, name: &str) -> Result<bool, QueryError> {
        self.tree.is_vf_included(self.id, name)
    }

    pub fn is_field_selected(&self, field: &str) -> Result<bool, QueryError> {
        self.tree.is_field_selected(self.id, field)
    }

    pub fn is_different_than(&self, other: QueryRef<'_>, exclude_select: bool) -> Result<bool, QueryError> {
        self.tree
            .is_different_than(self.id, other.tree, other.id, exclude_select)
    }
}
