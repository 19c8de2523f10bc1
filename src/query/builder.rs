use crate::args::Join;
use crate::error::QueryError;
use crate::operator::Operator;
use crate::query::predicate::{Predicate, QuerySource};
use crate::query::{NodeId, QueryNode, QueryRef, QueryTree};
use crate::select::{SelectField, Selection};
use crate::value::{Map, Value};

/// Mutable cursor on one node of a query tree.
///
/// Group, virtual-field and include callbacks receive one pointing at the
/// node they populate.
#[derive(Debug)]
pub struct QueryMut<'a> {
    pub(crate) tree: &'a mut QueryTree,
    pub(crate) id: NodeId,
}

impl<'a> QueryMut<'a> {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn node(&self) -> Result<&QueryNode, QueryError> {
        self.tree.node(self.id)
    }

    pub fn view(&self) -> QueryRef<'_> {
        QueryRef::new(self.tree, self.id)
    }
}

/// Builder operations shared by [`crate::Query`] and [`QueryMut`].
///
/// Every method returns `&mut Self` so calls chain with `?`:
///
/// ```
/// use arbor_query::{Query, QueryBuilder};
///
/// # fn main() -> Result<(), arbor_query::QueryError> {
/// let mut query = Query::new("Person");
/// query
///     .where_(("country", "CO"))?
///     .or_where(("country", "TX"))?
///     .select("name")?;
/// assert_eq!(query.view().constraints()?.len(), 2);
/// # Ok(())
/// # }
/// ```
pub trait QueryBuilder {
    #[doc(hidden)]
    fn target(&mut self) -> QueryMut<'_>;

    /// Adds a constraint with an explicit join. The join may only be `None`
    /// on an empty constraint list.
    fn add_constraint<'p>(
        &mut self,
        pred: impl Into<Predicate<'p>>,
        negated: bool,
        join: Option<Join>,
    ) -> Result<&mut Self, QueryError> {
        let t = self.target();
        t.tree.add_constraint(t.id, pred.into(), negated, join)?;
        Ok(self)
    }

    /// Adds the first constraint. Later constraints need an explicit join;
    /// `where_` on a non-empty list fails with [`QueryError::MissingJoin`].
    fn where_<'p>(&mut self, pred: impl Into<Predicate<'p>>) -> Result<&mut Self, QueryError> {
        self.add_constraint(pred, false, None)
    }

    fn and_where<'p>(&mut self, pred: impl Into<Predicate<'p>>) -> Result<&mut Self, QueryError> {
        self.add_constraint(pred, false, Some(Join::And))
    }

    fn or_where<'p>(&mut self, pred: impl Into<Predicate<'p>>) -> Result<&mut Self, QueryError> {
        self.add_constraint(pred, false, Some(Join::Or))
    }

    fn where_not<'p>(&mut self, pred: impl Into<Predicate<'p>>) -> Result<&mut Self, QueryError> {
        self.add_constraint(pred, true, None)
    }

    fn and_where_not<'p>(&mut self, pred: impl Into<Predicate<'p>>) -> Result<&mut Self, QueryError> {
        self.add_constraint(pred, true, Some(Join::And))
    }

    fn or_where_not<'p>(&mut self, pred: impl Into<Predicate<'p>>) -> Result<&mut Self, QueryError> {
        self.add_constraint(pred, true, Some(Join::Or))
    }

    fn where_in(&mut self, field: &str, values: impl Into<Value>) -> Result<&mut Self, QueryError> {
        self.where_(Predicate::op(field, Operator::In, values))
    }

    fn and_where_in(&mut self, field: &str, values: impl Into<Value>) -> Result<&mut Self, QueryError> {
        self.and_where(Predicate::op(field, Operator::In, values))
    }

    fn or_where_in(&mut self, field: &str, values: impl Into<Value>) -> Result<&mut Self, QueryError> {
        self.or_where(Predicate::op(field, Operator::In, values))
    }

    fn where_not_in(&mut self, field: &str, values: impl Into<Value>) -> Result<&mut Self, QueryError> {
        self.where_not(Predicate::op(field, Operator::In, values))
    }

    fn and_where_not_in(&mut self, field: &str, values: impl Into<Value>) -> Result<&mut Self, QueryError> {
        self.and_where_not(Predicate::op(field, Operator::In, values))
    }

    fn or_where_not_in(&mut self, field: &str, values: impl Into<Value>) -> Result<&mut Self, QueryError> {
        self.or_where_not(Predicate::op(field, Operator::In, values))
    }

    fn where_null(&mut self, field: &str) -> Result<&mut Self, QueryError> {
        self.where_(Predicate::eq(field, Value::Null))
    }

    fn and_where_null(&mut self, field: &str) -> Result<&mut Self, QueryError> {
        self.and_where(Predicate::eq(field, Value::Null))
    }

    fn or_where_null(&mut self, field: &str) -> Result<&mut Self, QueryError> {
        self.or_where(Predicate::eq(field, Value::Null))
    }

    fn where_not_null(&mut self, field: &str) -> Result<&mut Self, QueryError> {
        self.where_not(Predicate::eq(field, Value::Null))
    }

    fn and_where_not_null(&mut self, field: &str) -> Result<&mut Self, QueryError> {
        self.and_where_not(Predicate::eq(field, Value::Null))
    }

    fn or_where_not_null(&mut self, field: &str) -> Result<&mut Self, QueryError> {
        self.or_where_not(Predicate::eq(field, Value::Null))
    }

    fn remove_constraint(&mut self, index: usize) -> Result<&mut Self, QueryError> {
        let t = self.target();
        t.tree.remove_constraint(t.id, index)?;
        Ok(self)
    }

    /// Replaces the constraint at `index`; its join and run are kept.
    fn replace_constraint<'p>(
        &mut self,
        index: usize,
        pred: impl Into<Predicate<'p>>,
        negated: bool,
    ) -> Result<&mut Self, QueryError> {
        let t = self.target();
        t.tree.replace_constraint(t.id, index, pred.into(), negated)?;
        Ok(self)
    }

    fn select(&mut self, fields: impl Into<Selection>) -> Result<&mut Self, QueryError> {
        let t = self.target();
        t.tree.select(t.id, fields.into())?;
        Ok(self)
    }

    /// Selects `name` after `f` has configured the field.
    fn select_with<F>(&mut self, name: &str, f: F) -> Result<&mut Self, QueryError>
    where
        F: FnOnce(SelectField) -> Result<SelectField, QueryError>,
    {
        let field = f(SelectField::new(name))?;
        let t = self.target();
        t.tree.select_field(t.id, field)?;
        Ok(self)
    }

    fn de_select(&mut self, fields: &[&str]) -> Result<&mut Self, QueryError> {
        let t = self.target();
        t.tree.de_select(t.id, fields, false)?;
        Ok(self)
    }

    /// Keeps only `fields` in the selection.
    fn de_select_except(&mut self, fields: &[&str]) -> Result<&mut Self, QueryError> {
        let t = self.target();
        t.tree.de_select(t.id, fields, true)?;
        Ok(self)
    }

    fn de_select_all(&mut self) -> Result<&mut Self, QueryError> {
        let t = self.target();
        t.tree.de_select_all(t.id)?;
        Ok(self)
    }

    fn alias_field(&mut self, field: &str, alias: &str) -> Result<&mut Self, QueryError> {
        let t = self.target();
        t.tree.alias_field(t.id, field, alias)?;
        Ok(self)
    }

    /// Selects every field referenced by the constraints, including those of
    /// virtual-field constraints (as includes). Constraints added afterwards
    /// are selected too.
    fn select_all_query_args(&mut self) -> Result<&mut Self, QueryError> {
        let t = self.target();
        t.tree.select_all_query_args(t.id, t.id)?;
        Ok(self)
    }

    fn include(&mut self, name: &str, fields: impl Into<Selection>) -> Result<&mut Self, QueryError> {
        let t = self.target();
        t.tree.include(t.id, name, fields.into())?;
        Ok(self)
    }

    fn include_with<'p, F>(&mut self, name: &str, f: F) -> Result<&mut Self, QueryError>
    where
        F: FnOnce(&mut QueryMut<'_>) -> Result<(), QueryError> + 'p,
    {
        let t = self.target();
        t.tree.include_with(t.id, name, Box::new(f))?;
        Ok(self)
    }

    fn include_query<'p>(
        &mut self,
        name: &str,
        source: impl Into<QuerySource<'p>>,
    ) -> Result<&mut Self, QueryError> {
        let t = self.target();
        t.tree.include_query(t.id, name, source.into())?;
        Ok(self)
    }

    /// Includes every related record of `name` unchanged.
    fn include_all(&mut self, name: &str) -> Result<&mut Self, QueryError> {
        let t = self.target();
        t.tree.include_all(t.id, name, None)?;
        Ok(self)
    }

    /// Includes every related record of `name`, projected to `fields`.
    fn include_all_fields(&mut self, name: &str, fields: impl Into<Selection>) -> Result<&mut Self, QueryError> {
        let t = self.target();
        t.tree.include_all(t.id, name, Some(fields.into()))?;
        Ok(self)
    }

    fn remove_include(&mut self, name: &str) -> Result<&mut Self, QueryError> {
        let t = self.target();
        t.tree.remove_include(t.id, name)?;
        Ok(self)
    }

    fn include_at_path(&mut self, path: &[&str], fields: impl Into<Selection>) -> Result<&mut Self, QueryError> {
        let t = self.target();
        t.tree.include_at_path(t.id, path, fields.into())?;
        Ok(self)
    }

    /// Includes `name` filtered by the virtual-field constraints on `name`
    /// that the query already holds.
    fn include_from_constraints(&mut self, name: &str) -> Result<&mut Self, QueryError> {
        let t = self.target();
        t.tree.include_from_constraints(t.id, name, None)?;
        Ok(self)
    }

    fn include_from_constraints_with(
        &mut self,
        name: &str,
        extra: impl Into<Selection>,
    ) -> Result<&mut Self, QueryError> {
        let t = self.target();
        t.tree.include_from_constraints(t.id, name, Some(extra.into()))?;
        Ok(self)
    }

    fn add_directive(&mut self, name: &str, args: Map) -> Result<&mut Self, QueryError> {
        let t = self.target();
        t.tree.add_directive(t.id, name, args, None)?;
        Ok(self)
    }

    fn add_directive_with_defaults(
        &mut self,
        name: &str,
        args: Map,
        defaults: &Map,
    ) -> Result<&mut Self, QueryError> {
        let t = self.target();
        t.tree.add_directive(t.id, name, args, Some(defaults))?;
        Ok(self)
    }

    fn add_field_directive(&mut self, field: &str, name: &str, args: Map) -> Result<&mut Self, QueryError> {
        let t = self.target();
        t.tree.add_field_directive(t.id, field, name, args, None)?;
        Ok(self)
    }

    fn use_alias(&mut self, alias: &str) -> Result<&mut Self, QueryError> {
        let t = self.target();
        t.tree.use_alias(t.id, alias)?;
        Ok(self)
    }

    /// Patches constraint values (and variables bound to constraints or
    /// directives) from `data`.
    fn update_query_args(&mut self, data: &Map, variables: &mut Map) -> Result<&mut Self, QueryError> {
        let t = self.target();
        t.tree.update_query_args(t.id, data, variables)?;
        Ok(self)
    }
}

impl QueryBuilder for QueryMut<'_> {
    fn target(&mut self) -> QueryMut<'_> {
        QueryMut {
            tree: &mut *self.tree,
            id: self.id,
        }
    }
}
