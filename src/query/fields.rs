use crate::error::QueryError;
use crate::query::{Concern, NodeId, QueryTree};
use crate::select::{SelectField, Selection};
use crate::value::Map;

impl QueryTree {
    pub(crate) fn select(&mut self, id: NodeId, fields: Selection) -> Result<(), QueryError> {
        for field in fields.into_fields() {
            self.select_field(id, field)?;
        }
        Ok(())
    }

    /// Selects `field`, merging into an existing selection of the same name.
    pub(crate) fn select_field(&mut self, id: NodeId, field: SelectField) -> Result<(), QueryError> {
        let owner = self.owner_of(id, Concern::Select)?;
        let bound = field.has_variables();
        let select = &mut self.node_mut(owner)?.select;
        match select.get_mut(field.key()) {
            Some(existing) => existing.merge(&field),
            None => {
                select.insert(field.key().to_string(), field);
            }
        }
        if bound {
            self.mark_has_variables(owner)?;
        }
        Ok(())
    }

    /// Removes `fields` from the selection, or everything but `fields` when
    /// `invert` is set.
    pub(crate) fn de_select(&mut self, id: NodeId, fields: &[&str], invert: bool) -> Result<(), QueryError> {
        let owner = self.owner_of(id, Concern::Select)?;
        self.node_mut(owner)?
            .select
            .retain(|name, _| fields.contains(&name.as_str()) == invert);
        Ok(())
    }

    pub(crate) fn de_select_all(&mut self, id: NodeId) -> Result<(), QueryError> {
        let owner = self.owner_of(id, Concern::Select)?;
        self.node_mut(owner)?.select.clear();
        Ok(())
    }

    /// Sets the output alias of `field`, selecting it first if needed.
    pub(crate) fn alias_field(&mut self, id: NodeId, field: &str, alias: &str) -> Result<(), QueryError> {
        self.select_field(id, SelectField::new(field).use_alias(alias))
    }

    pub(crate) fn is_field_selected(&self, id: NodeId, field: &str) -> Result<bool, QueryError> {
        let owner = self.owner_of(id, Concern::Select)?;
        Ok(self.node(owner)?.select.contains_key(field))
    }

    pub(crate) fn add_directive(
        &mut self,
        id: NodeId,
        name: &str,
        args: Map,
        defaults: Option<&Map>,
    ) -> Result<(), QueryError> {
        let owner = self.owner_of(id, Concern::Directives)?;
        if self.node_mut(owner)?.directives.add(name, args, defaults)? {
            self.mark_has_variables(owner)?;
        }
        Ok(())
    }

    /// Adds a directive to a selected field, selecting it first if needed.
    pub(crate) fn add_field_directive(
        &mut self,
        id: NodeId,
        field: &str,
        name: &str,
        args: Map,
        defaults: Option<&Map>,
    ) -> Result<(), QueryError> {
        let field = SelectField::new(field).add_directive_with_defaults(name, args, defaults)?;
        self.select_field(id, field)
    }

    pub(crate) fn use_alias(&mut self, id: NodeId, alias: &str) -> Result<(), QueryError> {
        let owner = self.owner_of(id, Concern::Alias)?;
        self.node_mut(owner)?.alias = Some(alias.to_string());
        Ok(())
    }
}
