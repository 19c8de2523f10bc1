//! Fields projected into a query result.

use indexmap::IndexMap;

use crate::directive::Directives;
use crate::error::QueryError;
use crate::value::Map;

/// A selected field, optionally renamed in the output and guarded by
/// directives.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectField {
    pub name: String,
    pub alias: Option<String>,
    pub directives: Directives,
}

/// Select set of a query, keyed by field name in selection order.
pub type SelectSet = IndexMap<String, SelectField>;

impl SelectField {
    pub fn new(name: impl Into<String>) -> Self {
        SelectField {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Sets the field name and alias in one call.
    pub fn field(mut self, name: impl Into<String>, alias: Option<&str>) -> Self {
        self.name = name.into();
        self.alias = alias.map(str::to_string);
        self
    }

    pub fn use_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn add_directive(self, name: &str, args: Map) -> Result<Self, QueryError> {
        self.add_directive_with_defaults(name, args, None)
    }

    pub fn add_directive_with_defaults(
        mut self,
        name: &str,
        args: Map,
        defaults: Option<&Map>,
    ) -> Result<Self, QueryError> {
        self.directives.add(name, args, defaults)?;
        Ok(self)
    }

    /// Key of this field in a select set.
    pub fn key(&self) -> &str {
        &self.name
    }

    pub fn real_name(&self) -> &str {
        &self.name
    }

    /// Key the field is written under in a projected result.
    pub fn output_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }

    pub fn has_variables(&self) -> bool {
        self.directives.variable_names().next().is_some()
    }

    /// Merges a re-selection of the same field: directives merge and a new
    /// alias replaces the old one.
    pub fn merge(&mut self, source: &SelectField) {
        self.directives.merge(&source.directives);
        if source.alias.is_some() {
            self.alias = source.alias.clone();
        }
    }

    pub fn is_different_than(&self, other: &SelectField) -> bool {
        self != other
    }
}

/// Argument accepted by `select`.
#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    Field(String),
    Aliased(String, String),
    Custom(SelectField),
    Many(Vec<Selection>),
}

impl Selection {
    pub(crate) fn into_fields(self) -> Vec<SelectField> {
        match self {
            Selection::Field(name) => vec![SelectField::new(name)],
            Selection::Aliased(name, alias) => vec![SelectField::new(name).use_alias(alias)],
            Selection::Custom(field) => vec![field],
            Selection::Many(items) => items.into_iter().flat_map(Selection::into_fields).collect(),
        }
    }
}

impl From<&str> for Selection {
    fn from(name: &str) -> Self {
        Selection::Field(name.to_string())
    }
}

impl From<String> for Selection {
    fn from(name: String) -> Self {
        Selection::Field(name)
    }
}

impl From<(&str, &str)> for Selection {
    fn from((name, alias): (&str, &str)) -> Self {
        Selection::Aliased(name.to_string(), alias.to_string())
    }
}

impl From<SelectField> for Selection {
    fn from(field: SelectField) -> Self {
        Selection::Custom(field)
    }
}

impl<T: Into<Selection>> From<Vec<T>> for Selection {
    fn from(items: Vec<T>) -> Self {
        Selection::Many(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Selection>, const N: usize> From<[T; N]> for Selection {
    fn from(items: [T; N]) -> Self {
        Selection::Many(items.into_iter().map(Into::into).collect())
    }
}
