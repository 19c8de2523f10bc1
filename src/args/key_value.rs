use crate::args::Join;
use crate::error::QueryError;
use crate::operator::{Operator, Pattern};
use crate::params::value_param;
use crate::value::{Map, Value};

static NULL: Value = Value::Null;

/// A single `field OP value` test.
///
/// When the value is a variable reference (`":name"`), the operand is read
/// from the variables map at evaluation time instead. Literal `like` and
/// `regexp` operands are compiled once, here.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyValueArg {
    pub field: String,
    pub operator: Operator,
    pub value: Value,
    pub variable: Option<String>,
    pattern: Option<Pattern>,
}

impl KeyValueArg {
    pub fn new(
        field: impl Into<String>,
        operator: Operator,
        value: impl Into<Value>,
    ) -> Result<Self, QueryError> {
        let value = value.into();
        let variable = value_param(&value).map(str::to_string);
        let pattern = match variable {
            Some(_) => None,
            None => operator.compile(&value)?,
        };
        Ok(KeyValueArg {
            field: field.into(),
            operator,
            value,
            variable,
            pattern,
        })
    }

    /// The operand this constraint compares against.
    pub fn operand<'a>(&'a self, variables: &'a Map) -> &'a Value {
        match &self.variable {
            Some(var) => variables.get(var).unwrap_or(&NULL),
            None => &self.value,
        }
    }

    pub fn check(&self, record: &Value, variables: &Map, negated: bool) -> bool {
        let actual = record.get(&self.field).unwrap_or(&NULL);
        self.operator
            .test_compiled(actual, self.operand(variables), self.pattern.as_ref())
            != negated
    }

    /// Applies a data patch: a truthy `data[field]` replaces the value, or
    /// the bound variable when the constraint is variable-bound.
    ///
    /// A replacement literal is checked like a constructor argument; on error
    /// the constraint is left unchanged.
    pub fn update(&mut self, data: &Map, variables: &mut Map) -> Result<(), QueryError> {
        let Some(patch) = data.get(&self.field).filter(|v| v.is_truthy()) else {
            return Ok(());
        };
        match &self.variable {
            Some(var) => {
                variables.insert(var.clone(), patch.clone());
            }
            None => {
                self.pattern = self.operator.compile(patch)?;
                self.value = patch.clone();
            }
        }
        Ok(())
    }

    /// Name of the builder method that produces this constraint.
    ///
    /// With `for_sql_builder`, the name follows the conventions of SQL query
    /// builders: a null value maps to the `whereNull` family, and `in` with an
    /// `and` join maps to plain `whereIn`.
    ///
    /// ```
    /// use arbor_query::{Join, KeyValueArg, Operator, Value};
    ///
    /// let arg = KeyValueArg::new("id", Operator::In, vec![1, 2]).unwrap();
    /// assert_eq!(arg.method_name(true, Some(Join::Or), false), "orWhereNotIn");
    /// assert_eq!(arg.method_name(false, Some(Join::And), true), "whereIn");
    ///
    /// let arg = KeyValueArg::new("deletedAt", Operator::Equal, Value::Null).unwrap();
    /// assert_eq!(arg.method_name(true, Some(Join::Or), true), "orWhereNotNull");
    /// ```
    pub fn method_name(&self, negated: bool, join: Option<Join>, for_sql_builder: bool) -> String {
        let mut join = join;
        if for_sql_builder {
            if self.value.is_null() && self.variable.is_none() {
                let base = if negated { "whereNotNull" } else { "whereNull" };
                return match join {
                    Some(Join::Or) => camel_join("or", base),
                    _ => base.to_string(),
                };
            }
            if self.operator == Operator::In && join == Some(Join::And) {
                join = None;
            }
        }
        let mut name = match join {
            Some(j) => camel_join(j.as_str(), "where"),
            None => "where".to_string(),
        };
        if negated {
            name.push_str("Not");
        }
        if self.operator == Operator::In {
            name.push_str("In");
        }
        name
    }
}

fn camel_join(prefix: &str, name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => format!("{}{}{}", prefix, first.to_ascii_uppercase(), chars.as_str()),
        None => prefix.to_string(),
    }
}
