//! JSON description of a query tree.
//!
//! A document maps one-to-one onto builder calls:
//!
//! ```json
//! {
//!   "model": "Person",
//!   "where": [
//!     { "field": "country", "value": "CO" },
//!     { "join": "or", "group": [
//!       { "field": "country", "value": "TX" },
//!       { "field": "age", "op": ">", "value": 30 }
//!     ] },
//!     { "join": "and", "vf": "friends", "match": { "name": "Mark" } }
//!   ],
//!   "select": ["name", { "field": "email", "directives": { "skip": { "if": ":hideEmail" } } }],
//!   "include": { "friends": { "select": ["name"] } }
//! }
//! ```

use indexmap::IndexMap;
use serde::Deserialize;

use crate::args::Join;
use crate::convert::{json_to_map, json_to_value};
use crate::error::QueryError;
use crate::operator::Operator;
use crate::query::{Predicate, Query, QueryBuilder};
use crate::select::SelectField;
use crate::value::Value;

type JsonMap = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct QueryDocument {
    #[serde(default)]
    pub model: Option<String>,
    #[serde(flatten)]
    pub body: QueryBody,
}

/// Everything a query node can carry, recursively for includes.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QueryBody {
    #[serde(default, rename = "where")]
    pub constraints: Vec<ConstraintDocument>,
    #[serde(default)]
    pub select: Vec<SelectDocument>,
    #[serde(default)]
    pub include: IndexMap<String, QueryBody>,
    #[serde(default)]
    pub directives: IndexMap<String, JsonMap>,
    /// Defaults for variable-bound directive arguments
    #[serde(default)]
    pub defaults: IndexMap<String, JsonMap>,
    #[serde(default)]
    pub alias: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConstraintDocument {
    /// Ignored on the first constraint of a list and required on the rest
    #[serde(default)]
    pub join: Option<Join>,
    #[serde(default)]
    pub not: bool,
    #[serde(flatten)]
    pub test: TestDocument,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TestDocument {
    Field {
        field: String,
        #[serde(default)]
        op: Option<String>,
        #[serde(default)]
        value: serde_json::Value,
    },
    Group {
        group: Vec<ConstraintDocument>,
    },
    VirtualField {
        vf: String,
        #[serde(default = "many_by_default")]
        many: bool,
        #[serde(default, rename = "where")]
        constraints: Vec<ConstraintDocument>,
        #[serde(default, rename = "match")]
        fields: Option<JsonMap>,
    },
}

fn many_by_default() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum SelectDocument {
    Name(String),
    Field {
        field: String,
        #[serde(default)]
        alias: Option<String>,
        #[serde(default)]
        directives: IndexMap<String, JsonMap>,
    },
}

impl QueryDocument {
    pub fn from_json(source: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(source)
    }

    pub fn build(&self) -> Result<Query, QueryError> {
        let mut query = match &self.model {
            Some(model) => Query::new(model.as_str()),
            None => Query::default(),
        };
        self.body.apply(&mut query)?;
        Ok(query)
    }
}

impl QueryBody {
    /// Replays the document onto `target`.
    pub fn apply<B: QueryBuilder>(&self, target: &mut B) -> Result<(), QueryError> {
        apply_constraints(&self.constraints, target)?;
        for field in &self.select {
            target.select(field.to_field()?)?;
        }
        for (name, args) in &self.directives {
            let args = json_to_map(args.clone());
            match self.defaults.get(name) {
                Some(defaults) => {
                    target.add_directive_with_defaults(name, args, &json_to_map(defaults.clone()))?
                }
                None => target.add_directive(name, args)?,
            };
        }
        if let Some(alias) = &self.alias {
            target.use_alias(alias)?;
        }
        for (name, body) in &self.include {
            target.include_with(name, |inc| body.apply(inc))?;
        }
        Ok(())
    }
}

fn apply_constraints<B: QueryBuilder>(
    constraints: &[ConstraintDocument],
    target: &mut B,
) -> Result<(), QueryError> {
    for constraint in constraints {
        target.add_constraint(constraint.test.to_predicate()?, constraint.not, constraint.join)?;
    }
    Ok(())
}

impl TestDocument {
    pub fn to_predicate(&self) -> Result<Predicate<'_>, QueryError> {
        Ok(match self {
            TestDocument::Field { field, op, value } => {
                let operator = match op {
                    Some(op) => op.parse::<Operator>()?,
                    None => Operator::Equal,
                };
                Predicate::op(field.as_str(), operator, json_to_value(value.clone()))
            }
            TestDocument::Group { group } => Predicate::group(move |g| apply_constraints(group, g)),
            TestDocument::VirtualField {
                vf,
                many,
                constraints,
                fields,
            } => {
                let predicate = match fields {
                    Some(fields) => {
                        Predicate::vf_value(vf.as_str(), Value::Object(json_to_map(fields.clone())))
                    }
                    None => Predicate::vf(vf.as_str(), move |g| apply_constraints(constraints, g)),
                };
                predicate.many(*many)
            }
        })
    }
}

impl SelectDocument {
    pub fn to_field(&self) -> Result<SelectField, QueryError> {
        match self {
            SelectDocument::Name(name) => Ok(SelectField::new(name.as_str())),
            SelectDocument::Field {
                field,
                alias,
                directives,
            } => {
                let mut selected = SelectField::new(field.as_str());
                if let Some(alias) = alias {
                    selected = selected.use_alias(alias.as_str());
                }
                for (name, args) in directives {
                    selected = selected.add_directive(name, json_to_map(args.clone()))?;
                }
                Ok(selected)
            }
        }
    }
}
