//! Record filtering and projection.

use serde::Deserialize;

use crate::error::QueryError;
use crate::query::{NodeId, QueryTree};
use crate::value::{Map, Value};

/// What `get` returns per matching record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum ResponseFormat {
    /// The matching source records, unprojected
    Records,
    /// Projected results
    #[default]
    #[serde(rename = "results")]
    #[cfg_attr(feature = "cli", value(name = "results"))]
    RecordsResults,
}

/// How the per-record outputs are assembled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum ResponseShape {
    /// Keyed like the source records
    #[default]
    Object,
    Array,
    /// The first match only
    Single,
}

/// Input and output of an evaluation pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Payload {
    pub records: Map,
    pub variables: Map,
    pub response_format: ResponseFormat,
    pub response_shape: ResponseShape,
    /// Outputs of the matching records, keyed by record key. `None` when no
    /// record matched.
    pub results: Option<Map>,
    pub formatted_response: Option<Value>,
}

impl Payload {
    pub fn new(records: Map) -> Self {
        Payload {
            records,
            ..Default::default()
        }
    }

    pub fn with_variables(mut self, variables: Map) -> Self {
        self.variables = variables;
        self
    }

    pub fn with_format(mut self, format: ResponseFormat) -> Self {
        self.response_format = format;
        self
    }

    pub fn with_shape(mut self, shape: ResponseShape) -> Self {
        self.response_shape = shape;
        self
    }
}

/// Related data stored under a virtual-field name.
#[derive(Debug)]
pub enum Related<'a> {
    /// Object whose values are all records
    Keyed(Vec<(&'a str, &'a Value)>),
    Listed(&'a [Value]),
    Single(&'a Value),
}

pub fn related(refs: &Value) -> Related<'_> {
    match refs {
        Value::Array(items) => Related::Listed(items),
        Value::Object(map) if !map.is_empty() && map.values().all(|v| v.as_object().is_some()) => {
            Related::Keyed(map.iter().map(|(k, v)| (k.as_str(), v)).collect())
        }
        other => Related::Single(other),
    }
}

/// Projects `record` through the select set and includes of node `id`.
pub fn build_result(
    tree: &QueryTree,
    id: NodeId,
    variables: &Map,
    record: &Value,
) -> Result<Value, QueryError> {
    let Some(source) = record.as_object() else {
        return Ok(Value::Null);
    };
    let node = tree.node(id)?;
    let mut result = if node.select().is_empty() {
        source.clone()
    } else {
        let mut fields = Map::new();
        for field in node.select().values() {
            if field.directives.should_include(variables)
                && let Some(value) = source.get(&field.name)
            {
                fields.insert(field.output_name().to_string(), value.clone());
            }
        }
        fields
    };

    for inc in node.includes().values() {
        let query = tree.node(inc.query)?;
        if !query.directives().should_include(variables) {
            tracing::trace!(include = %inc.name, "include skipped by directive");
            continue;
        }
        let key = query.alias().unwrap_or(&inc.name).to_string();
        let projected = match source.get(&inc.name).filter(|r| r.is_truthy()) {
            None => Value::Null,
            Some(refs) => project_related(tree, inc.query, variables, refs)?,
        };
        result.insert(key, projected);
    }
    Ok(Value::Object(result))
}

fn project_related(
    tree: &QueryTree,
    id: NodeId,
    variables: &Map,
    refs: &Value,
) -> Result<Value, QueryError> {
    let project = |r: &Value| -> Result<Option<Value>, QueryError> {
        if tree.check_record(id, r, variables)? {
            Ok(Some(build_result(tree, id, variables, r)?))
        } else {
            Ok(None)
        }
    };
    Ok(match related(refs) {
        Related::Keyed(items) => {
            let mut out = Map::new();
            for (key, r) in items {
                if let Some(v) = project(r)? {
                    out.insert(key.to_string(), v);
                }
            }
            if out.is_empty() { Value::Null } else { Value::Object(out) }
        }
        Related::Listed(items) => {
            let mut out = Vec::new();
            for r in items {
                if let Some(v) = project(r)? {
                    out.push(v);
                }
            }
            if out.is_empty() { Value::Null } else { Value::Array(out) }
        }
        Related::Single(r) => project(r)?.unwrap_or(Value::Null),
    })
}

/// Filters `payload.records` with node `id` and formats the outputs of the
/// matching records. The outcome is also stored on the payload.
pub(crate) fn get(tree: &QueryTree, id: NodeId, payload: &mut Payload) -> Result<Value, QueryError> {
    let single = payload.response_shape == ResponseShape::Single;
    let mut results = Map::new();
    for (key, record) in &payload.records {
        if !tree.check_record(id, record, &payload.variables)? {
            continue;
        }
        let output = match payload.response_format {
            ResponseFormat::Records => record.clone(),
            ResponseFormat::RecordsResults => build_result(tree, id, &payload.variables, record)?,
        };
        results.insert(key.clone(), output);
        if single {
            break;
        }
    }
    tracing::trace!(
        records = payload.records.len(),
        matched = results.len(),
        "evaluated records"
    );

    let formatted = if results.is_empty() {
        Value::Null
    } else {
        match payload.response_shape {
            ResponseShape::Object => Value::Object(results.clone()),
            ResponseShape::Array => Value::Array(results.values().cloned().collect()),
            ResponseShape::Single => results.values().next().cloned().unwrap_or_default(),
        }
    };
    payload.results = (!results.is_empty()).then_some(results);
    payload.formatted_response = Some(formatted.clone());
    Ok(formatted)
}
