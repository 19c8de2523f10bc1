//! Evaluate a query document against JSON records.

use super::CliError;
use crate::convert::json_to_map;
use crate::{Payload, QueryDocument, ResponseFormat, ResponseShape, Value};

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Query document JSON
    pub query: String,
    /// Records as a JSON object keyed by record id
    pub input: Option<String>,
    /// Variables as a JSON object
    pub variables: Option<String>,
    pub format: ResponseFormat,
    pub shape: ResponseShape,
}

pub fn execute_run(options: &RunOptions) -> Result<Value, CliError> {
    let query = QueryDocument::from_json(&options.query)?.build()?;
    let input = options.input.as_deref().ok_or(CliError::NoInput)?;
    let serde_json::Value::Object(records) = serde_json::from_str::<serde_json::Value>(input)? else {
        return Err(CliError::NotAnObject("records"));
    };
    let variables = match &options.variables {
        Some(v) => match serde_json::from_str::<serde_json::Value>(v)? {
            serde_json::Value::Object(vars) => json_to_map(vars),
            _ => return Err(CliError::NotAnObject("variables")),
        },
        None => Default::default(),
    };

    let mut payload = Payload::new(json_to_map(records))
        .with_variables(variables)
        .with_format(options.format)
        .with_shape(options.shape);
    let response = query.get(&mut payload)?;
    tracing::debug!(
        matched = payload.results.as_ref().map_or(0, |r| r.len()),
        "query evaluated"
    );
    Ok(response)
}
