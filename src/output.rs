//! JSON text output for [`Value`]s.
//!
//! Printing goes through `serde_json` with `preserve_order`, so object keys
//! keep insertion order and projected results follow the select set.
//! Non-finite floats print as `null`.
//!
//! ```
//! use arbor_query::Value;
//! use arbor_query::output::{to_json, to_json_pretty};
//!
//! let value: Value = [("name", Value::from("Mark")), ("age", Value::from(41))]
//!     .into_iter()
//!     .collect();
//!
//! assert_eq!(to_json(&value), r#"{"name":"Mark","age":41}"#);
//! assert_eq!(to_json_pretty(&value), "{\n  \"name\": \"Mark\",\n  \"age\": 41\n}");
//! ```

use crate::convert::value_to_json;
use crate::value::Value;

/// Compact JSON, no whitespace.
pub fn to_json(value: &Value) -> String {
    value_to_json(value.clone()).to_string()
}

/// JSON indented by two spaces per level.
pub fn to_json_pretty(value: &Value) -> String {
    format!("{:#}", value_to_json(value.clone()))
}
