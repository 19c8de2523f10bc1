//! Variable references inside constraint and directive values.
//!
//! A string value starting with [`VARIABLE_MARKER`] names a variable that is
//! looked up in the variables map at evaluation time: `":flag"` refers to the
//! variable `flag`.

use crate::value::Value;

pub const VARIABLE_MARKER: char = ':';

/// Returns the variable name referenced by `value`, if any.
///
/// ```
/// use arbor_query::{Value, params::value_param};
///
/// assert_eq!(value_param(&Value::from(":userId")), Some("userId"));
/// assert_eq!(value_param(&Value::from("userId")), None);
/// assert_eq!(value_param(&Value::from(":")), None);
/// ```
pub fn value_param(value: &Value) -> Option<&str> {
    match value {
        Value::String(s) => s
            .strip_prefix(VARIABLE_MARKER)
            .filter(|name| !name.is_empty()),
        _ => None,
    }
}
