//! Conversion between [`Value`] and `serde_json::Value`.

use crate::value::{Map, Value};

/// Converts parsed JSON into a [`Value`]. Object key order is preserved.
pub fn json_to_value(v: serde_json::Value) -> Value {
    match v {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Boolean(b),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => Value::Integer(i),
            None => n.as_f64().map(Value::Float).unwrap_or(Value::Null),
        },
        serde_json::Value::String(s) => Value::String(s),
        serde_json::Value::Array(items) => Value::Array(items.into_iter().map(json_to_value).collect()),
        serde_json::Value::Object(obj) => Value::Object(json_to_map(obj)),
    }
}

pub fn json_to_map(obj: serde_json::Map<String, serde_json::Value>) -> Map {
    obj.into_iter().map(|(k, v)| (k, json_to_value(v))).collect()
}

/// Converts a [`Value`] into JSON. Non-finite floats become `null`.
pub fn value_to_json(v: Value) -> serde_json::Value {
    match v {
        Value::Null => serde_json::Value::Null,
        Value::Boolean(b) => serde_json::Value::Bool(b),
        Value::Integer(i) => serde_json::Value::Number(i.into()),
        Value::Float(f) => serde_json::Number::from_f64(f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Value::String(s) => serde_json::Value::String(s),
        Value::Array(items) => serde_json::Value::Array(items.into_iter().map(value_to_json).collect()),
        Value::Object(obj) => {
            serde_json::Value::Object(obj.into_iter().map(|(k, v)| (k, value_to_json(v))).collect())
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        json_to_value(v)
    }
}

impl From<Value> for serde_json::Value {
    fn from(v: Value) -> Self {
        value_to_json(v)
    }
}
