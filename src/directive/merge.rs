//! Recursive structural merge for directive argument values.

use crate::value::{Map, Value};

/// Merges `src` into `dst`.
///
/// Objects merge key by key and arrays merge index by index, recursing into
/// nested containers. Any other pairing replaces `dst` with a copy of `src`.
///
/// ```
/// use arbor_query::{Value, directive::merge::merge_value};
///
/// let mut dst: Value = [("a", Value::from(1)), ("b", Value::from(vec![1, 2]))]
///     .into_iter()
///     .collect();
/// let src: Value = [("b", Value::from(vec![9])), ("c", Value::from(true))]
///     .into_iter()
///     .collect();
///
/// merge_value(&mut dst, &src);
/// assert_eq!(dst.get("a"), Some(&Value::from(1)));
/// assert_eq!(dst.get("b"), Some(&Value::from(vec![9, 2])));
/// assert_eq!(dst.get("c"), Some(&Value::from(true)));
/// ```
pub fn merge_value(dst: &mut Value, src: &Value) {
    match (dst, src) {
        (Value::Object(d), Value::Object(s)) => merge_map(d, s),
        (Value::Array(d), Value::Array(s)) => {
            for (i, item) in s.iter().enumerate() {
                match d.get_mut(i) {
                    Some(slot) => merge_value(slot, item),
                    None => d.push(item.clone()),
                }
            }
        }
        (dst, src) => *dst = src.clone(),
    }
}

/// Merges every entry of `src` into `dst`, see [`merge_value`].
pub fn merge_map(dst: &mut Map, src: &Map) {
    for (key, value) in src {
        match dst.get_mut(key) {
            Some(existing) => merge_value(existing, value),
            None => {
                dst.insert(key.clone(), value.clone());
            }
        }
    }
}
