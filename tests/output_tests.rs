use arbor_query::{Value, to_json, to_json_pretty};

fn object(pairs: Vec<(&str, Value)>) -> Value {
    pairs.into_iter().collect()
}

#[test]
fn test_keys_keep_insertion_order() {
    let value = object(vec![("zeta", 1.into()), ("alpha", 2.into()), ("mid", Value::Null)]);
    assert_eq!(to_json(&value), r#"{"zeta":1,"alpha":2,"mid":null}"#);
}

#[test]
fn test_numbers_and_escapes() {
    let value = object(vec![
        ("int", 3.into()),
        ("float", 1.0.into()),
        ("nan", f64::NAN.into()),
        ("text", "say \"hi\"\n".into()),
    ]);
    assert_eq!(
        to_json(&value),
        r#"{"int":3,"float":1.0,"nan":null,"text":"say \"hi\"\n"}"#
    );
}

#[test]
fn test_pretty_nesting() {
    let value = object(vec![
        ("tags", Value::from(vec!["a", "b"])),
        ("empty", Value::Array(vec![])),
    ]);
    assert_eq!(
        to_json_pretty(&value),
        "{\n  \"tags\": [\n    \"a\",\n    \"b\"\n  ],\n  \"empty\": []\n}"
    );
}
