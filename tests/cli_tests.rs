#![cfg(feature = "cli")]

use arbor_query::cli::{CliError, RunOptions, execute_check, execute_run};
use arbor_query::{ResponseFormat, ResponseShape, Value};

const QUERY: &str = r#"{
    "model": "Person",
    "where": [
        { "field": "age", "op": ">", "value": ":minAge" }
    ],
    "select": ["name"]
}"#;

const RECORDS: &str = r#"{
    "p1": { "name": "Mark", "age": 41 },
    "p2": { "name": "Ann", "age": 25 }
}"#;

fn options() -> RunOptions {
    RunOptions {
        query: QUERY.to_string(),
        input: Some(RECORDS.to_string()),
        variables: Some(r#"{ "minAge": 30 }"#.to_string()),
        ..Default::default()
    }
}

#[test]
fn test_run_projects_matches() {
    let output = execute_run(&options()).unwrap();
    assert_eq!(arbor_query::to_json(&output), r#"{"p1":{"name":"Mark"}}"#);
}

#[test]
fn test_run_with_format_and_shape() {
    let opts = RunOptions {
        format: ResponseFormat::Records,
        shape: ResponseShape::Array,
        ..options()
    };
    let output = execute_run(&opts).unwrap();
    assert_eq!(
        arbor_query::to_json(&output),
        r#"[{"name":"Mark","age":41}]"#
    );
}

#[test]
fn test_run_without_match_prints_null() {
    let opts = RunOptions {
        variables: Some(r#"{ "minAge": 90 }"#.to_string()),
        ..options()
    };
    assert_eq!(execute_run(&opts).unwrap(), Value::Null);
}

#[test]
fn test_run_input_errors() {
    let missing = RunOptions {
        input: None,
        ..options()
    };
    assert!(matches!(execute_run(&missing), Err(CliError::NoInput)));

    let array = RunOptions {
        input: Some("[1, 2]".to_string()),
        ..options()
    };
    let err = execute_run(&array).unwrap_err();
    assert_eq!(err.to_string(), "records must be a JSON object");

    let bad_vars = RunOptions {
        variables: Some("true".to_string()),
        ..options()
    };
    assert!(matches!(
        execute_run(&bad_vars),
        Err(CliError::NotAnObject("variables"))
    ));
}

#[test]
fn test_check_summary() {
    let summary = execute_check(
        r#"{
            "model": "Person",
            "where": [
                { "field": "country", "value": "CO" },
                { "join": "or", "vf": "friends", "match": { "name": "Mark" } }
            ],
            "select": ["name"],
            "include": { "pets": {} }
        }"#,
    )
    .unwrap();

    assert_eq!(summary.model.as_deref(), Some("Person"));
    assert_eq!(summary.nodes, 3);
    assert_eq!(summary.constraints, 2);
    assert_eq!(summary.virtual_fields, 1);
    assert_eq!(summary.includes, 1);
    assert_eq!(summary.selected, vec!["name"]);
    assert!(!summary.has_variables);
    assert!(summary.to_string().starts_with("model: Person\nnodes: 3\n"));
}

#[test]
fn test_check_reports_query_errors() {
    let err = execute_check(r#"{ "where": [ { "field": "a", "op": "??" } ] }"#).unwrap_err();
    assert_eq!(err.to_string(), "query error: unknown operator '??'");
}
