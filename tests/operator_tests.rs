use arbor_query::{Operator, QueryError, Value};

fn s(v: &str) -> Value {
    Value::from(v)
}

#[test]
fn test_parse_operators() {
    let cases = [
        ("=", Operator::Equal),
        ("==", Operator::Equal),
        ("!=", Operator::NotEqual),
        ("<>", Operator::NotEqual),
        ("<", Operator::LessThan),
        (">=", Operator::GreaterEqual),
        ("IN", Operator::In),
        (" like ", Operator::Like),
        ("regexp", Operator::Matches),
        ("matches", Operator::Matches),
    ];
    for (text, expected) in cases {
        assert_eq!(text.parse::<Operator>(), Ok(expected), "parsing {text:?}");
    }
    assert_eq!(
        "between".parse::<Operator>(),
        Err(QueryError::UnknownOperator("between".to_string()))
    );
}

#[test]
fn test_display_round_trips() {
    for op in [Operator::LessEqual, Operator::In, Operator::Like, Operator::Matches] {
        assert_eq!(op.to_string().parse::<Operator>(), Ok(op));
    }
}

#[test]
fn test_numeric_equality_across_types() {
    assert!(Operator::Equal.test(&Value::from(1), &Value::from(1.0)));
    assert!(Operator::NotEqual.test(&Value::from(1), &Value::from(1.5)));
    assert!(!Operator::Equal.test(&Value::from(1), &s("1")));
}

#[test]
fn test_ordering() {
    assert!(Operator::LessThan.test(&Value::from(2), &Value::from(2.5)));
    assert!(Operator::GreaterEqual.test(&Value::from(3.0), &Value::from(3)));
    assert!(Operator::LessThan.test(&s("apple"), &s("banana")));
    assert!(!Operator::LessThan.test(&Value::Null, &Value::from(1)));
    assert!(!Operator::GreaterThan.test(&s("10"), &Value::from(9)));
}

#[test]
fn test_in() {
    let allowed = Value::from(vec![s("CO"), s("TX")]);
    assert!(Operator::In.test(&s("TX"), &allowed));
    assert!(!Operator::In.test(&s("NY"), &allowed));
    assert!(Operator::In.test(&Value::from(2), &Value::from(vec![1.0, 2.0])));
    assert!(Operator::In.test(&s("CO"), &s("CO")));
}

#[test]
fn test_like() {
    assert!(Operator::Like.test(&s("Mark Smith"), &s("mark%")));
    assert!(Operator::Like.test(&s("cat"), &s("c_t")));
    assert!(!Operator::Like.test(&s("cart"), &s("c_t")));
    assert!(Operator::Like.test(&s("a.b"), &s("a.b")));
    assert!(!Operator::Like.test(&s("axb"), &s("a.b")));
    assert!(!Operator::Like.test(&Value::from(5), &s("%")));
}

#[test]
fn test_matches() {
    assert!(Operator::Matches.test(&s("order-1234"), &s(r"^order-\d+$")));
    assert!(!Operator::Matches.test(&s("order-x"), &s(r"^order-\d+$")));
}

#[test]
fn test_validate_patterns() {
    assert!(Operator::Matches.validate(&s("(")).is_err());
    assert!(Operator::Like.validate(&s("(%")).is_ok());
    assert!(Operator::Equal.validate(&s("(")).is_ok());
}

#[test]
fn test_compiled_patterns() {
    let like = Operator::Like.compile(&s("mark%")).unwrap().unwrap();
    assert!(Operator::Like.test_compiled(&s("Mark Smith"), &s("mark%"), Some(&like)));
    assert!(!Operator::Like.test_compiled(&Value::from(5), &s("mark%"), Some(&like)));

    assert_eq!(Operator::Equal.compile(&s("x")), Ok(None));
    assert_eq!(Operator::Like.compile(&Value::from(3)), Ok(None));
    assert!(Operator::Matches.compile(&s("(")).is_err());
    assert!(Operator::Equal.test_compiled(&s("x"), &s("x"), None));
}
