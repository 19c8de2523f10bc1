use arbor_query::{
    Map, Payload, Predicate, Query, QueryBuilder, QueryError, ResponseFormat, ResponseShape, Value,
};

fn record(pairs: Vec<(&str, Value)>) -> Value {
    pairs.into_iter().collect()
}

fn map(pairs: Vec<(&str, Value)>) -> Map {
    pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
}

fn people() -> Map {
    map(vec![
        (
            "p1",
            record(vec![
                ("name", "Mark".into()),
                ("country", "CO".into()),
                ("age", 41.into()),
            ]),
        ),
        ("p2", record(vec![("name", "Ann".into()), ("country", "NY".into())])),
        (
            "p3",
            record(vec![
                ("name", "Bob".into()),
                ("country", "TX".into()),
                ("age", 30.into()),
            ]),
        ),
    ])
}

fn co_or_tx() -> Result<Query, QueryError> {
    let mut q = Query::new("Person");
    q.where_(("country", "CO"))?
        .or_where(("country", "TX"))?
        .select("name")?;
    Ok(q)
}

fn name_only(name: &str) -> Value {
    record(vec![("name", name.into())])
}

#[test]
fn test_get_all() -> Result<(), QueryError> {
    let q = co_or_tx()?;
    let mut payload = Payload::new(people());
    let result = q.get_all(&mut payload)?;

    let expected = record(vec![("p1", name_only("Mark")), ("p3", name_only("Bob"))]);
    assert_eq!(result, expected);
    assert_eq!(payload.formatted_response, Some(expected));
    assert_eq!(payload.results.as_ref().map(Map::len), Some(2));
    assert_eq!(payload.records.len(), 3);
    Ok(())
}

#[test]
fn test_get_all_array() -> Result<(), QueryError> {
    let q = co_or_tx()?;
    let result = q.get_all_array(&mut Payload::new(people()))?;
    assert_eq!(
        result,
        Value::Array(vec![name_only("Mark"), name_only("Bob")])
    );
    Ok(())
}

#[test]
fn test_get_one() -> Result<(), QueryError> {
    let q = co_or_tx()?;
    let mut payload = Payload::new(people());
    assert_eq!(q.get_one(&mut payload)?, name_only("Mark"));
    assert_eq!(payload.results.as_ref().map(Map::len), Some(1));

    let full = q.get_one_record(&mut payload)?;
    assert_eq!(full.get("age"), Some(&Value::Integer(41)));
    Ok(())
}

#[test]
fn test_get_all_records() -> Result<(), QueryError> {
    let q = co_or_tx()?;
    let people = people();
    let result = q.get_all_records(&mut Payload::new(people.clone()))?;
    let expected = map(vec![
        ("p1", people["p1"].clone()),
        ("p3", people["p3"].clone()),
    ]);
    assert_eq!(result, Value::Object(expected));

    let array = q.get_all_records_array(&mut Payload::new(people.clone()))?;
    assert_eq!(
        array,
        Value::Array(vec![people["p1"].clone(), people["p3"].clone()])
    );
    Ok(())
}

#[test]
fn test_get_uses_payload_settings() -> Result<(), QueryError> {
    let q = co_or_tx()?;
    let mut payload = Payload::new(people())
        .with_format(ResponseFormat::Records)
        .with_shape(ResponseShape::Single);
    let result = q.get(&mut payload)?;
    assert_eq!(result.get("country"), Some(&Value::from("CO")));
    Ok(())
}

#[test]
fn test_no_match_is_null() -> Result<(), QueryError> {
    let mut q = Query::new("Person");
    q.where_(("country", "FR"))?;

    let mut payload = Payload::new(people());
    assert_eq!(q.get_all(&mut payload)?, Value::Null);
    assert_eq!(payload.results, None);
    assert_eq!(payload.formatted_response, Some(Value::Null));
    assert_eq!(q.get_one(&mut payload)?, Value::Null);
    Ok(())
}

#[test]
fn test_variables_from_payload() -> Result<(), QueryError> {
    let mut q = Query::new("Person");
    q.where_(("country", ":country"))?.select("name")?;

    let mut payload =
        Payload::new(people()).with_variables(map(vec![("country", "TX".into())]));
    let result = q.get_all_array(&mut payload)?;
    assert_eq!(result, Value::Array(vec![name_only("Bob")]));
    Ok(())
}

#[test]
fn test_build_result_with_alias() -> Result<(), QueryError> {
    let mut q = Query::new("Person");
    q.select(("name", "fullName"))?.select("age")?;

    let rec = record(vec![("name", "Ann".into()), ("country", "NY".into())]);
    let result = q.build_result(&Map::new(), &rec)?;
    assert_eq!(result, record(vec![("fullName", "Ann".into())]));
    Ok(())
}

#[test]
fn test_build_result_passes_record_through_without_select() -> Result<(), QueryError> {
    let q = Query::new("Person");
    let rec = record(vec![("name", "Ann".into()), ("country", "NY".into())]);
    assert_eq!(q.build_result(&Map::new(), &rec)?, rec);
    assert_eq!(q.build_result(&Map::new(), &Value::from(3))?, Value::Null);
    Ok(())
}

#[test]
fn test_build_result_keeps_select_order() -> Result<(), QueryError> {
    let mut q = Query::new("Person");
    q.select(["country", "name"])?;
    let rec = record(vec![("name", "Ann".into()), ("country", "NY".into())]);
    let result = q.build_result(&Map::new(), &rec)?;
    let keys: Vec<&String> = result.as_object().unwrap().keys().collect();
    assert_eq!(keys, ["country", "name"]);
    Ok(())
}

fn person_with(friends: Value) -> Value {
    record(vec![("name", "Mark".into()), ("friends", friends)])
}

fn friend(name: &str, age: i64) -> Value {
    record(vec![("name", name.into()), ("age", age.into())])
}

#[test]
fn test_include_listed_relation() -> Result<(), QueryError> {
    let mut q = Query::new("Person");
    q.select("name")?.include("friends", "name")?;

    let rec = person_with(Value::Array(vec![friend("Ann", 25), friend("Bob", 30)]));
    let expected = record(vec![
        ("name", "Mark".into()),
        (
            "friends",
            Value::Array(vec![name_only("Ann"), name_only("Bob")]),
        ),
    ]);
    assert_eq!(q.build_result(&Map::new(), &rec)?, expected);
    Ok(())
}

#[test]
fn test_include_keyed_relation_is_filtered() -> Result<(), QueryError> {
    let mut q = Query::new("Person");
    q.select("name")?.include_with("friends", |inc| {
        inc.where_(("age", arbor_query::Operator::GreaterThan, 26))?
            .select("name")?;
        Ok(())
    })?;

    let rec = person_with(record(vec![
        ("f1", friend("Ann", 25)),
        ("f2", friend("Bob", 30)),
    ]));
    let result = q.build_result(&Map::new(), &rec)?;
    assert_eq!(
        result.get("friends"),
        Some(&record(vec![("f2", name_only("Bob"))]))
    );
    Ok(())
}

#[test]
fn test_include_single_relation() -> Result<(), QueryError> {
    let mut q = Query::new("Person");
    q.include("employer", "name")?;

    let rec = record(vec![(
        "employer",
        record(vec![("name", "Acme".into()), ("size", 10.into())]),
    )]);
    let result = q.build_result(&Map::new(), &rec)?;
    assert_eq!(result.get("employer"), Some(&name_only("Acme")));
    Ok(())
}

#[test]
fn test_include_without_matches_is_null() -> Result<(), QueryError> {
    let mut q = Query::new("Person");
    q.include_with("friends", |inc| {
        inc.where_(("age", 99))?;
        Ok(())
    })?;

    let rec = person_with(Value::Array(vec![friend("Ann", 25)]));
    assert_eq!(q.build_result(&Map::new(), &rec)?.get("friends"), Some(&Value::Null));

    let missing = record(vec![("name", "Mark".into())]);
    assert_eq!(q.build_result(&Map::new(), &missing)?.get("friends"), Some(&Value::Null));
    Ok(())
}

#[test]
fn test_include_alias() -> Result<(), QueryError> {
    let mut q = Query::new("Person");
    q.include_with("friends", |inc| {
        inc.select("name")?.use_alias("buddies")?;
        Ok(())
    })?;

    let rec = person_with(Value::Array(vec![friend("Ann", 25)]));
    let result = q.build_result(&Map::new(), &rec)?;
    assert_eq!(result.get("buddies"), Some(&Value::Array(vec![name_only("Ann")])));
    assert!(result.get("friends").is_some());
    Ok(())
}

#[test]
fn test_include_skipped_by_directive() -> Result<(), QueryError> {
    let mut q = Query::new("Person");
    q.select("name")?.include_with("friends", |inc| {
        inc.select("name")?
            .add_directive("skip", map(vec![("if", ":hideFriends".into())]))?;
        Ok(())
    })?;

    let rec = person_with(Value::Array(vec![friend("Ann", 25)]));
    let shown = q.build_result(&Map::new(), &rec)?;
    assert!(shown.get("friends").is_some());

    let vars = map(vec![("hideFriends", true.into())]);
    let hidden = q.build_result(&vars, &rec)?;
    assert_eq!(hidden, name_only("Mark"));
    Ok(())
}

#[test]
fn test_include_all_passes_related_records_through() -> Result<(), QueryError> {
    let mut q = Query::new("Person");
    q.include_with("friends", |inc| {
        inc.where_(("age", 99))?.select("name")?;
        Ok(())
    })?
    .include_all("friends")?;

    let friends = Value::Array(vec![friend("Ann", 25), friend("Bob", 30)]);
    let rec = person_with(friends.clone());
    assert_eq!(q.build_result(&Map::new(), &rec)?.get("friends"), Some(&friends));
    Ok(())
}

#[test]
fn test_virtual_field_constraint_with_include() -> Result<(), QueryError> {
    let mut q = Query::new("Person");
    q.where_(Predicate::vf_fields("friends", [("name", "Bob")]))?
        .select("name")?
        .include("friends", "age")?;

    let mut payload = Payload::new(map(vec![
        ("p1", person_with(Value::Array(vec![friend("Bob", 30)]))),
        ("p2", person_with(Value::Array(vec![friend("Ann", 25)]))),
    ]));
    let result = q.get_all(&mut payload)?;
    let expected = record(vec![(
        "p1",
        record(vec![
            ("name", "Mark".into()),
            ("friends", Value::Array(vec![record(vec![("age", 30.into())])])),
        ]),
    )]);
    assert_eq!(result, expected);
    Ok(())
}
