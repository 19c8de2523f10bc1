use arbor_query::{NodeId, Predicate, Query, QueryBuilder, QueryError};

fn group_on<'p>(field: &'p str) -> Predicate<'p> {
    Predicate::group(move |g| {
        g.where_((field, 1))?;
        Ok(())
    })
}

fn child(q: &Query, index: usize) -> NodeId {
    q.view().child(index).unwrap().unwrap().id()
}

fn bucket(q: &Query, group_index: usize) -> Vec<NodeId> {
    q.siblings(q.root())
        .unwrap()
        .unwrap()
        .group(group_index)
        .map(|g| g.members.iter().map(|m| m.query).collect())
        .unwrap_or_default()
}

#[test]
fn test_groups_in_one_run_share() -> Result<(), QueryError> {
    let mut q = Query::new("Row");
    q.where_(group_on("a"))?.and_where(group_on("b"))?;

    let (a, b) = (child(&q, 0), child(&q, 1));
    assert_eq!(bucket(&q, 0), vec![a, b]);
    assert!(q.can_share(a, b)?);
    assert_eq!(q.shareable_siblings(a)?, vec![b]);
    assert_eq!(q.shareable_siblings(b)?, vec![a]);
    Ok(())
}

#[test]
fn test_runs_get_separate_buckets() -> Result<(), QueryError> {
    let mut q = Query::new("Row");
    q.where_(group_on("a"))?.or_where(group_on("b"))?;

    let (a, b) = (child(&q, 0), child(&q, 1));
    assert_eq!(bucket(&q, 0), vec![a]);
    assert_eq!(bucket(&q, 1), vec![b]);
    assert!(q.shareable_siblings(a)?.is_empty());
    Ok(())
}

#[test]
fn test_or_between_branches_prevents_sharing() -> Result<(), QueryError> {
    let mut q = Query::new("Row");
    q.where_(Predicate::group(|g| {
        g.where_(group_on("a"))?.or_where(group_on("b"))?;
        Ok(())
    }))?;

    let outer = q.view().child(0)?.unwrap();
    let a = outer.child(0)?.unwrap().id();
    let b = outer.child(1)?.unwrap().id();
    assert_eq!(bucket(&q, 0), vec![outer.id(), a, b]);
    assert!(!q.can_share(a, b)?);
    Ok(())
}

#[test]
fn test_and_between_branches_allows_sharing() -> Result<(), QueryError> {
    let mut q = Query::new("Row");
    q.where_(Predicate::group(|g| {
        g.where_(group_on("a"))?.and_where(group_on("b"))?;
        Ok(())
    }))?;

    let outer = q.view().child(0)?.unwrap();
    let a = outer.child(0)?.unwrap().id();
    let b = outer.child(1)?.unwrap().id();
    assert!(q.can_share(a, b)?);
    Ok(())
}

#[test]
fn test_containing_node_never_shares() -> Result<(), QueryError> {
    let mut q = Query::new("Row");
    q.where_(Predicate::group(|g| {
        g.where_(group_on("a"))?;
        Ok(())
    }))?;

    let outer = child(&q, 0);
    let inner = q.node(outer)?.child(0)?.unwrap().id();
    assert!(!q.can_share(outer, inner)?);
    assert!(q.shareable_siblings(outer)?.is_empty());
    Ok(())
}

#[test]
fn test_different_models_never_share() -> Result<(), QueryError> {
    let mut q = Query::new("Person");
    q.where_(Predicate::vf_fields("friends", [("name", "Mark")]))?
        .and_where(Predicate::vf_fields("pets", [("name", "Rex")]))?
        .and_where(Predicate::vf_fields("friends", [("name", "Bob")]))?;

    let (friends, pets, more_friends) = (child(&q, 0), child(&q, 1), child(&q, 2));
    assert!(!q.can_share(friends, pets)?);
    assert!(q.can_share(friends, more_friends)?);
    assert_eq!(q.shareable_siblings(friends)?, vec![more_friends]);
    Ok(())
}

#[test]
fn test_nested_virtual_field_groups_do_not_share() -> Result<(), QueryError> {
    let owner_with_pet = |f: &mut arbor_query::QueryMut<'_>| -> Result<(), QueryError> {
        f.where_(Predicate::vf_fields("pets", [("kind", "dog")]))?;
        Ok(())
    };
    let mut q = Query::new("Person");
    q.where_(Predicate::vf("friends", owner_with_pet))?
        .and_where(Predicate::vf("friends", owner_with_pet))?;

    let (first, second) = (child(&q, 0), child(&q, 1));
    let first_pets = q.node(first)?.child(0)?.unwrap().id();
    let second_pets = q.node(second)?.child(0)?.unwrap().id();

    assert_eq!(q.node(first_pets)?.node()?.model(), Some("Person.friends.pets"));
    assert!(q.can_share(first, second)?);
    assert!(!q.can_share(first_pets, second_pets)?);
    assert_eq!(bucket(&q, 0), vec![first, first_pets, second, second_pets]);
    Ok(())
}

#[test]
fn test_removing_a_collapsed_run_rekeys_buckets() -> Result<(), QueryError> {
    let mut q = Query::new("Row");
    q.where_(group_on("a"))?
        .or_where(("b", 1))?
        .or_where(group_on("c"))?;

    let (a, c) = (child(&q, 0), child(&q, 2));
    assert_eq!(bucket(&q, 2), vec![c]);

    q.remove_constraint(1)?;
    assert_eq!(bucket(&q, 0), vec![a]);
    assert_eq!(bucket(&q, 1), vec![c]);
    assert!(bucket(&q, 2).is_empty());
    Ok(())
}

#[test]
fn test_removal_deregisters_nested_nodes() -> Result<(), QueryError> {
    let mut q = Query::new("Row");
    q.where_(Predicate::group(|g| {
        g.where_(group_on("a"))?.and_where(group_on("b"))?;
        Ok(())
    }))?
    .and_where(group_on("c"))?;

    assert_eq!(bucket(&q, 0).len(), 4);
    q.remove_constraint(0)?;

    let c = child(&q, 0);
    assert_eq!(bucket(&q, 0), vec![c]);
    assert!(q.shareable_siblings(c)?.is_empty());
    Ok(())
}

#[test]
fn test_include_has_its_own_registry() -> Result<(), QueryError> {
    let mut q = Query::new("Person");
    q.where_(group_on("a"))?.include_with("friends", |inc| {
        inc.where_(group_on("name"))?;
        Ok(())
    })?;

    let include = q.view().include("friends")?.unwrap();
    let inner = include.child(0)?.unwrap().id();
    let registry = q.siblings(include.id())?.unwrap();
    assert_eq!(registry.group(0).map(|g| g.members.len()), Some(1));
    assert_eq!(q.tree().top_level(inner)?, include.id());
    assert_eq!(bucket(&q, 0), vec![child(&q, 0)]);
    Ok(())
}

#[test]
fn test_clone_keeps_registry() -> Result<(), QueryError> {
    let mut q = Query::new("Row");
    q.where_(group_on("a"))?.and_where(group_on("b"))?;

    let copy = q.clone();
    assert_eq!(bucket(&copy, 0), bucket(&q, 0));
    assert_eq!(copy.shareable_siblings(child(&copy, 0))?, vec![child(&copy, 1)]);
    Ok(())
}

#[test]
fn test_or_between_virtual_fields_prevents_sharing() -> Result<(), QueryError> {
    let mut q = Query::new("Person");
    q.where_(Predicate::group(|g| {
        g.where_(Predicate::vf_fields("friends", [("name", "Mark")]))?
            .and_where(Predicate::vf_fields("friends", [("name", "Bob")]))?
            .or_where(Predicate::vf_fields("friends", [("name", "Ann")]))?;
        Ok(())
    }))?;

    let outer = q.view().child(0)?.unwrap();
    let mark = outer.child(0)?.unwrap().id();
    let bob = outer.child(1)?.unwrap().id();
    let ann = outer.child(2)?.unwrap().id();
    assert!(q.can_share(mark, bob)?);
    assert!(!q.can_share(bob, ann)?);
    assert!(!q.can_share(mark, ann)?);
    assert_eq!(q.shareable_siblings(mark)?, vec![bob]);
    Ok(())
}

#[test]
fn test_virtual_fields_inside_one_virtual_field_follow_joins() -> Result<(), QueryError> {
    let mut q = Query::new("Person");
    q.where_(Predicate::vf("friends", |f| {
        f.where_(Predicate::vf_fields("pets", [("kind", "dog")]))?
            .and_where(Predicate::vf_fields("pets", [("name", "Rex")]))?
            .or_where(Predicate::vf_fields("pets", [("kind", "cat")]))?;
        Ok(())
    }))?;

    let friends = q.view().child(0)?.unwrap();
    let dog = friends.child(0)?.unwrap().id();
    let rex = friends.child(1)?.unwrap().id();
    let cat = friends.child(2)?.unwrap().id();
    assert!(q.can_share(dog, rex)?);
    assert!(!q.can_share(rex, cat)?);
    assert_eq!(q.shareable_siblings(dog)?, vec![rex]);
    Ok(())
}
