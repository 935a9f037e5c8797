use kinddb::{
    Datastore, Direction, Entity, EntityOptions, Key, KeyValueStore, KindError, ModelSchema,
    Node, Order, Property, Query, Value,
};

fn datastore() -> Datastore {
    let mut ds = Datastore::in_memory();
    ds.register(
        ModelSchema::builder("Single")
            .property(Property::string("a"))
            .build()
            .unwrap(),
    );
    ds.register(
        ModelSchema::builder("Multi")
            .property(Property::string("a").repeated())
            .build()
            .unwrap(),
    );
    for a in ["1", "2", "3", "4", "5", "5", "5", "5"] {
        let mut e = ds
            .create("Single", EntityOptions::default(), [("a", a)])
            .unwrap();
        e.put(&ds).unwrap();
    }
    for values in [
        ["1", "2", "3", "4"],
        ["5", "6", "7", "8"],
        ["9", "0", "1", "2"],
        ["3", "4", "5", "6"],
        ["7", "8", "9", "0"],
        ["1", "2", "3", "4"],
    ] {
        let mut e = ds
            .create("Multi", EntityOptions::default(), [("a", Value::list(values))])
            .unwrap();
        e.put(&ds).unwrap();
    }
    ds
}

fn field(entity: &Entity, name: &str) -> Value {
    entity.get_field(name).unwrap().unwrap()
}

#[test]
fn fetch_all_of_a_kind() {
    let ds = datastore();
    assert_eq!(Query::new("Single").fetch(&ds, None).unwrap().len(), 8);
    assert_eq!(Query::new("Multi").count(&ds).unwrap(), 6);
    assert_eq!(Query::all().count(&ds).unwrap(), 14);
}

#[test]
fn filter_get() {
    let ds = datastore();
    let schema = ds.schema("Single").unwrap();
    let a = schema.property("a").unwrap();

    let q = Query::new("Single").filter([a.equals("5").unwrap()]).unwrap();
    let found = q.get(&ds).unwrap().unwrap();
    assert_eq!(field(&found, "a"), Value::from("5"));

    let q = Query::new("Single").filter([a.equals("6").unwrap()]).unwrap();
    assert!(q.get(&ds).unwrap().is_none());
}

#[test]
fn filter_fetch_with_limit() {
    let ds = datastore();
    let q = Query::new("Single")
        .filter([Node::equals("a", "5")])
        .unwrap();
    let all = q.fetch(&ds, None).unwrap();
    assert_eq!(all.len(), 4);
    assert!(all.iter().all(|e| field(e, "a") == Value::from("5")));
    assert_eq!(q.fetch(&ds, Some(2)).unwrap().len(), 2);
    assert!(q.fetch(&ds, Some(0)).unwrap().is_empty());

    let none = Query::new("Single")
        .filter([Node::equals("a", "6")])
        .unwrap();
    assert!(none.fetch(&ds, None).unwrap().is_empty());
}

#[test]
fn iteration_follows_insertion_order() {
    let ds = datastore();
    let seen: Vec<Value> = Query::new("Single")
        .iter(&ds)
        .unwrap()
        .map(|e| field(&e.unwrap(), "a"))
        .collect();
    let expected: Vec<Value> = ["1", "2", "3", "4", "5", "5", "5", "5"]
        .into_iter()
        .map(Value::from)
        .collect();
    assert_eq!(seen, expected);
}

#[test]
fn iteration_is_restartable() {
    let ds = datastore();
    let q = Query::new("Single");
    let first = q.iter(&ds).unwrap().limit(3).count();
    let second = q.iter(&ds).unwrap().count();
    assert_eq!(first, 3);
    assert_eq!(second, 8);
}

#[test]
fn repeated_property_matches_any_element() {
    let ds = datastore();
    let q = Query::new("Multi").filter([Node::equals("a", "1")]).unwrap();
    assert_eq!(q.fetch(&ds, None).unwrap().len(), 3);
    let q = Query::new("Multi")
        .filter([Node::not_equals("a", "1")])
        .unwrap();
    assert_eq!(q.fetch(&ds, None).unwrap().len(), 6);
}

#[test]
fn not_equals_matches_like_lt_or_gt() {
    let ds = datastore();
    for v in ["0", "1", "3", "5", "9"] {
        let ne = Query::new("Single")
            .filter([Node::not_equals("a", v)])
            .unwrap()
            .fetch(&ds, None)
            .unwrap();
        let either = Query::new("Single")
            .filter([Node::or([Node::less_than("a", v), Node::greater_than("a", v)]).unwrap()])
            .unwrap()
            .fetch(&ds, None)
            .unwrap();
        assert_eq!(ne, either);
    }
}

#[test]
fn conjunction_of_disjunction_filters() {
    let ds = datastore();
    let q = Query::new("Single")
        .filter([
            Node::greater_equal("a", "2"),
            Node::or([Node::equals("a", "1"), Node::equals("a", "3"), Node::equals("a", "5")])
                .unwrap(),
        ])
        .unwrap();
    assert!(matches!(q.filters(), Some(Node::Or(clauses)) if clauses.len() == 3));
    let values: Vec<Value> = q
        .fetch(&ds, None)
        .unwrap()
        .iter()
        .map(|e| field(e, "a"))
        .collect();
    assert_eq!(values.len(), 5);
    assert!(values.iter().all(|v| *v == Value::from("3") || *v == Value::from("5")));
}

#[test]
fn ancestor_queries_match_exact_parent() {
    let mut ds = Datastore::in_memory();
    ds.register(ModelSchema::builder("Folder").build().unwrap());
    ds.register(
        ModelSchema::builder("Doc")
            .property(Property::string("title"))
            .build()
            .unwrap(),
    );
    let inbox = Key::new("Folder", "inbox").unwrap();
    let archive = Key::new("Folder", "archive").unwrap();
    for (parent, title) in [(&inbox, "a"), (&inbox, "b"), (&archive, "c")] {
        let mut doc = ds
            .create("Doc", EntityOptions::parent(parent.clone()), [("title", title)])
            .unwrap();
        doc.put(&ds).unwrap();
    }
    let mut loose = ds
        .create("Doc", EntityOptions::default(), [("title", "d")])
        .unwrap();
    loose.put(&ds).unwrap();

    let in_inbox = Query::new("Doc").with_ancestor(inbox.clone()).unwrap();
    assert_eq!(in_inbox.count(&ds).unwrap(), 2);
    let in_archive = Query::new("Doc").with_ancestor(archive).unwrap();
    assert_eq!(in_archive.count(&ds).unwrap(), 1);
    assert_eq!(Query::new("Doc").count(&ds).unwrap(), 4);

    let filtered = in_inbox
        .filter([Node::equals("title", "b")])
        .unwrap()
        .fetch(&ds, None)
        .unwrap();
    assert_eq!(filtered.len(), 1);
    assert_eq!(filtered[0].key().unwrap().parent(), Some(inbox));
}

#[test]
fn fetch_keeps_scan_order_while_fetch_ordered_sorts() {
    let ds = datastore();
    let q = Query::new("Single").order([Order::property("a", Direction::Descending)]);
    let scanned: Vec<Value> = q
        .fetch(&ds, Some(3))
        .unwrap()
        .iter()
        .map(|e| field(e, "a"))
        .collect();
    assert_eq!(scanned, vec![Value::from("1"), Value::from("2"), Value::from("3")]);

    let sorted: Vec<Value> = q
        .fetch_ordered(&ds, Some(5))
        .unwrap()
        .iter()
        .map(|e| field(e, "a"))
        .collect();
    assert_eq!(
        sorted,
        ["5", "5", "5", "5", "4"].into_iter().map(Value::from).collect::<Vec<_>>()
    );
}

#[test]
fn property_reference_orders_ascending() {
    let ds = datastore();
    let schema = ds.schema("Single").unwrap();
    let a = schema.property("a").unwrap();
    let q = Query::new("Single")
        .order([Order::desc("a")])
        .order([a]);
    assert_eq!(
        q.orders(),
        Some(&Order::Composite(vec![Order::desc("a"), Order::asc("a")]))
    );
}

#[test]
fn query_over_unregistered_kind_reports_it() {
    let ds = datastore();
    let stray = Key::new("Stray", 1).unwrap();
    ds.store().put(&stray, Default::default()).unwrap();
    let result = Query::all().fetch(&ds, None);
    assert!(matches!(result, Err(KindError::UnknownKind(kind)) if kind == "Stray"));
    assert_eq!(Query::new("Single").count(&ds).unwrap(), 8);
}

#[test]
fn comparison_literal_is_validated_by_property() {
    let ds = datastore();
    let schema = ds.schema("Single").unwrap();
    let a = schema.property("a").unwrap();
    assert!(matches!(a.equals(5), Err(KindError::Validation { .. })));
}
