//! Filter semantics against a populated store

mod common;

use common::*;
use quiver_core::{Event, EventStore, Filter, FtsVersion, IndexingPolicy, StoreConfig};

fn tagged(id: &str, created_at: i64, values: &[&str]) -> Event {
    let mut builder = event(id, 1, ALICE, created_at);
    for value in values {
        builder = builder.add_tag(vec!["t", value]);
    }
    builder.build()
}

fn populate(store: &mut EventStore, events: &[Event]) {
    store
        .transaction(|batch| {
            for event in events {
                batch.insert(event)?;
            }
            Ok(())
        })
        .unwrap();
}

#[test]
fn test_ids_round_trip_newest_first() {
    let (mut store, _dir) = create_test_store();
    let events: Vec<Event> = (0..10)
        .map(|i| event(&format!("id{i:02}"), 1, ALICE, 1000 + (i % 4)).build())
        .collect();
    populate(&mut store, &events);

    let filter = Filter::new().ids(events.iter().map(|e| e.id.clone()));
    let first = store.query(&filter).unwrap();
    let second = store.query(&filter).unwrap();

    assert_eq!(first.len(), 10);
    assert_eq!(first, second);
    for pair in first.windows(2) {
        let (a, b) = (&pair[0], &pair[1]);
        assert!(a.created_at > b.created_at || (a.created_at == b.created_at && a.id < b.id));
    }
}

#[test]
fn test_tag_or_versus_and() {
    let (mut store, _dir) = create_test_store();
    populate(
        &mut store,
        &[
            tagged("only_a", 100, &["a"]),
            tagged("only_b", 200, &["b"]),
            tagged("both", 300, &["a", "b"]),
        ],
    );

    let any = stored_ids(&store, &Filter::new().tag("t", ["a", "b"]));
    assert_eq!(any, vec!["both", "only_b", "only_a"]);

    let all = stored_ids(&store, &Filter::new().tag_all("t", ["a", "b"]));
    assert_eq!(all, vec!["both"]);
}

#[test]
fn test_tag_and_with_or_on_other_name() {
    let (mut store, _dir) = create_test_store();
    populate(
        &mut store,
        &[
            event("x", 1, ALICE, 100)
                .add_tag(vec!["t", "a"])
                .add_tag(vec!["t", "b"])
                .add_tag(vec!["p", BOB])
                .build(),
            event("y", 1, ALICE, 200)
                .add_tag(vec!["t", "a"])
                .add_tag(vec!["t", "b"])
                .build(),
        ],
    );

    let filter = Filter::new().tag_all("t", ["a", "b"]).tag("p", [BOB, ALICE]);
    assert_eq!(stored_ids(&store, &filter), vec!["x"]);
}

#[test]
fn test_limit_returns_newest() {
    let (mut store, _dir) = create_test_store();
    let events: Vec<Event> = (0..20).map(|i| tagged(&format!("n{i:02}"), 100 + i, &["x"])).collect();
    populate(&mut store, &events);

    let tag_limited = stored_ids(&store, &Filter::new().tag("t", ["x"]).limit(3));
    assert_eq!(tag_limited, vec!["n19", "n18", "n17"]);

    let kind_limited = stored_ids(&store, &Filter::new().kinds([1]).limit(2));
    assert_eq!(kind_limited, vec!["n19", "n18"]);

    let union_limited = store
        .query_many(&[
            Filter::new().kinds([1]).limit(1),
            Filter::new().tag("t", ["x"]).since(105).until(106),
        ])
        .unwrap();
    assert_eq!(ids(&union_limited), vec!["n19", "n06", "n05"]);
}

#[test]
fn test_limit_ties_break_by_id() {
    let (mut store, _dir) = create_test_store();
    populate(
        &mut store,
        &[
            tagged("c", 100, &["x"]),
            tagged("a", 100, &["x"]),
            tagged("b", 100, &["x"]),
        ],
    );

    assert_eq!(stored_ids(&store, &Filter::new().tag("t", ["x"]).limit(2)), vec!["a", "b"]);
}

#[test]
fn test_union_has_no_duplicates() {
    let (mut store, _dir) = create_test_store();
    populate(
        &mut store,
        &[
            tagged("a", 100, &["x"]),
            tagged("b", 200, &["x", "y"]),
            tagged("c", 300, &["y"]),
        ],
    );

    let filters = [Filter::new().tag("t", ["x"]), Filter::new().tag("t", ["y"])];
    let found = store.query_many(&filters).unwrap();
    assert_eq!(ids(&found), vec!["c", "b", "a"]);
    assert_eq!(store.count_many(&filters).unwrap(), 3);
}

#[test]
fn test_streaming_matches_collected() {
    let (mut store, _dir) = create_test_store();
    populate(&mut store, &[tagged("a", 1, &["x"]), tagged("b", 2, &["x"])]);

    let mut streamed = Vec::new();
    store
        .query_each(&Filter::new().tag("t", ["x"]), |event| streamed.push(event.id))
        .unwrap();
    assert_eq!(streamed, vec!["b", "a"]);

    let mut many = Vec::new();
    store
        .query_many_each(&[Filter::new().ids(["a"]), Filter::new().ids(["b"])], |event| {
            many.push(event.id)
        })
        .unwrap();
    assert_eq!(many, vec!["b", "a"]);
}

#[test]
fn test_time_range_is_inclusive() {
    let (mut store, _dir) = create_test_store();
    populate(
        &mut store,
        &[
            tagged("t1", 100, &["x"]),
            tagged("t2", 200, &["x"]),
            tagged("t3", 300, &["x"]),
        ],
    );

    let by_tag = Filter::new().tag("t", ["x"]).since(100).until(200);
    assert_eq!(stored_ids(&store, &by_tag), vec!["t2", "t1"]);

    let by_header = Filter::new().kinds([1]).since(200).until(300);
    assert_eq!(stored_ids(&store, &by_header), vec!["t3", "t2"]);
}

#[test]
fn test_authors_and_kinds_with_tags() {
    let (mut store, _dir) = create_test_store();
    populate(
        &mut store,
        &[
            event("alice_note", 1, ALICE, 100).add_tag(vec!["t", "x"]).build(),
            event("bob_note", 1, BOB, 200).add_tag(vec!["t", "x"]).build(),
            event("alice_repost", 6, ALICE, 300).add_tag(vec!["t", "x"]).build(),
        ],
    );

    let filter = Filter::new().tag("t", ["x"]).authors([ALICE]).kinds([1, 6]);
    assert_eq!(stored_ids(&store, &filter), vec!["alice_repost", "alice_note"]);
}

#[test]
fn test_d_tag_filters_use_header_column() {
    let (mut store, _dir) = create_test_store();
    populate(
        &mut store,
        &[
            event("post", 30023, ALICE, 100).add_tag(vec!["d", "hello"]).build(),
            event("draft", 30024, ALICE, 100).add_tag(vec!["d", "hello"]).build(),
            event("other", 30023, ALICE, 100).add_tag(vec!["d", "bye"]).build(),
            event("note", 1, ALICE, 100).add_tag(vec!["d", "hello"]).build(),
        ],
    );

    let found = stored_ids(
        &store,
        &Filter::new().kinds([30023, 30024]).tag("d", ["hello"]),
    );
    assert_eq!(found, vec!["draft", "post"]);

    // Two different d values can never both match
    assert!(
        store
            .query(&Filter::new().tag_all("d", ["hello", "bye"]))
            .unwrap()
            .is_empty()
    );
}

#[test]
fn test_empty_sets_match_nothing() {
    let (mut store, _dir) = create_test_store();
    populate(&mut store, &[tagged("a", 1, &["x"])]);

    assert!(store.query(&Filter::new().ids(Vec::<String>::new())).unwrap().is_empty());
    assert!(store.query(&Filter::new().kinds([])).unwrap().is_empty());
    assert!(store.query(&Filter::new().tag("t", Vec::<String>::new())).unwrap().is_empty());
    assert_eq!(store.query(&Filter::new().tag_all("t", Vec::<String>::new())).unwrap().len(), 1);
}

#[test]
fn test_unfilled_returns_everything() {
    let (mut store, _dir) = create_test_store();
    populate(&mut store, &[tagged("a", 1, &[]), tagged("b", 2, &[])]);

    assert_eq!(stored_ids(&store, &Filter::new()), vec!["b", "a"]);
    assert_eq!(store.count(&Filter::new()).unwrap(), 2);
    assert!(store.query_many(&[]).unwrap().is_empty());
}

#[test]
fn test_search() {
    let (mut store, _dir) = create_test_store();
    populate(
        &mut store,
        &[
            event("rust", 1, ALICE, 100).content("Writing a relay in Rust").build(),
            event("coffee", 1, BOB, 200).content("Morning coffee").build(),
            event("article", 30023, ALICE, 300)
                .add_tag(vec!["d", "a"])
                .add_tag(vec!["title", "Rust ownership explained"])
                .content("long form")
                .build(),
            event("reaction", 7, ALICE, 400).content("rust").build(),
        ],
    );

    assert_eq!(store.fts_version(), FtsVersion::Fts5Unicode);
    assert_eq!(stored_ids(&store, &Filter::new().search("rust")), vec!["article", "rust"]);
    assert_eq!(
        stored_ids(&store, &Filter::new().search("rust").authors([ALICE]).kinds([1])),
        vec!["rust"]
    );
    assert!(store.query(&Filter::new().search("\"unbalanced OR")).is_ok());
}

#[test]
fn test_search_with_tags() {
    let (mut store, _dir) = create_test_store();
    populate(
        &mut store,
        &[
            event("a", 1, ALICE, 100).content("nostr rocks").add_tag(vec!["t", "x"]).build(),
            event("b", 1, ALICE, 200).content("nostr rocks").build(),
        ],
    );

    let filter = Filter::new().search("rocks").tag("t", ["x"]);
    assert_eq!(stored_ids(&store, &filter), vec!["a"]);
}

#[test]
fn test_search_without_engine_matches_nothing() {
    let (mut store, _dir) = create_store_with(StoreConfig::default().without_full_text());
    populate(&mut store, &[event("a", 1, ALICE, 100).content("hello").build()]);

    assert_eq!(store.fts_version(), FtsVersion::Disabled);
    assert!(store.query(&Filter::new().search("hello")).unwrap().is_empty());
    assert_eq!(store.count(&Filter::new().kinds([1])).unwrap(), 1);
}

#[test]
fn test_deleted_rows_leave_search_index() {
    let (mut store, _dir) = create_test_store();
    populate(&mut store, &[event("a", 1, ALICE, 100).content("findme").build()]);

    assert_eq!(store.delete(&Filter::new().ids(["a"])).unwrap(), 1);
    let leftovers: i64 = store
        .connection()
        .query_row("SELECT COUNT(*) FROM event_fts", [], |row| row.get(0))
        .unwrap();
    assert_eq!(leftovers, 0);
}

#[test]
fn test_delete_and_count_share_selection() {
    let (mut store, _dir) = create_test_store();
    populate(
        &mut store,
        &[
            tagged("a", 1, &["x"]),
            tagged("b", 2, &["x"]),
            tagged("c", 3, &["y"]),
        ],
    );

    let filter = Filter::new().tag("t", ["x"]);
    assert_eq!(store.count(&filter).unwrap(), 2);
    assert_eq!(store.delete(&filter).unwrap(), 2);
    assert_eq!(store.count(&filter).unwrap(), 0);
    assert_eq!(store.stats().unwrap().tag_rows, 1);

    assert_eq!(store.delete(&Filter::new()).unwrap(), 0);
    assert_eq!(
        store
            .delete_many(&[Filter::new().ids(["c"]), Filter::new().ids(["missing"])])
            .unwrap(),
        1
    );
}

#[test]
fn test_every_policy_gives_same_answers() {
    let policies = [
        IndexingPolicy::default(),
        IndexingPolicy::all(),
        IndexingPolicy {
            order_by_id: false,
            index_tag_hash_kind_pubkey: false,
            ..IndexingPolicy::default()
        },
    ];

    for policy in policies {
        let (mut store, _dir) = create_store_with(StoreConfig::default().with_policy(policy));
        populate(
            &mut store,
            &[
                event("a", 1, ALICE, 100).add_tag(vec!["p", BOB]).build(),
                event("b", 4, ALICE, 200).add_tag(vec!["p", BOB]).build(),
                event("c", 1, BOB, 300).add_tag(vec!["p", ALICE]).build(),
            ],
        );

        let filter = Filter::new().kinds([1, 4]).authors([ALICE]).tag("p", [BOB]);
        assert_eq!(stored_ids(&store, &filter), vec!["b", "a"]);
        assert_eq!(stored_ids(&store, &Filter::new().since(150)), vec!["c", "b"]);
    }
}

#[test]
fn test_explain_shows_index_use() {
    let (store, _dir) = create_test_store();
    let plan = store
        .explain_many(&[
            Filter::new().tag("p", [BOB]).kinds([4]),
            Filter::new().kinds([0]).authors([ALICE]),
        ])
        .unwrap();

    assert!(plan.contains("UNION"));
    assert!(plan.contains("query_by_tags_hash_kind"));
}

#[test]
fn test_values_are_bound_not_inlined() {
    let (mut store, _dir) = create_test_store();
    populate(&mut store, &[tagged("a", 1, &["x"])]);

    let hostile = "x'); DROP TABLE event_headers; --";
    assert!(store.query(&Filter::new().ids([hostile]).tag("t", [hostile])).unwrap().is_empty());
    assert_eq!(store.count(&Filter::new()).unwrap(), 1);
}
