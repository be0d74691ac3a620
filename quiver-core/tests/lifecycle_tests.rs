//! Storage rules enforced at write time

mod common;

use common::*;
use quiver_core::{Error, Filter, Rejection};

fn rejection(result: quiver_core::Result<bool>) -> Rejection {
    match result {
        Err(Error::Rejected(rejection)) => rejection,
        other => panic!("expected a rejection, got {other:?}"),
    }
}

#[test]
fn test_replaceable_keeps_newest() {
    let (mut store, _dir) = create_test_store();

    for (id, created_at) in [("m2", 200), ("m1", 100), ("m3", 300)] {
        let _ = store.insert(&event(id, 0, ALICE, created_at).content(id).build());
    }

    let survivors = store.query(&Filter::new().kinds([0]).authors([ALICE])).unwrap();
    assert_eq!(ids(&survivors), vec!["m3"]);
}

#[test]
fn test_replaceable_rejects_older_and_equal() {
    let (mut store, _dir) = create_test_store();
    store.insert(&event("new", 10002, ALICE, 200).build()).unwrap();

    let older = event("old", 10002, ALICE, 100).build();
    assert_eq!(rejection(store.insert(&older)), Rejection::Superseded);

    let tie = event("tie", 10002, ALICE, 200).build();
    assert_eq!(rejection(store.insert(&tie)), Rejection::Superseded);

    assert_eq!(stored_ids(&store, &Filter::new().kinds([10002])), vec!["new"]);
}

#[test]
fn test_replaceable_scoped_by_author_and_kind() {
    let (mut store, _dir) = create_test_store();
    store.insert(&event("a0", 0, ALICE, 100).build()).unwrap();
    store.insert(&event("a3", 3, ALICE, 100).build()).unwrap();
    store.insert(&event("b0", 0, BOB, 100).build()).unwrap();

    assert_eq!(store.count(&Filter::new()).unwrap(), 3);
}

#[test]
fn test_replacement_removes_tag_rows() {
    let (mut store, _dir) = create_test_store();
    store
        .insert(&event("v1", 3, ALICE, 100).add_tag(vec!["p", BOB]).build())
        .unwrap();
    store.insert(&event("v2", 3, ALICE, 200).build()).unwrap();

    assert!(store.query(&Filter::new().tag("p", [BOB])).unwrap().is_empty());
    assert_eq!(store.stats().unwrap().tag_rows, 0);
}

#[test]
fn test_addressable_keeps_newest_per_d_tag() {
    let (mut store, _dir) = create_test_store();

    store
        .insert(&event("x1", 30023, ALICE, 100).add_tag(vec!["d", "x"]).build())
        .unwrap();
    store
        .insert(&event("y1", 30023, ALICE, 150).add_tag(vec!["d", "y"]).build())
        .unwrap();
    store
        .insert(&event("x2", 30023, ALICE, 200).add_tag(vec!["d", "x"]).build())
        .unwrap();

    let older = event("x0", 30023, ALICE, 50).add_tag(vec!["d", "x"]).build();
    assert_eq!(rejection(store.insert(&older)), Rejection::Duplicate);

    let mut found = stored_ids(&store, &Filter::new().kinds([30023]).authors([ALICE]));
    found.sort();
    assert_eq!(found, vec!["x2", "y1"]);
}

#[test]
fn test_addressable_tie_keeps_the_stored_version() {
    let (mut store, _dir) = create_test_store();
    store
        .insert(&event("first", 30000, ALICE, 100).add_tag(vec!["d", "list"]).build())
        .unwrap();

    let tie = event("second", 30000, ALICE, 100).add_tag(vec!["d", "list"]).build();
    assert_eq!(rejection(store.insert(&tie)), Rejection::Duplicate);

    assert_eq!(
        stored_ids(&store, &Filter::new().kinds([30000]).tag("d", ["list"])),
        vec!["first"]
    );
}

#[test]
fn test_addressable_missing_d_tag_is_empty_slot() {
    let (mut store, _dir) = create_test_store();
    store.insert(&event("a", 30078, ALICE, 100).build()).unwrap();
    store
        .insert(&event("b", 30078, ALICE, 200).add_tag(vec!["d", ""]).build())
        .unwrap();

    assert_eq!(stored_ids(&store, &Filter::new().kinds([30078])), vec!["b"]);
}

#[test]
fn test_ephemeral_is_a_silent_no_op() {
    let (mut store, _dir) = create_test_store();
    let typing = event("eph", 25000, ALICE, 100).build();

    assert!(!store.insert(&typing).unwrap());
    assert!(!contains(&store, "eph"));

    let kept = store.transaction(|batch| batch.insert(&typing)).unwrap();
    assert!(!kept);
    assert_eq!(store.stats().unwrap().total_events, 0);
}

#[test]
fn test_duplicate_id_is_rejected() {
    let (mut store, _dir) = create_test_store();
    let note = event("n", 1, ALICE, 100).build();
    store.insert(&note).unwrap();

    assert_eq!(rejection(store.insert(&note)), Rejection::Duplicate);
    assert_eq!(store.count(&Filter::new()).unwrap(), 1);
}

#[test]
fn test_rows_are_immutable() {
    let (mut store, _dir) = create_test_store();
    let note = event("n", 1, ALICE, 100)
        .content("original")
        .add_tag(vec!["t", "x"])
        .build();
    store.insert(&note).unwrap();

    let conn = store.connection();
    assert!(conn.execute("UPDATE event_headers SET content = 'changed'", []).is_err());
    assert!(conn.execute("UPDATE event_tags SET created_at = 0", []).is_err());

    assert_eq!(store.query(&Filter::new().ids(["n"])).unwrap(), vec![note]);
}

#[test]
fn test_deletion_by_id() {
    let (mut store, _dir) = create_test_store();
    store
        .insert(&event("target", 1, ALICE, 100).add_tag(vec!["t", "gone"]).build())
        .unwrap();
    store.insert(&event("keep", 1, ALICE, 100).build()).unwrap();

    store
        .insert(&event("del", 5, ALICE, 200).add_tag(vec!["e", "target"]).build())
        .unwrap();

    assert!(!contains(&store, "target"));
    assert!(contains(&store, "keep"));
    assert!(contains(&store, "del"));
    assert!(store.query(&Filter::new().tag("t", ["gone"])).unwrap().is_empty());
}

#[test]
fn test_deletion_only_touches_own_events() {
    let (mut store, _dir) = create_test_store();
    store.insert(&event("bobs", 1, BOB, 100).build()).unwrap();

    store
        .insert(&event("del", 5, ALICE, 200).add_tag(vec!["e", "bobs"]).build())
        .unwrap();

    assert!(contains(&store, "bobs"));
}

#[test]
fn test_deleted_event_cannot_return() {
    let (mut store, _dir) = create_test_store();
    store
        .insert(&event("del", 5, ALICE, 200).add_tag(vec!["e", "late"]).build())
        .unwrap();

    let late = event("late", 1, ALICE, 100).build();
    assert_eq!(rejection(store.insert(&late)), Rejection::Deleted);

    // Someone else's event with that id is not covered
    let foreign = event("late", 1, BOB, 100).build();
    assert!(store.insert(&foreign).unwrap());
}

#[test]
fn test_deletion_by_address_respects_timestamp() {
    let (mut store, _dir) = create_test_store();
    let address = format!("30023:{ALICE}:post");
    store
        .insert(&event("v1", 30023, ALICE, 100).add_tag(vec!["d", "post"]).build())
        .unwrap();

    store
        .insert(&event("del", 5, ALICE, 150).add_tag(vec!["a", address.as_str()]).build())
        .unwrap();
    assert!(!contains(&store, "v1"));

    let stale = event("v0", 30023, ALICE, 120).add_tag(vec!["d", "post"]).build();
    assert_eq!(rejection(store.insert(&stale)), Rejection::Deleted);

    let newer = event("v2", 30023, ALICE, 200).add_tag(vec!["d", "post"]).build();
    assert!(store.insert(&newer).unwrap());
}

#[test]
fn test_deletion_of_replaceable_by_short_address() {
    let (mut store, _dir) = create_test_store();
    store.insert(&event("relays", 10002, ALICE, 10).build()).unwrap();

    // No trailing colon: the empty d part is implied
    let address = format!("10002:{ALICE}");
    store
        .insert(&event("del", 5, ALICE, 20).add_tag(vec!["a", address.as_str()]).build())
        .unwrap();
    assert!(!contains(&store, "relays"));

    let older = event("relays-old", 10002, ALICE, 15).build();
    assert_eq!(rejection(store.insert(&older)), Rejection::Deleted);

    let newer = event("relays-new", 10002, ALICE, 30).build();
    assert!(store.insert(&newer).unwrap());
}

#[test]
fn test_deletion_requests_are_not_deletable() {
    let (mut store, _dir) = create_test_store();
    store
        .insert(&event("del1", 5, ALICE, 100).add_tag(vec!["e", "x"]).build())
        .unwrap();
    store
        .insert(&event("del2", 5, ALICE, 200).add_tag(vec!["e", "del1"]).build())
        .unwrap();

    assert!(contains(&store, "del1"));
    assert!(contains(&store, "del2"));
}

#[test]
fn test_vanish_cascade_and_guard() {
    let (mut store, _dir) = create_test_store();
    store.insert(&event("before", 1, ALICE, 100).build()).unwrap();
    store.insert(&event("other", 1, BOB, 100).build()).unwrap();

    store.insert(&event("vanish", 62, ALICE, 500).build()).unwrap();

    assert!(!contains(&store, "before"));
    assert!(contains(&store, "vanish"));
    assert!(contains(&store, "other"));
    assert_eq!(store.vanish_cutoff(ALICE).unwrap(), Some(500));

    let backdated = event("backdated", 1, ALICE, 500).build();
    assert_eq!(rejection(store.insert(&backdated)), Rejection::Vanished);

    assert!(store.insert(&event("after", 1, ALICE, 501).build()).unwrap());
}

#[test]
fn test_vanish_cutoff_only_moves_forward() {
    let (mut store, _dir) = create_test_store();
    store.insert(&event("v1", 62, ALICE, 500).build()).unwrap();
    let _ = store.insert(&event("v0", 62, ALICE, 300).build());
    store.insert(&event("v2", 62, ALICE, 800).build()).unwrap();

    assert_eq!(store.vanish_cutoff(ALICE).unwrap(), Some(800));
    assert_eq!(stored_ids(&store, &Filter::new().authors([ALICE])), vec!["v2"]);
}

#[test]
fn test_vanish_removes_gift_wraps_to_author() {
    let (mut store, _dir) = create_test_store();
    store
        .insert(&event("wrap", 1059, BOB, 100).add_tag(vec!["p", ALICE]).build())
        .unwrap();
    store
        .insert(&event("later_wrap", 1059, BOB, 900).add_tag(vec!["p", ALICE]).build())
        .unwrap();

    store.insert(&event("vanish", 62, ALICE, 500).build()).unwrap();

    assert!(!contains(&store, "wrap"));
    assert!(contains(&store, "later_wrap"));
}

#[test]
fn test_expired_insert_is_misuse_not_rejection() {
    let (mut store, _dir) = create_test_store();
    let expired = event("old", 1, ALICE, 100).expiration(101).build();

    let err = store.insert(&expired).unwrap_err();
    assert!(matches!(err, Error::Expired { .. }));
    assert!(!err.is_rejection());
}

#[test]
fn test_sweep_expired() {
    let (mut store, _dir) = create_test_store();
    let far = 4_000_000_000;
    store
        .insert(&event("soon", 1, ALICE, 100).expiration(far).add_tag(vec!["t", "x"]).build())
        .unwrap();
    store
        .insert(&event("later", 1, ALICE, 100).expiration(far + 100).build())
        .unwrap();
    store.insert(&event("forever", 1, ALICE, 100).build()).unwrap();
    assert_eq!(store.stats().unwrap().expiring_events, 2);

    assert_eq!(store.sweep_expired_at(far - 1).unwrap(), 0);
    assert_eq!(store.sweep_expired_at(far).unwrap(), 1);

    assert!(!contains(&store, "soon"));
    assert!(contains(&store, "later"));
    assert!(contains(&store, "forever"));
    assert_eq!(store.stats().unwrap().expiring_events, 1);
    assert_eq!(store.sweep_expired().unwrap(), 0);
}

#[test]
fn test_rejection_leaves_no_side_effects() {
    let (mut store, _dir) = create_test_store();
    store.insert(&event("vanish", 62, ALICE, 500).build()).unwrap();
    store.insert(&event("note", 1, ALICE, 600).build()).unwrap();

    // Would delete the note if it were allowed to land
    let blocked = event("blocked", 5, ALICE, 400).add_tag(vec!["e", "note"]).build();
    assert_eq!(rejection(store.insert(&blocked)), Rejection::Vanished);
    assert!(contains(&store, "note"));
}

#[test]
fn test_clear_resets_vanish_records() {
    let (mut store, _dir) = create_test_store();
    store.insert(&event("vanish", 62, ALICE, 500).build()).unwrap();
    store.clear().unwrap();

    assert_eq!(store.vanish_cutoff(ALICE).unwrap(), None);
    assert!(store.insert(&event("back", 1, ALICE, 100).build()).unwrap());
}
