//! Shared fixtures for integration tests

#![allow(dead_code)]

use quiver_core::{Event, EventBuilder, EventStore, Filter, StoreConfig};
use tempfile::TempDir;

pub const ALICE: &str = "aa11aa11aa11aa11aa11aa11aa11aa11aa11aa11aa11aa11aa11aa11aa11aa11";
pub const BOB: &str = "bb22bb22bb22bb22bb22bb22bb22bb22bb22bb22bb22bb22bb22bb22bb22bb22";

/// File-backed store with a fixed seed
pub fn create_test_store() -> (EventStore, TempDir) {
    create_store_with(StoreConfig::default().with_seed(0x5eed))
}

pub fn create_store_with(config: StoreConfig) -> (EventStore, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("events.db");
    let store = EventStore::open(&db_path, config).unwrap();
    (store, temp_dir)
}

pub fn event(id: &str, kind: u16, pubkey: &str, created_at: i64) -> EventBuilder {
    EventBuilder::new()
        .id(id)
        .kind(kind)
        .pubkey(pubkey)
        .created_at(created_at)
        .sig(format!("sig_{id}"))
}

pub fn ids(events: &[Event]) -> Vec<&str> {
    events.iter().map(|e| e.id.as_str()).collect()
}

pub fn stored_ids(store: &EventStore, filter: &Filter) -> Vec<String> {
    store
        .query(filter)
        .unwrap()
        .into_iter()
        .map(|e| e.id)
        .collect()
}

pub fn contains(store: &EventStore, id: &str) -> bool {
    store.count(&Filter::new().ids([id])).unwrap() == 1
}
