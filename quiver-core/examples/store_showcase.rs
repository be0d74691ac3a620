//! Walk through the storage rules of Quiver Core
//!
//! Run with: cargo run --example store_showcase

use quiver_core::{EventBuilder, EventStore, Filter, Result, StoreConfig};

const ALICE: &str = "79dff8f82963424e0bb02708a22e44b4980893e3a4be0fa3cb60a43b946764e3";
const BOB: &str = "3bf0c63fcb93463407af97a5e5ee64fa883d107ef9e558472c4eb9aaaefa459d";

fn main() -> Result<()> {
    println!("🚀 Quiver Core Store Showcase\n");

    let mut store = EventStore::open_in_memory(StoreConfig::default())?;
    println!("   Full-text engine: {}", store.fts_version());

    println!("\n1️⃣  Replaceable events");
    for (id, created_at) in [("profile_v1", 100), ("profile_v2", 200), ("profile_v0", 50)] {
        let event = EventBuilder::new()
            .id(id)
            .pubkey(ALICE)
            .kind(0)
            .created_at(created_at)
            .content(format!("{{\"name\":\"alice@{created_at}\"}}"))
            .build();
        match store.insert(&event) {
            Ok(_) => println!("   ✅ stored {}", id),
            Err(e) => println!("   ⏭️  {} {}", id, e),
        }
    }

    println!("\n2️⃣  Tag queries");
    for (id, topics) in [("n1", &["nostr"][..]), ("n2", &["nostr", "rust"][..]), ("n3", &["rust"][..])] {
        let mut builder = EventBuilder::new().id(id).pubkey(BOB).kind(1).created_at(300);
        for topic in topics {
            builder = builder.add_tag(vec!["t", *topic]);
        }
        store.insert(&builder.content(format!("note {id} about {}", topics.join(" "))).build())?;
    }
    let any = store.query(&Filter::new().tag("t", ["nostr", "rust"]))?;
    let all = store.query(&Filter::new().tag_all("t", ["nostr", "rust"]))?;
    println!("   #t any of nostr,rust: {} events", any.len());
    println!("   &t all of nostr,rust: {} events", all.len());

    println!("\n3️⃣  Deletion requests");
    let request = EventBuilder::new()
        .id("del1")
        .pubkey(BOB)
        .kind(5)
        .created_at(400)
        .add_tag(vec!["e", "n1"])
        .build();
    store.insert(&request)?;
    println!("   n1 still stored: {}", store.count(&Filter::new().ids(["n1"]))? == 1);

    println!("\n4️⃣  Full-text search");
    for event in store.query(&Filter::new().search("rust"))? {
        println!("   🔎 {} {:?}", event.id, event.content);
    }

    println!("\n5️⃣  Query plan");
    println!("{}", store.explain(&Filter::new().tag("t", ["rust"]).kinds([1]).limit(10))?);

    let stats = store.stats()?;
    println!("\n📊 {} events, {} tag rows", stats.total_events, stats.tag_rows);

    Ok(())
}
