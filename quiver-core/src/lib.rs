//! Quiver Core Library
//!
//! An embedded Nostr event store on top of SQLite. It keeps signed events,
//! enforces the protocol's storage rules at write time and answers NIP-01
//! filters with index-backed SQL.
//!
//! # Features
//!
//! - Replaceable and addressable events keep only their newest version
//! - Deletion requests remove their targets and block re-imports
//! - Requests to vanish wipe an author's history up to a cutoff
//! - Expiring events are tracked and swept on demand
//! - Ephemeral events are never stored
//! - Tag lookups through a seeded hash index, with AND (`&x`) and OR (`#x`) tag filters
//! - Full-text search on FTS5, falling back to FTS4 or FTS3
//! - Configurable index layout through [`IndexingPolicy`]
//! - Serde support for the NIP-01 filter wire format
//!
//! # Examples
//!
//! ```
//! use quiver_core::{EventBuilder, EventStore, Filter, StoreConfig};
//!
//! # fn main() -> quiver_core::Result<()> {
//! let mut store = EventStore::open_in_memory(StoreConfig::default())?;
//!
//! let v1 = EventBuilder::new().id("v1").pubkey("alice").kind(0).created_at(100).build();
//! let v2 = EventBuilder::new().id("v2").pubkey("alice").kind(0).created_at(200).build();
//! store.insert(&v1)?;
//! store.insert(&v2)?;
//!
//! // Only the newest metadata survives
//! let metadata = store.query(&Filter::new().kinds([0]).authors(["alice"]))?;
//! assert_eq!(metadata, vec![v2]);
//! # Ok(())
//! # }
//! ```
//!
//! ## Filters from the wire
//!
//! ```
//! use quiver_core::Filter;
//!
//! let filter: Filter = serde_json::from_str(r##"{"kinds":[1],"#t":["nostr"],"limit":10}"##)?;
//! assert_eq!(filter.limit, Some(10));
//! # Ok::<(), serde_json::Error>(())
//! ```

pub mod builder;
pub mod config;
pub mod conversion;
pub mod display;
pub mod error;
pub mod event;
pub mod filter;
pub mod hasher;
pub mod kind;
pub mod policy;
pub(crate) mod query;
pub(crate) mod schema;
pub mod serde_support;
pub mod sql;
pub mod store;

pub use builder::EventBuilder;
pub use config::StoreConfig;
pub use error::{Error, Rejection, Result};
pub use event::{Address, Event, Tag};
pub use filter::Filter;
pub use hasher::TagHasher;
pub use kind::KindClass;
pub use policy::{IndexingPolicy, TagPredicate, single_letter_tags};
pub use schema::{FtsVersion, SCHEMA_VERSION};
pub use sql::QuerySpec;
pub use store::{EventStore, StoreStats, StoreTransaction};
