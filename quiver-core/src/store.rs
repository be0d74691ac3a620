//! The event store
//!
//! # Examples
//!
//! ```
//! use quiver_core::{EventBuilder, EventStore, Filter, StoreConfig};
//!
//! # fn main() -> quiver_core::Result<()> {
//! let mut store = EventStore::open_in_memory(StoreConfig::default())?;
//!
//! let note = EventBuilder::new()
//!     .id("note1")
//!     .pubkey("alice")
//!     .created_at(1_700_000_000)
//!     .kind(1)
//!     .add_tag(vec!["t", "nostr"])
//!     .content("hello")
//!     .build();
//! assert!(store.insert(&note)?);
//!
//! let found = store.query(&Filter::new().tag("t", ["nostr"]))?;
//! assert_eq!(found, vec![note]);
//! # Ok(())
//! # }
//! ```

use crate::event::unix_now;
use crate::hasher::TagHasher;
use crate::query::{QueryBuilder, event_from_row};
use crate::schema::{self, FtsVersion, InsertContext, SCHEMA_VERSION, Schema, StoredConfig};
use crate::sql::QuerySpec;
use crate::{Error, Event, Filter, Result, StoreConfig, kind};
use rusqlite::{Connection, OptionalExtension, Transaction, TransactionBehavior};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info, trace};

/// Embedded, SQLite-backed store of Nostr events
pub struct EventStore {
    conn: Connection,
    config: StoreConfig,
    hasher: TagHasher,
    schema: Schema,
    queries: QueryBuilder,
}

/// Statistics about the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreStats {
    /// Total number of stored events
    pub total_events: u64,
    /// Rows in the tag table
    pub tag_rows: u64,
    /// Number of distinct authors
    pub unique_authors: u64,
    /// Events carrying an expiration
    pub expiring_events: u64,
    /// Authors that requested to vanish
    pub vanished_authors: u64,
    /// Earliest event timestamp
    pub earliest_event: Option<i64>,
    /// Latest event timestamp
    pub latest_event: Option<i64>,
    pub fts_version: FtsVersion,
}

impl EventStore {
    /// Create or open a store at `path`
    ///
    /// A new file gets the schema, a tag hash seed and a full-text engine.
    /// An existing file keeps the seed and engine it was created with; the
    /// rest of `config` applies to this session.
    pub fn open(path: &Path, config: StoreConfig) -> Result<Self> {
        let conn = Connection::open(path)?;
        info!(path = %path.display(), "Opening event store");
        Self::init(conn, config)
    }

    /// Store that lives and dies with the process
    pub fn open_in_memory(config: StoreConfig) -> Result<Self> {
        Self::init(Connection::open_in_memory()?, config)
    }

    fn init(mut conn: Connection, config: StoreConfig) -> Result<Self> {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA foreign_keys = ON;",
        )?;

        let version = schema::user_version(&conn)?;
        let stored = if version == 0 {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let fts_version = if config.full_text {
                FtsVersion::probe(&tx)
            } else {
                FtsVersion::Disabled
            };
            let record = StoredConfig {
                seed: config.seed.unwrap_or_else(rand::random),
                fts_version,
            };

            Schema::new(&config, fts_version).create(&tx)?;
            StoredConfig::create(&tx, record)?;
            schema::set_user_version(&tx, SCHEMA_VERSION)?;
            tx.commit()?;

            info!(fts = %fts_version, "Created schema version {}", SCHEMA_VERSION);
            record
        } else {
            schema::migrate(&conn, version)?;
            let record = StoredConfig::load(&conn)?;
            // Picks up optional indexes the policy asks for since the last open
            Schema::new(&config, record.fts_version).create(&conn)?;
            debug!(version, fts = %record.fts_version, "Loaded existing schema");
            record
        };

        if config.seed.is_some_and(|seed| seed != stored.seed) {
            debug!("Ignoring configured seed, the database keeps its own");
        }

        Ok(Self {
            schema: Schema::new(&config, stored.fts_version),
            queries: QueryBuilder::new(config.policy, stored.fts_version),
            hasher: TagHasher::new(stored.seed),
            config,
            conn,
        })
    }

    /// Insert one event in its own transaction
    ///
    /// Returns `Ok(false)` for ephemeral events, which are never stored.
    /// Protocol conflicts come back as [`Error::Rejected`]; nothing is
    /// written in that case.
    pub fn insert(&mut self, event: &Event) -> Result<bool> {
        if !admit(event, unix_now())? {
            return Ok(false);
        }

        let tx = self.conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let row_id = self.schema.insert(&tx, &InsertContext::new(event, &self.hasher))?;
        tx.commit()?;

        trace!(id = %event.id, row_id, "Stored event");
        Ok(true)
    }

    /// Run `body` inside one transaction
    ///
    /// Each insert gets its own savepoint, so a rejected event leaves the
    /// rest of the batch intact. An error returned from `body` rolls back
    /// everything.
    ///
    /// ```
    /// use quiver_core::{EventBuilder, EventStore, StoreConfig};
    ///
    /// # fn main() -> quiver_core::Result<()> {
    /// let mut store = EventStore::open_in_memory(StoreConfig::default())?;
    /// let events = vec![
    ///     EventBuilder::new().id("1").kind(1).build(),
    ///     EventBuilder::new().id("1").kind(1).build(),
    /// ];
    ///
    /// let stored = store.transaction(|batch| {
    ///     let mut stored = 0;
    ///     for event in &events {
    ///         match batch.insert(event) {
    ///             Ok(true) => stored += 1,
    ///             Ok(false) => {}
    ///             Err(e) if e.is_rejection() => {}
    ///             Err(e) => return Err(e),
    ///         }
    ///     }
    ///     Ok(stored)
    /// })?;
    /// assert_eq!(stored, 1);
    /// # Ok(())
    /// # }
    /// ```
    pub fn transaction<T, F>(&mut self, body: F) -> Result<T>
    where
        F: FnOnce(&mut StoreTransaction<'_>) -> Result<T>,
    {
        let tx = self.conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let mut batch = StoreTransaction {
            tx,
            schema: &self.schema,
            hasher: &self.hasher,
            inserted: 0,
        };

        let value = body(&mut batch)?;
        let inserted = batch.inserted;
        batch.tx.commit()?;

        debug!(inserted, "Committed batch");
        Ok(value)
    }

    /// Every event matching `filter`, newest first
    pub fn query(&self, filter: &Filter) -> Result<Vec<Event>> {
        let mut events = Vec::new();
        self.query_each(filter, |event| events.push(event))?;
        Ok(events)
    }

    /// Stream matches of `filter` to `on_event` without collecting them
    pub fn query_each<F: FnMut(Event)>(&self, filter: &Filter, on_event: F) -> Result<()> {
        let spec = self.queries.select(filter, &self.hasher);
        self.stream(&spec, on_event)
    }

    /// Union of the matches of `filters`, each event once, newest first
    pub fn query_many(&self, filters: &[Filter]) -> Result<Vec<Event>> {
        let mut events = Vec::new();
        self.query_many_each(filters, |event| events.push(event))?;
        Ok(events)
    }

    pub fn query_many_each<F: FnMut(Event)>(&self, filters: &[Filter], on_event: F) -> Result<()> {
        let spec = self.queries.select_many(filters, &self.hasher);
        self.stream(&spec, on_event)
    }

    fn stream<F: FnMut(Event)>(&self, spec: &QuerySpec, mut on_event: F) -> Result<()> {
        trace!(sql = %spec.sql, "Running query");
        let mut stmt = self.conn.prepare_cached(&spec.sql)?;
        let mut rows = stmt.query(spec.params())?;
        while let Some(row) = rows.next()? {
            on_event(event_from_row(row)?);
        }
        Ok(())
    }

    pub fn count(&self, filter: &Filter) -> Result<u64> {
        self.count_spec(&self.queries.count(filter, &self.hasher))
    }

    /// Number of distinct events matching any of `filters`
    pub fn count_many(&self, filters: &[Filter]) -> Result<u64> {
        self.count_spec(&self.queries.count_many(filters, &self.hasher))
    }

    fn count_spec(&self, spec: &QuerySpec) -> Result<u64> {
        let count: i64 = self
            .conn
            .prepare_cached(&spec.sql)?
            .query_row(spec.params(), |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Delete every event matching `filter`
    ///
    /// An unfilled filter deletes nothing; use [`clear`](Self::clear) to empty the store.
    pub fn delete(&mut self, filter: &Filter) -> Result<usize> {
        self.delete_many(std::slice::from_ref(filter))
    }

    pub fn delete_many(&mut self, filters: &[Filter]) -> Result<usize> {
        let Some(spec) = self.queries.delete_many(filters, &self.hasher) else {
            debug!("Delete without predicates, nothing removed");
            return Ok(0);
        };

        let deleted = self.conn.prepare_cached(&spec.sql)?.execute(spec.params())?;
        info!(deleted, "Deleted events");
        Ok(deleted)
    }

    /// Delete events whose expiration has passed
    pub fn sweep_expired(&mut self) -> Result<usize> {
        self.sweep_expired_at(unix_now())
    }

    /// Delete events whose expiration is at or before `now`
    pub fn sweep_expired_at(&mut self, now: i64) -> Result<usize> {
        self.schema.expiration.sweep(&self.conn, now)
    }

    /// Remove every event, tombstone and vanish record
    ///
    /// The schema, seed and full-text engine stay.
    pub fn clear(&mut self) -> Result<()> {
        let tx = self.conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        self.schema.delete_all(&tx)?;
        tx.commit()?;
        info!("Cleared event store");
        Ok(())
    }

    /// Drop every table and reset the schema version
    ///
    /// The file stays; opening it again creates a fresh schema with a new seed.
    pub fn destroy(mut self) -> Result<()> {
        let tx = self.conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        self.schema.teardown(&tx)?;
        StoredConfig::teardown(&tx)?;
        schema::set_user_version(&tx, 0)?;
        tx.commit()?;
        info!("Dropped event store schema");
        Ok(())
    }

    /// Statement text and SQLite query plan for `filter`
    pub fn explain(&self, filter: &Filter) -> Result<String> {
        self.explain_spec(&self.queries.select(filter, &self.hasher))
    }

    pub fn explain_many(&self, filters: &[Filter]) -> Result<String> {
        self.explain_spec(&self.queries.select_many(filters, &self.hasher))
    }

    fn explain_spec(&self, spec: &QuerySpec) -> Result<String> {
        let mut out = format!("{}\n", spec.sql);

        let mut stmt = self.conn.prepare(&format!("EXPLAIN QUERY PLAN {}", spec.sql))?;
        let mut rows = stmt.query(spec.params())?;
        let mut depths: HashMap<i64, usize> = HashMap::new();
        while let Some(row) = rows.next()? {
            let id: i64 = row.get(0)?;
            let parent: i64 = row.get(1)?;
            let detail: String = row.get(3)?;

            let depth = depths.get(&parent).map_or(0, |d| d + 1);
            depths.insert(id, depth);
            out.push_str(&"  ".repeat(depth + 1));
            out.push_str(&detail);
            out.push('\n');
        }
        Ok(out)
    }

    pub fn stats(&self) -> Result<StoreStats> {
        let count = |sql: &str| -> Result<u64> {
            let n: i64 = self.conn.query_row(sql, [], |row| row.get(0))?;
            Ok(n as u64)
        };

        let (earliest_event, latest_event): (Option<i64>, Option<i64>) = self
            .conn
            .query_row(
                "SELECT MIN(created_at), MAX(created_at) FROM event_headers",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?
            .unwrap_or((None, None));

        Ok(StoreStats {
            total_events: count("SELECT COUNT(*) FROM event_headers")?,
            tag_rows: count("SELECT COUNT(*) FROM event_tags")?,
            unique_authors: count("SELECT COUNT(DISTINCT pubkey) FROM event_headers")?,
            expiring_events: count("SELECT COUNT(*) FROM event_expirations")?,
            vanished_authors: count("SELECT COUNT(*) FROM event_vanish")?,
            earliest_event,
            latest_event,
            fts_version: self.fts_version(),
        })
    }

    /// Vanish cutoff recorded for `pubkey`, if any
    pub fn vanish_cutoff(&self, pubkey: &str) -> Result<Option<i64>> {
        self.schema.vanish.cutoff(&self.conn, pubkey)
    }

    /// Tag hash seed persisted with the database
    pub fn seed(&self) -> u64 {
        self.hasher.seed()
    }

    pub fn fts_version(&self) -> FtsVersion {
        self.schema.fts.version()
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Underlying connection, for diagnostics
    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

/// Batch scope handed out by [`EventStore::transaction`]
pub struct StoreTransaction<'a> {
    tx: Transaction<'a>,
    schema: &'a Schema,
    hasher: &'a TagHasher,
    inserted: usize,
}

impl StoreTransaction<'_> {
    /// Insert one event under its own savepoint
    ///
    /// Same contract as [`EventStore::insert`].
    pub fn insert(&mut self, event: &Event) -> Result<bool> {
        if !admit(event, unix_now())? {
            return Ok(false);
        }

        let savepoint = self.tx.savepoint()?;
        self.schema
            .insert(&savepoint, &InsertContext::new(event, self.hasher))?;
        savepoint.commit()?;

        self.inserted += 1;
        Ok(true)
    }

    /// Events stored so far in this batch
    pub fn inserted(&self) -> usize {
        self.inserted
    }
}

/// Checks that run before any transaction: ephemeral and expired events
fn admit(event: &Event, now: i64) -> Result<bool> {
    if kind::is_ephemeral(event.kind) {
        trace!(id = %event.id, kind = event.kind, "Skipping ephemeral event");
        return Ok(false);
    }
    if let Some(expiration) = event.expiration()
        && expiration <= now
    {
        return Err(Error::Expired {
            id: event.id.clone(),
            expiration,
        });
    }
    Ok(true)
}
