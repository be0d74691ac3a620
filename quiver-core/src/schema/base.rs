//! Event headers and the hashed tag table
//!
//! Headers keep the full event (tags as JSON) plus precomputed lookup keys:
//! a hash of the author, the `e`-hash of the event id and, for replaceable
//! and addressable kinds, the `a`-hash of the address. The tag table keeps
//! one row per indexed `(name, value)` pair, denormalized with the event's
//! `created_at`, kind and author hash so tag lookups never touch headers.
//!
//! Neither table accepts UPDATE. Events are immutable; they only arrive or leave.

use super::{InsertContext, SchemaModule};
use crate::error::reject_duplicates;
use crate::event::Address;
use crate::kind::DELETION;
use crate::policy::IndexingPolicy;
use crate::sql::placeholders;
use crate::{Event, Result, TagHasher};
use rusqlite::Connection;
use rusqlite::types::Value;
use std::collections::BTreeSet;
use tracing::trace;

/// Tag rows written per multi-row INSERT statement
pub(crate) const TAG_INSERT_CHUNK: usize = 300;

const TAG_COLUMNS: usize = 5;

pub(crate) struct EventIndexesModule {
    policy: IndexingPolicy,
}

impl EventIndexesModule {
    pub fn new(policy: IndexingPolicy) -> Self {
        Self { policy }
    }

    /// Optional indexes the policy asks for
    fn optional_indexes(&self) -> String {
        let mut sql = String::new();
        if self.policy.index_created_at {
            sql.push_str(&format!(
                "CREATE INDEX IF NOT EXISTS query_by_created_at_id ON event_headers (created_at DESC{});\n",
                self.id_suffix()
            ));
        }
        if self.policy.index_tag_hash {
            sql.push_str(
                "CREATE INDEX IF NOT EXISTS query_by_tags_hash ON event_tags (tag_hash, created_at DESC);\n",
            );
        }
        if self.policy.index_tag_hash_kind_pubkey {
            sql.push_str(
                "CREATE INDEX IF NOT EXISTS query_by_tags_hash_kind_pubkey ON event_tags (tag_hash, kind, pubkey_hash, created_at DESC);\n",
            );
        }
        sql
    }

    fn id_suffix(&self) -> &'static str {
        if self.policy.order_by_id { ", id" } else { "" }
    }

    /// Whether `tag` of `event` gets a row in the tag table
    ///
    /// Deletion requests always index their targets, whatever the policy says.
    pub fn indexes_tag(&self, event: &Event, tag: &crate::Tag) -> bool {
        if event.kind == DELETION && matches!(tag.name(), Some("e") | Some("a")) && tag.value().is_some() {
            return true;
        }
        self.policy.should_index(event.kind, tag)
    }

    /// Insert the header row and its tag rows, returning the header row id
    ///
    /// A header that collides with an existing id (or a replaceable or
    /// addressable slot) surfaces as [`Rejection::Duplicate`](crate::Rejection::Duplicate).
    pub fn insert(&self, conn: &Connection, ctx: &InsertContext<'_>) -> Result<i64> {
        let event = ctx.event;
        let hasher = ctx.hasher;

        let etag_hash = hasher.hash("e", &event.id);
        let atag_hash = event.address().map(|address| hasher.hash("a", &address));

        let mut stmt = conn.prepare_cached(
            "INSERT INTO event_headers
                (id, pubkey, pubkey_hash, created_at, kind, d_tag, etag_hash, atag_hash, tags, content, sig)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        )?;
        stmt.execute(rusqlite::params![
            &event.id,
            &event.pubkey,
            ctx.pubkey_hash,
            event.created_at,
            event.kind,
            event.d_tag(),
            etag_hash,
            atag_hash,
            event.tags_json()?,
            &event.content,
            &event.sig,
        ])
        .map_err(reject_duplicates)?;

        let row_id = conn.last_insert_rowid();

        // One row per distinct pair; repeats add nothing to lookups.
        let hashes: BTreeSet<i64> = event
            .tags
            .iter()
            .filter(|tag| self.indexes_tag(event, tag))
            .filter_map(|tag| Some(tag_hash(event, hasher, tag.name()?, tag.value()?)))
            .collect();

        let hashes: Vec<i64> = hashes.into_iter().collect();
        for chunk in hashes.chunks(TAG_INSERT_CHUNK) {
            insert_tag_rows(conn, row_id, ctx, chunk)?;
        }

        trace!(id = %event.id, row_id, tags = hashes.len(), "Inserted event header");
        Ok(row_id)
    }
}

/// Hash of one tag row; a deletion request's `a` targets are stored in address form
fn tag_hash(event: &Event, hasher: &TagHasher, name: &str, value: &str) -> i64 {
    if event.kind == DELETION
        && name == "a"
        && let Some(address) = Address::parse(value)
    {
        return hasher.hash(name, &address.canonical());
    }
    hasher.hash(name, value)
}

fn insert_tag_rows(conn: &Connection, row_id: i64, ctx: &InsertContext<'_>, hashes: &[i64]) -> Result<()> {
    let rows = vec![format!("({})", placeholders(TAG_COLUMNS)); hashes.len()].join(", ");
    let sql = format!(
        "INSERT INTO event_tags (event_header_row_id, tag_hash, created_at, kind, pubkey_hash) VALUES {}",
        rows
    );

    let mut args = Vec::with_capacity(hashes.len() * TAG_COLUMNS);
    for hash in hashes {
        args.push(Value::Integer(row_id));
        args.push(Value::Integer(*hash));
        args.push(Value::Integer(ctx.event.created_at));
        args.push(Value::Integer(ctx.event.kind.into()));
        args.push(Value::Integer(ctx.pubkey_hash));
    }

    conn.prepare_cached(&sql)?
        .execute(rusqlite::params_from_iter(args))?;
    Ok(())
}

impl SchemaModule for EventIndexesModule {
    fn create(&self, conn: &Connection) -> Result<()> {
        let id = self.id_suffix();
        conn.execute_batch(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS event_headers (
                row_id      INTEGER PRIMARY KEY AUTOINCREMENT,
                id          TEXT NOT NULL,
                pubkey      TEXT NOT NULL,
                pubkey_hash INTEGER NOT NULL,
                created_at  INTEGER NOT NULL,
                kind        INTEGER NOT NULL,
                d_tag       TEXT,
                etag_hash   INTEGER NOT NULL,
                atag_hash   INTEGER,
                tags        TEXT NOT NULL,
                content     TEXT NOT NULL,
                sig         TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS event_tags (
                event_header_row_id INTEGER NOT NULL
                    REFERENCES event_headers (row_id) ON DELETE CASCADE,
                tag_hash    INTEGER NOT NULL,
                created_at  INTEGER NOT NULL,
                kind        INTEGER NOT NULL,
                pubkey_hash INTEGER NOT NULL
            );

            CREATE UNIQUE INDEX IF NOT EXISTS event_headers_id ON event_headers (id);
            CREATE INDEX IF NOT EXISTS query_by_kind_created ON event_headers (kind, created_at DESC{id});
            CREATE INDEX IF NOT EXISTS query_by_kind_pubkey_created ON event_headers (kind, pubkey, created_at DESC{id});
            CREATE INDEX IF NOT EXISTS query_by_tags_hash_kind ON event_tags (tag_hash, kind, created_at DESC);
            CREATE INDEX IF NOT EXISTS event_tags_row_id ON event_tags (event_header_row_id);

            CREATE TRIGGER IF NOT EXISTS event_headers_immutable
            BEFORE UPDATE ON event_headers
            BEGIN
                SELECT RAISE(ABORT, 'events are immutable');
            END;

            CREATE TRIGGER IF NOT EXISTS event_tags_immutable
            BEFORE UPDATE ON event_tags
            BEGIN
                SELECT RAISE(ABORT, 'event tags are immutable');
            END;
            "#
        ))?;

        conn.execute_batch(&self.optional_indexes())?;
        Ok(())
    }

    fn teardown(&self, conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "DROP TABLE IF EXISTS event_tags;
             DROP TABLE IF EXISTS event_headers;",
        )?;
        Ok(())
    }

    fn delete_all(&self, conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "DELETE FROM event_tags;
             DELETE FROM event_headers;",
        )?;
        Ok(())
    }
}
