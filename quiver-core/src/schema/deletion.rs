//! Author-issued deletion requests
//!
//! A deletion request names its targets with `e` tags (event ids) and `a`
//! tags (addresses). Storing one removes the author's matching events and
//! leaves the request itself behind as a tombstone, so a target that shows up
//! later is turned away. Only the target's own author can delete it, and
//! deletion requests themselves are never deleted this way.
//!
//! Address targets only cover versions up to the request's `created_at`. A
//! newer version published after the request stays.

use super::{InsertContext, SchemaModule};
use crate::event::Address;
use crate::kind::DELETION;
use crate::sql::{WhereClause, integer_values};
use crate::{Rejection, Result};
use rusqlite::{Connection, params};
use tracing::{debug, info};

pub(crate) struct DeletionRequestModule;

impl DeletionRequestModule {
    /// Whether a stored deletion request by the same author covers `ctx.event`
    fn is_deleted(&self, conn: &Connection, ctx: &InsertContext<'_>) -> Result<bool> {
        let event = ctx.event;

        let by_id: bool = conn
            .prepare_cached(
                "SELECT EXISTS (SELECT 1 FROM event_tags
                 WHERE tag_hash = ?1 AND kind = ?2 AND pubkey_hash = ?3)",
            )?
            .query_row(
                params![ctx.hasher.hash("e", &event.id), DELETION, ctx.pubkey_hash],
                |row| row.get(0),
            )?;
        if by_id {
            return Ok(true);
        }

        let Some(address) = event.address() else {
            return Ok(false);
        };
        let by_address: bool = conn
            .prepare_cached(
                "SELECT EXISTS (SELECT 1 FROM event_tags
                 WHERE tag_hash = ?1 AND kind = ?2 AND pubkey_hash = ?3 AND created_at >= ?4)",
            )?
            .query_row(
                params![
                    ctx.hasher.hash("a", &address),
                    DELETION,
                    ctx.pubkey_hash,
                    event.created_at
                ],
                |row| row.get(0),
            )?;
        Ok(by_address)
    }

    /// Remove what a freshly stored deletion request targets
    fn apply(&self, conn: &Connection, ctx: &InsertContext<'_>) -> Result<usize> {
        let event = ctx.event;
        let mut deleted = 0;

        let e_seed = ctx.hasher.name_seed("e");
        let ids: Vec<i64> = event
            .tag_values("e")
            .map(|id| ctx.hasher.hash_with(e_seed, id))
            .collect();
        if !ids.is_empty() {
            let mut clause = WhereClause::new();
            clause.equals_or_in("etag_hash", integer_values(ids));
            clause.equals("pubkey", event.pubkey.clone().into());
            clause.raw(&format!("kind != {}", DELETION));

            let sql = format!("DELETE FROM event_headers WHERE {}", clause.conditions());
            deleted += conn
                .prepare_cached(&sql)?
                .execute(rusqlite::params_from_iter(clause.into_args()))?;
        }

        // Addresses of other authors are ignored; they cannot be deleted from here.
        let a_seed = ctx.hasher.name_seed("a");
        let addresses: Vec<i64> = event
            .tag_values("a")
            .filter_map(Address::parse)
            .filter(|address| address.pubkey == event.pubkey)
            .map(|address| ctx.hasher.hash_with(a_seed, &address.canonical()))
            .collect();
        if !addresses.is_empty() {
            let mut clause = WhereClause::new();
            clause.equals_or_in("atag_hash", integer_values(addresses));
            clause.equals("pubkey", event.pubkey.clone().into());
            clause.less_than_or_equals("created_at", event.created_at);

            let sql = format!("DELETE FROM event_headers WHERE {}", clause.conditions());
            deleted += conn
                .prepare_cached(&sql)?
                .execute(rusqlite::params_from_iter(clause.into_args()))?;
        }

        Ok(deleted)
    }
}

impl SchemaModule for DeletionRequestModule {
    fn create(&self, conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "CREATE INDEX IF NOT EXISTS query_by_etag_hash ON event_headers (etag_hash);
             CREATE INDEX IF NOT EXISTS query_by_atag_hash ON event_headers (atag_hash, pubkey, created_at)
                 WHERE atag_hash IS NOT NULL;",
        )?;
        Ok(())
    }

    fn teardown(&self, conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "DROP INDEX IF EXISTS query_by_etag_hash;
             DROP INDEX IF EXISTS query_by_atag_hash;",
        )?;
        Ok(())
    }

    fn before_insert(&self, conn: &Connection, ctx: &InsertContext<'_>) -> Result<()> {
        if ctx.event.kind == DELETION {
            return Ok(());
        }
        if self.is_deleted(conn, ctx)? {
            debug!(id = %ctx.event.id, "Event already deleted by its author");
            return Err(Rejection::Deleted.into());
        }
        Ok(())
    }

    fn after_insert(&self, conn: &Connection, ctx: &InsertContext<'_>, _row_id: i64) -> Result<()> {
        if ctx.event.kind != DELETION {
            return Ok(());
        }
        let deleted = self.apply(conn, ctx)?;
        if deleted > 0 {
            info!(id = %ctx.event.id, deleted, "Applied deletion request");
        }
        Ok(())
    }
}
