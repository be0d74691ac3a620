//! Requests to vanish
//!
//! A vanish request wipes everything its author published up to the request's
//! timestamp and blocks re-imports of that history. The request itself stays,
//! and the cutoff per author only ever moves forward. Gift wraps addressed to
//! the author up to the cutoff go as well.

use super::{InsertContext, SchemaModule};
use crate::kind::VANISH;
use crate::{Rejection, Result};
use rusqlite::{Connection, OptionalExtension, params};
use tracing::info;

/// Sealed direct message envelope
const GIFT_WRAP: u16 = 1059;

pub(crate) struct RightToVanishModule;

impl RightToVanishModule {
    pub fn cutoff(&self, conn: &Connection, pubkey: &str) -> Result<Option<i64>> {
        Ok(conn
            .prepare_cached("SELECT cutoff FROM event_vanish WHERE pubkey = ?1")?
            .query_row(params![pubkey], |row| row.get(0))
            .optional()?)
    }
}

impl SchemaModule for RightToVanishModule {
    fn create(&self, conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS event_vanish (
                 pubkey TEXT PRIMARY KEY,
                 cutoff INTEGER NOT NULL
             ) WITHOUT ROWID;",
        )?;
        Ok(())
    }

    fn teardown(&self, conn: &Connection) -> Result<()> {
        conn.execute_batch("DROP TABLE IF EXISTS event_vanish")?;
        Ok(())
    }

    fn delete_all(&self, conn: &Connection) -> Result<()> {
        conn.execute_batch("DELETE FROM event_vanish")?;
        Ok(())
    }

    fn before_insert(&self, conn: &Connection, ctx: &InsertContext<'_>) -> Result<()> {
        match self.cutoff(conn, &ctx.event.pubkey)? {
            Some(cutoff) if ctx.event.created_at <= cutoff => Err(Rejection::Vanished.into()),
            _ => Ok(()),
        }
    }

    fn after_insert(&self, conn: &Connection, ctx: &InsertContext<'_>, row_id: i64) -> Result<()> {
        let event = ctx.event;
        if event.kind != VANISH {
            return Ok(());
        }

        conn.prepare_cached(
            "INSERT INTO event_vanish (pubkey, cutoff) VALUES (?1, ?2)
             ON CONFLICT (pubkey) DO UPDATE SET cutoff = MAX(cutoff, excluded.cutoff)",
        )?
        .execute(params![&event.pubkey, event.created_at])?;

        let own = conn
            .prepare_cached(
                "DELETE FROM event_headers WHERE pubkey = ?1 AND created_at <= ?2 AND row_id != ?3",
            )?
            .execute(params![&event.pubkey, event.created_at, row_id])?;

        let wraps = conn
            .prepare_cached(
                "DELETE FROM event_headers WHERE row_id IN
                    (SELECT event_header_row_id FROM event_tags
                     WHERE tag_hash = ?1 AND kind = ?2 AND created_at <= ?3)",
            )?
            .execute(params![
                ctx.hasher.hash("p", &event.pubkey),
                GIFT_WRAP,
                event.created_at
            ])?;

        info!(pubkey = %event.pubkey, cutoff = event.created_at, own, wraps, "Author vanished");
        Ok(())
    }
}
