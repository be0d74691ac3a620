//! At most one event per `(kind, author)` for replaceable kinds

use super::{InsertContext, SchemaModule};
use crate::kind::{REPLACEABLE_SQL, is_replaceable};
use crate::{Rejection, Result};
use rusqlite::{Connection, params};
use tracing::debug;

pub(crate) struct ReplaceableModule;

impl SchemaModule for ReplaceableModule {
    fn create(&self, conn: &Connection) -> Result<()> {
        conn.execute_batch(&format!(
            "CREATE UNIQUE INDEX IF NOT EXISTS replaceable_idx ON event_headers (kind, pubkey) WHERE {}",
            REPLACEABLE_SQL
        ))?;
        Ok(())
    }

    fn teardown(&self, conn: &Connection) -> Result<()> {
        conn.execute_batch("DROP INDEX IF EXISTS replaceable_idx")?;
        Ok(())
    }

    /// Reject when a version at least as new exists, otherwise evict the older one
    fn before_insert(&self, conn: &Connection, ctx: &InsertContext<'_>) -> Result<()> {
        let event = ctx.event;
        if !is_replaceable(event.kind) {
            return Ok(());
        }

        let superseded: bool = conn
            .prepare_cached(
                "SELECT EXISTS (SELECT 1 FROM event_headers WHERE kind = ?1 AND pubkey = ?2 AND created_at >= ?3)",
            )?
            .query_row(params![event.kind, &event.pubkey, event.created_at], |row| row.get(0))?;
        if superseded {
            return Err(Rejection::Superseded.into());
        }

        let replaced = conn
            .prepare_cached("DELETE FROM event_headers WHERE kind = ?1 AND pubkey = ?2 AND created_at < ?3")?
            .execute(params![event.kind, &event.pubkey, event.created_at])?;
        if replaced > 0 {
            debug!(kind = event.kind, pubkey = %event.pubkey, "Replaced older version");
        }
        Ok(())
    }
}
