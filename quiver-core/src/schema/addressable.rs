//! At most one event per `(kind, author, d tag)` for addressable kinds
//!
//! Older versions are evicted before the new header lands. An equal or newer
//! version already in place trips the unique index instead, which the base
//! insert reports as a duplicate.

use super::{InsertContext, SchemaModule};
use crate::kind::ADDRESSABLE_SQL;
use crate::Result;
use rusqlite::{Connection, params};
use tracing::debug;

pub(crate) struct AddressableModule;

impl SchemaModule for AddressableModule {
    fn create(&self, conn: &Connection) -> Result<()> {
        conn.execute_batch(&format!(
            "CREATE UNIQUE INDEX IF NOT EXISTS addressable_idx ON event_headers (kind, pubkey, d_tag) WHERE {}",
            ADDRESSABLE_SQL
        ))?;
        Ok(())
    }

    fn teardown(&self, conn: &Connection) -> Result<()> {
        conn.execute_batch("DROP INDEX IF EXISTS addressable_idx")?;
        Ok(())
    }

    fn before_insert(&self, conn: &Connection, ctx: &InsertContext<'_>) -> Result<()> {
        let event = ctx.event;
        let Some(d_tag) = event.d_tag() else {
            return Ok(());
        };

        let replaced = conn
            .prepare_cached(&format!(
                "DELETE FROM event_headers WHERE kind = ?1 AND pubkey = ?2 AND d_tag = ?3 AND created_at < ?4 AND {}",
                ADDRESSABLE_SQL
            ))?
            .execute(params![event.kind, &event.pubkey, d_tag, event.created_at])?;
        if replaced > 0 {
            debug!(kind = event.kind, pubkey = %event.pubkey, d_tag, "Replaced older version");
        }
        Ok(())
    }
}
