//! Self-expiring events
//!
//! Events carrying an `expiration` tag get a row here keyed by their header
//! row id. Reads never filter on it; expired events linger until
//! [`sweep`](ExpirationModule::sweep) runs.

use super::{InsertContext, SchemaModule};
use crate::Result;
use rusqlite::{Connection, params};
use tracing::info;

pub(crate) struct ExpirationModule;

impl ExpirationModule {
    /// Delete every event whose expiration is at or before `now`
    pub fn sweep(&self, conn: &Connection, now: i64) -> Result<usize> {
        let deleted = conn
            .prepare_cached(
                "DELETE FROM event_headers WHERE row_id IN
                    (SELECT event_header_row_id FROM event_expirations WHERE expiration <= ?1)",
            )?
            .execute(params![now])?;

        if deleted > 0 {
            info!(deleted, now, "Swept expired events");
        }
        Ok(deleted)
    }
}

impl SchemaModule for ExpirationModule {
    fn create(&self, conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS event_expirations (
                 event_header_row_id INTEGER PRIMARY KEY
                     REFERENCES event_headers (row_id) ON DELETE CASCADE,
                 expiration INTEGER NOT NULL
             );
             CREATE INDEX IF NOT EXISTS event_expirations_expiration ON event_expirations (expiration);",
        )?;
        Ok(())
    }

    fn teardown(&self, conn: &Connection) -> Result<()> {
        conn.execute_batch("DROP TABLE IF EXISTS event_expirations")?;
        Ok(())
    }

    fn delete_all(&self, conn: &Connection) -> Result<()> {
        conn.execute_batch("DELETE FROM event_expirations")?;
        Ok(())
    }

    fn after_insert(&self, conn: &Connection, ctx: &InsertContext<'_>, row_id: i64) -> Result<()> {
        if let Some(expiration) = ctx.event.expiration() {
            conn.prepare_cached(
                "INSERT INTO event_expirations (event_header_row_id, expiration) VALUES (?1, ?2)",
            )?
            .execute(params![row_id, expiration])?;
        }
        Ok(())
    }
}
