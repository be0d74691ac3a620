//! Database schema, one module per invariant
//!
//! Every module owns its tables and indexes, can tear them down, can empty
//! them, and may hook into the insert path. The store runs the hooks in a
//! fixed order inside a single transaction:
//!
//! ```text
//! before_insert:  replaceable → addressable → deletion → vanish
//! header insert:  base (header row + tag rows)
//! after_insert:   deletion → expiration → full text → vanish
//! ```
//!
//! A hook that returns an error aborts the transaction, so an event lands
//! together with all of its side effects or not at all.

mod addressable;
mod base;
mod deletion;
mod expiration;
mod fulltext;
mod replaceable;
mod vanish;

pub use fulltext::FtsVersion;

pub(crate) use addressable::AddressableModule;
pub(crate) use base::EventIndexesModule;
pub(crate) use deletion::DeletionRequestModule;
pub(crate) use expiration::ExpirationModule;
pub(crate) use fulltext::{FTS_TABLE, FullTextModule, match_expression};
pub(crate) use replaceable::ReplaceableModule;
pub(crate) use vanish::RightToVanishModule;

use crate::config::StoreConfig;
use crate::hasher::TagHasher;
use crate::{Error, Event, Result};
use rusqlite::{Connection, OptionalExtension, params};
use tracing::debug;

/// Current schema version, kept in `PRAGMA user_version`
pub const SCHEMA_VERSION: i32 = 1;

/// What a module sees of the event being inserted
pub(crate) struct InsertContext<'a> {
    pub event: &'a Event,
    pub hasher: &'a TagHasher,
    pub pubkey_hash: i64,
}

impl<'a> InsertContext<'a> {
    pub fn new(event: &'a Event, hasher: &'a TagHasher) -> Self {
        Self {
            event,
            hasher,
            pubkey_hash: hasher.hash_pubkey(&event.pubkey),
        }
    }
}

pub(crate) trait SchemaModule {
    fn create(&self, conn: &Connection) -> Result<()>;

    fn teardown(&self, conn: &Connection) -> Result<()>;

    /// Remove every row this module owns
    fn delete_all(&self, _conn: &Connection) -> Result<()> {
        Ok(())
    }

    fn before_insert(&self, _conn: &Connection, _ctx: &InsertContext<'_>) -> Result<()> {
        Ok(())
    }

    fn after_insert(&self, _conn: &Connection, _ctx: &InsertContext<'_>, _row_id: i64) -> Result<()> {
        Ok(())
    }
}

/// All modules of a store, in hook order
pub(crate) struct Schema {
    pub base: EventIndexesModule,
    pub replaceable: ReplaceableModule,
    pub addressable: AddressableModule,
    pub deletion: DeletionRequestModule,
    pub expiration: ExpirationModule,
    pub fts: FullTextModule,
    pub vanish: RightToVanishModule,
}

impl Schema {
    pub fn new(config: &StoreConfig, fts: FtsVersion) -> Self {
        Self {
            base: EventIndexesModule::new(config.policy),
            replaceable: ReplaceableModule,
            addressable: AddressableModule,
            deletion: DeletionRequestModule,
            expiration: ExpirationModule,
            fts: FullTextModule::new(fts, config.searchable_kinds.clone()),
            vanish: RightToVanishModule,
        }
    }

    fn modules(&self) -> [&dyn SchemaModule; 7] {
        [
            &self.base,
            &self.replaceable,
            &self.addressable,
            &self.deletion,
            &self.expiration,
            &self.fts,
            &self.vanish,
        ]
    }

    pub fn create(&self, conn: &Connection) -> Result<()> {
        for module in self.modules() {
            module.create(conn)?;
        }
        Ok(())
    }

    pub fn teardown(&self, conn: &Connection) -> Result<()> {
        for module in self.modules().into_iter().rev() {
            module.teardown(conn)?;
        }
        Ok(())
    }

    pub fn delete_all(&self, conn: &Connection) -> Result<()> {
        for module in self.modules().into_iter().rev() {
            module.delete_all(conn)?;
        }
        Ok(())
    }

    /// Run one event through every module; returns the new header row id
    pub fn insert(&self, conn: &Connection, ctx: &InsertContext<'_>) -> Result<i64> {
        let modules = self.modules();

        for module in modules {
            module.before_insert(conn, ctx)?;
        }

        let row_id = self.base.insert(conn, ctx)?;

        for module in modules {
            module.after_insert(conn, ctx, row_id)?;
        }

        Ok(row_id)
    }
}

/// Insert-once, delete-never configuration record
const CREATE_STORE_CONFIG: &str = r#"
CREATE TABLE store_config (
    id          INTEGER PRIMARY KEY CHECK (id = 1),
    seed        INTEGER NOT NULL,
    fts_version TEXT NOT NULL
);

CREATE TRIGGER store_config_prevent_update
BEFORE UPDATE ON store_config
BEGIN
    SELECT RAISE(ABORT, 'store_config is immutable');
END;

CREATE TRIGGER store_config_prevent_delete
BEFORE DELETE ON store_config
BEGIN
    SELECT RAISE(ABORT, 'store_config is immutable');
END;
"#;

/// Values fixed for the lifetime of a database file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct StoredConfig {
    pub seed: u64,
    pub fts_version: FtsVersion,
}

impl StoredConfig {
    pub fn create(conn: &Connection, record: StoredConfig) -> Result<()> {
        conn.execute_batch(CREATE_STORE_CONFIG)?;
        conn.execute(
            "INSERT INTO store_config (id, seed, fts_version) VALUES (1, ?1, ?2)",
            params![record.seed as i64, record.fts_version.as_str()],
        )?;
        debug!(seed = record.seed, fts = %record.fts_version, "Stored configuration record");
        Ok(())
    }

    /// Dropping the table removes its guard triggers with it
    pub fn teardown(conn: &Connection) -> Result<()> {
        conn.execute_batch("DROP TABLE IF EXISTS store_config;")?;
        Ok(())
    }

    pub fn load(conn: &Connection) -> Result<Self> {
        let row: Option<(i64, String)> = conn
            .query_row(
                "SELECT seed, fts_version FROM store_config WHERE id = 1",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let (seed, fts) = row.ok_or_else(|| Error::Config("missing store_config row".to_string()))?;
        let fts_version = fts
            .parse::<FtsVersion>()
            .map_err(|_| Error::Config(format!("unknown full-text version '{}'", fts)))?;

        Ok(Self {
            seed: seed as u64,
            fts_version,
        })
    }
}

pub(crate) fn user_version(conn: &Connection) -> Result<i32> {
    Ok(conn.query_row("PRAGMA user_version", [], |row| row.get(0))?)
}

pub(crate) fn set_user_version(conn: &Connection, version: i32) -> Result<()> {
    conn.execute_batch(&format!("PRAGMA user_version = {}", version))?;
    Ok(())
}

/// Bring an existing file up to [`SCHEMA_VERSION`]
///
/// Version 1 is the only layout so far; later versions upgrade one step at a time here.
pub(crate) fn migrate(_conn: &Connection, found: i32) -> Result<()> {
    if found == SCHEMA_VERSION {
        return Ok(());
    }
    Err(Error::SchemaVersion {
        found,
        expected: SCHEMA_VERSION,
    })
}
