//! Full-text index over event content
//!
//! The index rowid is the header row id. Only kinds configured as searchable
//! get a row; its text is the content followed by human-readable tags.
//!
//! Which FTS engine backs the table depends on what the SQLite build offers,
//! so it is probed once when the database is created and recorded with it.

use super::{InsertContext, SchemaModule};
use crate::Result;
use rusqlite::{Connection, params};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn};

pub(crate) const FTS_TABLE: &str = "event_fts";

/// Tags whose values join the content in the full-text row
const TEXT_TAGS: &[&str] = &["title", "subject", "summary", "alt"];

/// Full-text engine backing the search index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FtsVersion {
    /// FTS5 with the diacritics-folding unicode61 tokenizer
    Fts5Unicode,
    Fts5,
    Fts4,
    Fts3,
    /// No engine available; searches match nothing
    Disabled,
}

impl FtsVersion {
    /// Candidates, best first
    const PROBE_ORDER: [FtsVersion; 4] = [
        FtsVersion::Fts5Unicode,
        FtsVersion::Fts5,
        FtsVersion::Fts4,
        FtsVersion::Fts3,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FtsVersion::Fts5Unicode => "fts5-unicode61",
            FtsVersion::Fts5 => "fts5",
            FtsVersion::Fts4 => "fts4",
            FtsVersion::Fts3 => "fts3",
            FtsVersion::Disabled => "disabled",
        }
    }

    pub fn is_enabled(&self) -> bool {
        *self != FtsVersion::Disabled
    }

    /// `USING ...` clause of the virtual table
    fn module_args(&self) -> Option<&'static str> {
        match self {
            FtsVersion::Fts5Unicode => Some("fts5(content, tokenize = 'unicode61 remove_diacritics 2')"),
            FtsVersion::Fts5 => Some("fts5(content)"),
            FtsVersion::Fts4 => Some("fts4(content, tokenize=unicode61)"),
            FtsVersion::Fts3 => Some("fts3(content)"),
            FtsVersion::Disabled => None,
        }
    }

    /// Best engine the linked SQLite supports
    pub fn probe(conn: &Connection) -> FtsVersion {
        for candidate in Self::PROBE_ORDER {
            let Some(args) = candidate.module_args() else {
                continue;
            };
            let sql = format!(
                "CREATE VIRTUAL TABLE temp.fts_probe USING {args};
                 DROP TABLE temp.fts_probe;"
            );
            match conn.execute_batch(&sql) {
                Ok(()) => {
                    debug!(version = %candidate, "Full-text engine available");
                    return candidate;
                }
                Err(e) => debug!(version = %candidate, error = %e, "Full-text engine unavailable"),
            }
        }
        warn!("No full-text engine available, search disabled");
        FtsVersion::Disabled
    }
}

impl fmt::Display for FtsVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FtsVersion {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "fts5-unicode61" => Ok(FtsVersion::Fts5Unicode),
            "fts5" => Ok(FtsVersion::Fts5),
            "fts4" => Ok(FtsVersion::Fts4),
            "fts3" => Ok(FtsVersion::Fts3),
            "disabled" => Ok(FtsVersion::Disabled),
            other => Err(format!("unknown full-text version: {other}")),
        }
    }
}

/// Quote every whitespace-separated term so user input is never parsed as
/// FTS query syntax; terms are ANDed
pub(crate) fn match_expression(search: &str) -> String {
    search
        .split_whitespace()
        .map(|term| format!("\"{}\"", term.replace('"', "\"\"")))
        .collect::<Vec<_>>()
        .join(" ")
}

pub(crate) struct FullTextModule {
    version: FtsVersion,
    searchable_kinds: BTreeSet<u16>,
}

impl FullTextModule {
    pub fn new(version: FtsVersion, searchable_kinds: BTreeSet<u16>) -> Self {
        Self {
            version,
            searchable_kinds,
        }
    }

    pub fn version(&self) -> FtsVersion {
        self.version
    }

    fn indexed_text(&self, ctx: &InsertContext<'_>) -> String {
        let event = ctx.event;
        let mut text = event.content.clone();
        for tag in &event.tags {
            if let (Some(name), Some(value)) = (tag.name(), tag.value())
                && TEXT_TAGS.contains(&name)
            {
                text.push('\n');
                text.push_str(value);
            }
        }
        text
    }
}

impl SchemaModule for FullTextModule {
    fn create(&self, conn: &Connection) -> Result<()> {
        let Some(args) = self.version.module_args() else {
            return Ok(());
        };
        conn.execute_batch(&format!(
            "CREATE VIRTUAL TABLE IF NOT EXISTS {FTS_TABLE} USING {args};

             CREATE TRIGGER IF NOT EXISTS event_fts_cleanup
             AFTER DELETE ON event_headers
             BEGIN
                 DELETE FROM {FTS_TABLE} WHERE rowid = OLD.row_id;
             END;"
        ))?;
        Ok(())
    }

    fn teardown(&self, conn: &Connection) -> Result<()> {
        conn.execute_batch(&format!(
            "DROP TRIGGER IF EXISTS event_fts_cleanup;
             DROP TABLE IF EXISTS {FTS_TABLE};"
        ))?;
        Ok(())
    }

    fn delete_all(&self, conn: &Connection) -> Result<()> {
        if self.version.is_enabled() {
            conn.execute_batch(&format!("DELETE FROM {FTS_TABLE}"))?;
        }
        Ok(())
    }

    fn after_insert(&self, conn: &Connection, ctx: &InsertContext<'_>, row_id: i64) -> Result<()> {
        if !self.version.is_enabled() || !self.searchable_kinds.contains(&ctx.event.kind) {
            return Ok(());
        }

        let text = self.indexed_text(ctx);
        if text.trim().is_empty() {
            return Ok(());
        }

        conn.prepare_cached(&format!("INSERT INTO {FTS_TABLE} (rowid, content) VALUES (?1, ?2)"))?
            .execute(params![row_id, text])?;
        Ok(())
    }
}
