//! Error types for quiver-core

use std::fmt;
use thiserror::Error;

/// Result type alias for quiver-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the library
#[derive(Error, Debug)]
pub enum Error {
    /// SQLite error
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The store refused the event because it would break a protocol rule.
    ///
    /// Every variant of [`Rejection`] is expected traffic (duplicates, stale
    /// replaceables, deleted or vanished content). Treat them alike: log and move on.
    #[error("Insert rejected: {0}")]
    Rejected(Rejection),

    /// The caller submitted an event that had already expired
    #[error("Event {id} expired at {expiration}")]
    Expired { id: String, expiration: i64 },

    /// Malformed event or filter input
    #[error("Conversion failed: {0}")]
    Conversion(String),

    /// The database file was written by a newer schema
    #[error("Unsupported schema version {found} (expected at most {expected})")]
    SchemaVersion { found: i32, expected: i32 },

    /// Persisted store configuration is missing or unreadable
    #[error("Invalid store configuration: {0}")]
    Config(String),
}

impl Error {
    /// True for protocol-contract rejections raised inside the insert transaction
    pub fn is_rejection(&self) -> bool {
        matches!(self, Error::Rejected(_))
    }
}

/// Why an insert was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rejection {
    /// Same id, or an equal-or-newer version of the same replaceable/addressable slot
    Duplicate,
    /// A newer or same-timestamp replaceable event is already stored
    Superseded,
    /// A deletion request from the author already covers this event
    Deleted,
    /// The author vanished at or after this event's timestamp
    Vanished,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            Rejection::Duplicate => "duplicate event",
            Rejection::Superseded => "a newer version is already stored",
            Rejection::Deleted => "blocked by a deletion request",
            Rejection::Vanished => "author requested to vanish",
        };
        f.write_str(reason)
    }
}

impl From<Rejection> for Error {
    fn from(reason: Rejection) -> Self {
        Error::Rejected(reason)
    }
}

/// Map unique-constraint failures on insert to a duplicate rejection
pub(crate) fn reject_duplicates(err: rusqlite::Error) -> Error {
    match &err {
        rusqlite::Error::SqliteFailure(failure, _)
            if failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                || failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY =>
        {
            Error::Rejected(Rejection::Duplicate)
        }
        _ => Error::Sqlite(err),
    }
}
