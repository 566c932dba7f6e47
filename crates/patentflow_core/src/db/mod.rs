//! Patent store bootstrap.
//!
//! # Responsibility
//! - Open SQLite connections for the patent store with foreign keys and a
//!   busy timeout, so concurrent transition commits wait instead of failing.
//! - Bring the schema (patents and tracks, examination rounds and form
//!   flags, timeline events) up to date before any repository runs.
//!
//! # Invariants
//! - Schema version lives in `PRAGMA user_version`; a store written by a
//!   newer build is refused, never downgraded.
//! - `SqlitePatentRepository::try_new` rejects connections that skipped
//!   this bootstrap.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod migrations;
mod open;

pub use migrations::{current_user_version as schema_version, latest_version};
pub use open::{open_db, open_db_in_memory, BUSY_TIMEOUT};

pub type DbResult<T> = Result<T, DbError>;

/// Patent store driver and schema errors.
#[derive(Debug)]
pub enum DbError {
    /// SQLite driver failure, also reused by repositories.
    Sqlite(rusqlite::Error),
    /// The file was written by a newer build; refuse to touch it.
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::UnsupportedSchemaVersion {
                db_version,
                latest_supported,
            } => write!(
                f,
                "patent store schema version {db_version} is newer than supported {latest_supported}"
            ),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::UnsupportedSchemaVersion { .. } => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}
