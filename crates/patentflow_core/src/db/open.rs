//! Connection bootstrap utilities for SQLite.
//!
//! # Responsibility
//! - Open file or in-memory SQLite connections for the workflow store.
//! - Configure connection pragmas required by transition atomicity.
//! - Trigger schema migrations before returning a usable connection.
//!
//! # Invariants
//! - Returned connections have `foreign_keys=ON`.
//! - Returned connections have migrations fully applied.
//! - Returned connections wait up to `BUSY_TIMEOUT` on competing writers.

use super::migrations::{apply_migrations, current_user_version};
use super::DbResult;
use log::{error, info};
use rusqlite::Connection;
use std::path::Path;
use std::time::{Duration, Instant};

/// How long a connection waits for a competing `BEGIN IMMEDIATE` writer.
pub const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone, Copy)]
enum OpenTarget<'a> {
    File(&'a Path),
    Memory,
}

impl OpenTarget<'_> {
    fn mode(self) -> &'static str {
        match self {
            Self::File(_) => "file",
            Self::Memory => "memory",
        }
    }

    fn connect(self) -> rusqlite::Result<Connection> {
        match self {
            Self::File(path) => Connection::open(path),
            Self::Memory => Connection::open_in_memory(),
        }
    }
}

/// Opens a SQLite database file and applies all pending migrations.
///
/// Every process sharing the file should open its own connection; writers
/// are serialized by SQLite.
///
/// # Side effects
/// - Creates the file when missing.
/// - Emits `db_open` logging events with duration and status.
pub fn open_db(path: impl AsRef<Path>) -> DbResult<Connection> {
    open_target(OpenTarget::File(path.as_ref()))
}

/// Opens an in-memory SQLite database and applies all pending migrations.
///
/// # Side effects
/// - Emits `db_open` logging events with duration and status.
pub fn open_db_in_memory() -> DbResult<Connection> {
    open_target(OpenTarget::Memory)
}

fn open_target(target: OpenTarget<'_>) -> DbResult<Connection> {
    let started_at = Instant::now();
    let mode = target.mode();
    info!("event=db_open module=db status=start mode={mode}");

    let mut conn = match target.connect() {
        Ok(conn) => conn,
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode={mode} duration_ms={} error_code=db_open_failed error={}",
                started_at.elapsed().as_millis(),
                err
            );
            return Err(err.into());
        }
    };

    match bootstrap_connection(&mut conn) {
        Ok(schema_version) => {
            info!(
                "event=db_open module=db status=ok mode={mode} schema_version={schema_version} duration_ms={}",
                started_at.elapsed().as_millis()
            );
            Ok(conn)
        }
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode={mode} duration_ms={} error_code=db_bootstrap_failed error={}",
                started_at.elapsed().as_millis(),
                err
            );
            Err(err)
        }
    }
}

fn bootstrap_connection(conn: &mut Connection) -> DbResult<u32> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    apply_migrations(conn)?;
    current_user_version(conn)
}
