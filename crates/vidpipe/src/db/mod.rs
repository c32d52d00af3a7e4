//! SQLite persistence for the job queue.
//!
//! One connection per [`Database`], shared by every clone and guarded by a
//! mutex. Queue semantics live in [`crate::worker::store`]; this module only
//! knows rows.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::Connection;

pub mod error;
pub mod job_repo;
pub mod migrations;
pub mod stats_repo;

pub use error::DatabaseError;

/// Shared handle to the queue database. Clones share one connection.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Opens or creates the database file, creating parent directories,
    /// and migrates it to the current schema.
    pub fn open(path: &Path) -> Result<Self, DatabaseError> {
        let dir = path.parent().filter(|d| !d.as_os_str().is_empty());
        if let Some(dir) = dir {
            std::fs::create_dir_all(dir).map_err(|source| DatabaseError::Io {
                path: dir.to_path_buf(),
                source,
            })?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        let db = Self::prepare(conn)?;
        log::info!("Queue database ready at {}", path.display());
        Ok(db)
    }

    /// Private in-memory database with the current schema.
    pub fn open_in_memory() -> Result<Self, DatabaseError> {
        Self::prepare(Connection::open_in_memory()?)
    }

    fn prepare(conn: Connection) -> Result<Self, DatabaseError> {
        conn.pragma_update(None, "foreign_keys", true)?;
        migrations::run_all(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Runs `f` while holding the connection lock.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, DatabaseError>
    where
        F: FnOnce(&Connection) -> Result<T, DatabaseError>,
    {
        let guard = self.conn.lock().map_err(|_| DatabaseError::LockPoisoned)?;
        f(&guard)
    }

    /// Removes orphaned transcript rows and compacts the database file.
    /// Returns the number of orphaned rows removed.
    pub fn optimize(&self) -> Result<usize, DatabaseError> {
        self.with_conn(|conn| {
            let removed = conn.execute(
                "DELETE FROM transcripts WHERE job_id NOT IN (SELECT id FROM jobs)",
                [],
            )?;
            conn.execute_batch("PRAGMA optimize; VACUUM;")?;
            Ok(removed)
        })
    }
}

/// `~/.vidpipe/data/vidpipe.db`, when a home directory is known.
pub fn default_database_path() -> Option<PathBuf> {
    let home = dirs::home_dir()?;
    Some(home.join(".vidpipe").join("data").join("vidpipe.db"))
}

/// Formats a timestamp for storage.
///
/// Fixed-width microsecond precision keeps lexical order equal to
/// chronological order, which the queue ordering relies on.
pub fn format_timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parses a stored timestamp, falling back to "now" for corrupt values.
pub fn parse_timestamp(s: &str) -> DateTime<Utc> {
    match DateTime::parse_from_rfc3339(s) {
        Ok(ts) => ts.with_timezone(&Utc),
        Err(e) => {
            log::warn!("Unreadable stored timestamp {:?} ({}), using now", s, e);
            Utc::now()
        }
    }
}
