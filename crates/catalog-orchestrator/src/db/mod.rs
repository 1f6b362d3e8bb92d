//! SQLite persistence for processing records and the audit log.
//!
//! One connection per process, shared by every worker thread behind a
//! mutex. Repositories take a `&Database` and run their statements inside
//! [`Database::with_conn`].

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rusqlite::Connection;

pub mod audit_repo;
pub mod error;
pub mod migrations;
pub mod record_repo;

pub use error::DatabaseError;

/// How long a statement waits on a lock held by another process.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Shared handle to the record store. Clones point at the same connection.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Opens the record store at `path`, creating parent directories and
    /// upgrading the schema as needed.
    pub fn open(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| DatabaseError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let conn = Connection::open(path)?;
        // WAL lets status queries from other processes read during writes.
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        conn.busy_timeout(BUSY_TIMEOUT)?;

        let db = Self::prepare(conn)?;
        log::info!(
            "Record store at {} (schema v{})",
            path.display(),
            db.schema_version()?
        );
        Ok(db)
    }

    /// Private store for tests and dry runs.
    pub fn open_in_memory() -> Result<Self, DatabaseError> {
        Self::prepare(Connection::open_in_memory()?)
    }

    fn prepare(conn: Connection) -> Result<Self, DatabaseError> {
        migrations::run_all(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn schema_version(&self) -> Result<u32, DatabaseError> {
        self.with_conn(migrations::current_version)
    }

    /// Runs `f` with the connection locked. A panic inside a previous call
    /// poisons the handle and every later call fails with `LockPoisoned`.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, DatabaseError>
    where
        F: FnOnce(&Connection) -> Result<T, DatabaseError>,
    {
        let conn = self.conn.lock().map_err(|_| DatabaseError::LockPoisoned)?;
        f(&conn)
    }
}

/// `~/.catalog-orchestrator/data/records.db`
pub fn default_database_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| {
        h.join(".catalog-orchestrator")
            .join("data")
            .join("records.db")
    })
}

#[cfg(test)]
mod tests {
    use std::panic::{self, AssertUnwindSafe};

    use super::*;

    #[test]
    fn test_in_memory_store_is_fully_migrated() {
        let db = Database::open_in_memory().unwrap();
        assert_eq!(db.schema_version().unwrap(), migrations::latest_version());
    }

    #[test]
    fn test_reopening_file_keeps_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("records.db");

        let db = Database::open(&path).unwrap();
        db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO audit_log (tracking_id, stage, attempt, timestamp, succeeded)
                 VALUES ('t1', 'asr', 1, '2026-01-01T00:00:00.000Z', 1)",
                [],
            )?;
            Ok(())
        })
        .unwrap();
        drop(db);

        let db = Database::open(&path).unwrap();
        let rows: u32 = db
            .with_conn(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM audit_log", [], |r| r.get(0))?))
            .unwrap();
        assert_eq!(rows, 1);
        assert_eq!(db.schema_version().unwrap(), migrations::latest_version());
    }

    #[test]
    fn test_default_database_path() {
        let path = default_database_path().unwrap();
        assert!(path.ends_with("records.db"));
        assert!(path.to_string_lossy().contains(".catalog-orchestrator"));
    }

    #[test]
    fn test_panic_while_locked_poisons_every_clone() {
        let db = Database::open_in_memory().unwrap();
        let other = db.clone();

        let _ = panic::catch_unwind(AssertUnwindSafe(|| {
            db.with_conn(|_| -> Result<(), DatabaseError> { panic!("worker died mid-write") })
        }));

        let err = other.with_conn(|_| Ok(())).unwrap_err();
        assert!(matches!(err, DatabaseError::LockPoisoned));
    }
}
