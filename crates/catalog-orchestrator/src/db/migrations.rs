//! Schema migrations.
//!
//! Each step runs in its own transaction together with its `_migrations`
//! row, so a failed step leaves the file at the previous version.

use rusqlite::{params, Connection};

use super::error::DatabaseError;

/// `(version, name, sql)`, in apply order.
const STEPS: &[(u32, &str, &str)] = &[
    (
        1,
        "create_catalog_records_table",
        include_str!("sql/001_create_catalog_records.sql"),
    ),
    (
        2,
        "create_audit_log_table",
        include_str!("sql/002_create_audit_log.sql"),
    ),
];

/// Highest version this build knows about.
pub fn latest_version() -> u32 {
    STEPS.last().map(|(v, _, _)| *v).unwrap_or(0)
}

/// Version recorded in the file, 0 for a fresh one.
pub fn current_version(conn: &Connection) -> Result<u32, DatabaseError> {
    Ok(conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM _migrations",
        [],
        |r| r.get(0),
    )?)
}

/// Brings the schema up to [`latest_version`].
pub fn run_all(conn: &Connection) -> Result<(), DatabaseError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _migrations (
            version INTEGER PRIMARY KEY,
            description TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )?;

    let from = current_version(conn)?;
    if from > latest_version() {
        return Err(DatabaseError::Migration {
            version: from,
            reason: format!(
                "record store was written by a newer build (schema v{}, known v{})",
                from,
                latest_version()
            ),
        });
    }

    for &(version, name, sql) in STEPS.iter().filter(|(v, _, _)| *v > from) {
        log::info!("Applying schema v{} ({})", version, name);
        let fail = |e: rusqlite::Error| DatabaseError::Migration {
            version,
            reason: e.to_string(),
        };
        let tx = conn.unchecked_transaction().map_err(fail)?;
        tx.execute_batch(sql).map_err(fail)?;
        tx.execute(
            "INSERT INTO _migrations (version, description) VALUES (?1, ?2)",
            params![version, name],
        )
        .map_err(fail)?;
        tx.commit().map_err(fail)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_db_reaches_latest_version() {
        let conn = Connection::open_in_memory().unwrap();
        run_all(&conn).unwrap();
        assert_eq!(current_version(&conn).unwrap(), latest_version());

        conn.execute(
            "INSERT INTO audit_log (tracking_id, stage, attempt, timestamp, succeeded, detail)
             VALUES ('t1', 'asr', 1, '2026-01-01T00:00:00.000Z', 0, 'timeout')",
            [],
        )
        .unwrap();
    }

    #[test]
    fn test_rerun_applies_nothing() {
        let conn = Connection::open_in_memory().unwrap();
        run_all(&conn).unwrap();
        run_all(&conn).unwrap();

        let rows: u32 = conn
            .query_row("SELECT COUNT(*) FROM _migrations", [], |r| r.get(0))
            .unwrap();
        assert_eq!(rows, STEPS.len() as u32);
    }

    #[test]
    fn test_newer_schema_is_refused() {
        let conn = Connection::open_in_memory().unwrap();
        run_all(&conn).unwrap();
        conn.execute(
            "INSERT INTO _migrations (version, description) VALUES (?1, 'future')",
            params![latest_version() + 1],
        )
        .unwrap();

        let err = run_all(&conn).unwrap_err();
        assert!(matches!(err, DatabaseError::Migration { .. }));
    }

    #[test]
    fn test_audit_log_rejects_updates() {
        let conn = Connection::open_in_memory().unwrap();
        run_all(&conn).unwrap();
        conn.execute(
            "INSERT INTO audit_log (tracking_id, stage, attempt, timestamp, succeeded)
             VALUES ('t1', 'submission', 1, '2026-01-01T00:00:00.000Z', 0)",
            [],
        )
        .unwrap();

        assert!(conn
            .execute("UPDATE audit_log SET succeeded = 1", [])
            .is_err());
        assert!(conn.execute("DELETE FROM audit_log", []).is_err());
    }
}
