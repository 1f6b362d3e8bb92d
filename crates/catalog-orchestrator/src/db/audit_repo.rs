//! Append-only audit log of stage failures and submission attempts.

use rusqlite::{params, Row};

use super::{Database, DatabaseError};

/// A raw audit row. `id` is assigned by the database on insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditRow {
    pub id: i64,
    pub tracking_id: String,
    pub stage: String,
    pub attempt: u32,
    pub idempotency_key: Option<String>,
    pub timestamp: String,
    pub response_code: Option<u16>,
    pub error_category: Option<String>,
    pub succeeded: bool,
    pub detail: Option<String>,
}

impl AuditRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            tracking_id: row.get("tracking_id")?,
            stage: row.get("stage")?,
            attempt: row.get("attempt")?,
            idempotency_key: row.get("idempotency_key")?,
            timestamp: row.get("timestamp")?,
            response_code: row.get("response_code")?,
            error_category: row.get("error_category")?,
            succeeded: row.get("succeeded")?,
            detail: row.get("detail")?,
        })
    }
}

/// Appends an entry and returns its id.
pub fn append(db: &Database, entry: &AuditRow) -> Result<i64, DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO audit_log (tracking_id, stage, attempt, idempotency_key, timestamp,
             response_code, error_category, succeeded, detail)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                entry.tracking_id,
                entry.stage,
                entry.attempt,
                entry.idempotency_key,
                entry.timestamp,
                entry.response_code,
                entry.error_category,
                entry.succeeded,
                entry.detail,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    })
}

/// All entries for a record in insertion order.
pub fn list_for_record(db: &Database, tracking_id: &str) -> Result<Vec<AuditRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt =
            conn.prepare("SELECT * FROM audit_log WHERE tracking_id = ?1 ORDER BY id ASC")?;
        let rows = stmt
            .query_map(params![tracking_id], AuditRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Number of entries for one record and stage.
pub fn count_for_stage(db: &Database, tracking_id: &str, stage: &str) -> Result<u64, DatabaseError> {
    db.with_conn(|conn| {
        let count: u64 = conn.query_row(
            "SELECT COUNT(*) FROM audit_log WHERE tracking_id = ?1 AND stage = ?2",
            params![tracking_id, stage],
            |r| r.get(0),
        )?;
        Ok(count)
    })
}
