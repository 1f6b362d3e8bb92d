//! Record repository: CRUD, compare-and-swap updates and leases for the
//! `catalog_records` table.
//!
//! Timestamps are RFC 3339 UTC strings with millisecond precision, so
//! string comparison in SQL orders them correctly.

use rusqlite::{params, OptionalExtension, Row};

use super::{Database, DatabaseError};

/// Raw columns of one stage.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StageRow {
    pub status: String,
    pub attempts: u32,
    /// JSON payload.
    pub result: Option<String>,
    /// JSON error details.
    pub error: Option<String>,
}

impl StageRow {
    fn from_row(row: &Row<'_>, prefix: &str) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            status: row.get(format!("{}_status", prefix).as_str())?,
            attempts: row.get(format!("{}_attempts", prefix).as_str())?,
            result: row.get(format!("{}_result", prefix).as_str())?,
            error: row.get(format!("{}_error", prefix).as_str())?,
        })
    }
}

/// A raw record row from the database.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordRow {
    pub tracking_id: String,
    pub tenant_id: String,
    pub artisan_id: String,
    pub photo_ref: Option<String>,
    pub audio_ref: Option<String>,
    pub language_hint: String,
    pub priority: String,
    pub asr: StageRow,
    pub vision: StageRow,
    pub extraction: StageRow,
    pub mapping: StageRow,
    pub submission: StageRow,
    pub idempotency_key: Option<String>,
    pub ondc_catalog_id: Option<String>,
    pub version: u32,
    pub outcome: String,
    pub needs_manual_review: bool,
    pub error_details: Option<String>,
    pub revision: i64,
    pub lease_owner: Option<String>,
    pub lease_expires_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub completed_at: Option<String>,
}

impl RecordRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            tracking_id: row.get("tracking_id")?,
            tenant_id: row.get("tenant_id")?,
            artisan_id: row.get("artisan_id")?,
            photo_ref: row.get("photo_ref")?,
            audio_ref: row.get("audio_ref")?,
            language_hint: row.get("language_hint")?,
            priority: row.get("priority")?,
            asr: StageRow::from_row(row, "asr")?,
            vision: StageRow::from_row(row, "vision")?,
            extraction: StageRow::from_row(row, "extraction")?,
            mapping: StageRow::from_row(row, "mapping")?,
            submission: StageRow::from_row(row, "submission")?,
            idempotency_key: row.get("idempotency_key")?,
            ondc_catalog_id: row.get("ondc_catalog_id")?,
            version: row.get("version")?,
            outcome: row.get("outcome")?,
            needs_manual_review: row.get("needs_manual_review")?,
            error_details: row.get("error_details")?,
            revision: row.get("revision")?,
            lease_owner: row.get("lease_owner")?,
            lease_expires_at: row.get("lease_expires_at")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
            completed_at: row.get("completed_at")?,
        })
    }
}

/// The listing an idempotency key already produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingRow {
    pub tracking_id: String,
    pub ondc_catalog_id: String,
    pub version: u32,
}

/// Inserts a record unless one with the same tracking id exists.
/// Returns `true` if the row was inserted.
pub fn insert_if_absent(db: &Database, rec: &RecordRow) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "INSERT OR IGNORE INTO catalog_records (
                tracking_id, tenant_id, artisan_id, photo_ref, audio_ref,
                language_hint, priority, version, outcome, needs_manual_review,
                revision, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                rec.tracking_id,
                rec.tenant_id,
                rec.artisan_id,
                rec.photo_ref,
                rec.audio_ref,
                rec.language_hint,
                rec.priority,
                rec.version,
                rec.outcome,
                rec.needs_manual_review,
                rec.revision,
                rec.created_at,
                rec.updated_at,
            ],
        )?;
        Ok(changed == 1)
    })
}

/// Finds a record by its tracking id.
pub fn find_by_id(db: &Database, tracking_id: &str) -> Result<Option<RecordRow>, DatabaseError> {
    db.with_conn(|conn| {
        let row = conn
            .query_row(
                "SELECT * FROM catalog_records WHERE tracking_id = ?1",
                params![tracking_id],
                RecordRow::from_row,
            )
            .optional()?;
        Ok(row)
    })
}

/// Writes every mutable column of `rec` in one statement, guarded by the
/// expected revision and by `lease_owner` holding an unexpired lease.
///
/// The stored revision becomes `expected_revision + 1`. Returns `false`
/// when the guard did not match; nothing is written in that case.
pub fn compare_and_swap(
    db: &Database,
    rec: &RecordRow,
    expected_revision: i64,
    lease_owner: &str,
    now: &str,
) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE catalog_records SET
                asr_status=?5, asr_attempts=?6, asr_result=?7, asr_error=?8,
                vision_status=?9, vision_attempts=?10, vision_result=?11, vision_error=?12,
                extraction_status=?13, extraction_attempts=?14, extraction_result=?15, extraction_error=?16,
                mapping_status=?17, mapping_attempts=?18, mapping_result=?19, mapping_error=?20,
                submission_status=?21, submission_attempts=?22, submission_result=?23, submission_error=?24,
                idempotency_key=?25,
                ondc_catalog_id=COALESCE(ondc_catalog_id, ?26),
                version=?27, outcome=?28, needs_manual_review=?29, error_details=?30,
                language_hint=?31, updated_at=?32, completed_at=?33,
                revision=revision + 1
             WHERE tracking_id=?1 AND revision=?2 AND lease_owner=?3 AND lease_expires_at > ?4",
            params![
                rec.tracking_id,
                expected_revision,
                lease_owner,
                now,
                rec.asr.status,
                rec.asr.attempts,
                rec.asr.result,
                rec.asr.error,
                rec.vision.status,
                rec.vision.attempts,
                rec.vision.result,
                rec.vision.error,
                rec.extraction.status,
                rec.extraction.attempts,
                rec.extraction.result,
                rec.extraction.error,
                rec.mapping.status,
                rec.mapping.attempts,
                rec.mapping.result,
                rec.mapping.error,
                rec.submission.status,
                rec.submission.attempts,
                rec.submission.result,
                rec.submission.error,
                rec.idempotency_key,
                rec.ondc_catalog_id,
                rec.version,
                rec.outcome,
                rec.needs_manual_review,
                rec.error_details,
                rec.language_hint,
                rec.updated_at,
                rec.completed_at,
            ],
        )?;
        Ok(changed == 1)
    })
}

/// Updates the language hint while the ASR stage has not started yet.
pub fn update_language_hint(
    db: &Database,
    tracking_id: &str,
    language_hint: &str,
    updated_at: &str,
) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE catalog_records
             SET language_hint=?2, updated_at=?3, revision=revision + 1
             WHERE tracking_id=?1 AND asr_status='pending' AND language_hint != ?2",
            params![tracking_id, language_hint, updated_at],
        )?;
        Ok(changed == 1)
    })
}

/// Takes the lease if it is free, expired, or already held by `owner`.
pub fn acquire_lease(
    db: &Database,
    tracking_id: &str,
    owner: &str,
    now: &str,
    expires_at: &str,
) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE catalog_records SET lease_owner=?2, lease_expires_at=?4
             WHERE tracking_id=?1
               AND (lease_owner IS NULL OR lease_owner=?2 OR lease_expires_at <= ?3)",
            params![tracking_id, owner, now, expires_at],
        )?;
        Ok(changed == 1)
    })
}

/// Extends a lease that `owner` still holds.
pub fn renew_lease(
    db: &Database,
    tracking_id: &str,
    owner: &str,
    now: &str,
    expires_at: &str,
) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE catalog_records SET lease_expires_at=?4
             WHERE tracking_id=?1 AND lease_owner=?2 AND lease_expires_at > ?3",
            params![tracking_id, owner, now, expires_at],
        )?;
        Ok(changed == 1)
    })
}

/// Drops the lease if `owner` holds it.
pub fn release_lease(db: &Database, tracking_id: &str, owner: &str) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE catalog_records SET lease_owner=NULL, lease_expires_at=NULL
             WHERE tracking_id=?1 AND lease_owner=?2",
            params![tracking_id, owner],
        )?;
        Ok(changed == 1)
    })
}

/// Latest listing created for `idempotency_key`, if any submission succeeded.
pub fn find_listing_by_key(
    db: &Database,
    idempotency_key: &str,
) -> Result<Option<ListingRow>, DatabaseError> {
    db.with_conn(|conn| {
        let row = conn
            .query_row(
                "SELECT tracking_id, ondc_catalog_id, version FROM catalog_records
                 WHERE idempotency_key = ?1 AND ondc_catalog_id IS NOT NULL
                 ORDER BY version DESC, updated_at DESC
                 LIMIT 1",
                params![idempotency_key],
                |r| {
                    Ok(ListingRow {
                        tracking_id: r.get(0)?,
                        ondc_catalog_id: r.get(1)?,
                        version: r.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    })
}

/// Unfinished records nobody is working on: the lease ran out, or an
/// in-progress run released it without reaching a terminal outcome.
pub fn find_resumable(db: &Database, now: &str, limit: u32) -> Result<Vec<String>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT tracking_id FROM catalog_records
             WHERE outcome IN ('pending', 'in_progress')
               AND ((lease_expires_at IS NOT NULL AND lease_expires_at <= ?1)
                    OR (outcome = 'in_progress' AND lease_owner IS NULL))
             ORDER BY updated_at ASC LIMIT ?2",
        )?;
        let ids = stmt
            .query_map(params![now, limit], |r| r.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids)
    })
}

/// Records flagged for manual review, oldest first.
pub fn list_manual_review(db: &Database, limit: u32) -> Result<Vec<RecordRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT * FROM catalog_records WHERE needs_manual_review = 1
             ORDER BY updated_at ASC LIMIT ?1",
        )?;
        let rows = stmt
            .query_map(params![limit], RecordRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}
