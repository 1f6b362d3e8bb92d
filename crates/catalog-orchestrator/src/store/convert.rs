//! Conversions between raw database rows and domain records.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::catalog::{
    CatalogProcessingRecord, ErrorCategory, ErrorDetails, LanguageCode, MediaRefs, Priority,
    RecordOutcome, Stage, StageState, StageStatus,
};
use crate::db::audit_repo::AuditRow;
use crate::db::record_repo::{RecordRow, StageRow};
use crate::db::DatabaseError;
use crate::error::StoreError;
use crate::time::{format_timestamp, parse_timestamp};

use super::AuditEntry;

// ─── Encoding ───────────────────────────────────────────────────────────────

fn encode_json<T: Serialize>(value: &T, column: &'static str) -> Result<String, StoreError> {
    serde_json::to_string(value).map_err(|source| StoreError::Encode { column, source })
}

fn encode_stage<T: Serialize>(
    state: &StageState<T>,
    column: &'static str,
) -> Result<StageRow, StoreError> {
    Ok(StageRow {
        status: state.status.as_str().to_string(),
        attempts: state.attempts,
        result: state
            .result
            .as_ref()
            .map(|r| encode_json(r, column))
            .transpose()?,
        error: state
            .error
            .as_ref()
            .map(|e| encode_json(e, column))
            .transpose()?,
    })
}

pub(crate) fn record_to_row(rec: &CatalogProcessingRecord) -> Result<RecordRow, StoreError> {
    Ok(RecordRow {
        tracking_id: rec.tracking_id.clone(),
        tenant_id: rec.tenant_id.clone(),
        artisan_id: rec.artisan_id.clone(),
        photo_ref: rec.media.photo_ref.clone(),
        audio_ref: rec.media.audio_ref.clone(),
        language_hint: rec.language_hint.as_str().to_string(),
        priority: rec.priority.as_str().to_string(),
        asr: encode_stage(&rec.asr, "asr")?,
        vision: encode_stage(&rec.vision, "vision")?,
        extraction: encode_stage(&rec.extraction, "extraction")?,
        mapping: encode_stage(&rec.mapping, "mapping")?,
        submission: encode_stage(&rec.submission, "submission")?,
        idempotency_key: rec.idempotency_key.clone(),
        ondc_catalog_id: rec.ondc_catalog_id.clone(),
        version: rec.version,
        outcome: rec.outcome.as_str().to_string(),
        needs_manual_review: rec.needs_manual_review,
        error_details: rec
            .error_details
            .as_ref()
            .map(|e| encode_json(e, "error_details"))
            .transpose()?,
        revision: rec.revision,
        lease_owner: rec.lease_owner.clone(),
        lease_expires_at: rec.lease_expires_at.map(format_timestamp),
        created_at: format_timestamp(rec.created_at),
        updated_at: format_timestamp(rec.updated_at),
        completed_at: rec.completed_at.map(format_timestamp),
    })
}

// ─── Decoding ───────────────────────────────────────────────────────────────

fn decode_err(column: &'static str, reason: impl ToString) -> DatabaseError {
    DatabaseError::Decode {
        column,
        reason: reason.to_string(),
    }
}

fn decode_json<T: DeserializeOwned>(raw: &str, column: &'static str) -> Result<T, DatabaseError> {
    serde_json::from_str(raw).map_err(|e| decode_err(column, e))
}

fn decode_time(
    raw: &str,
    column: &'static str,
) -> Result<chrono::DateTime<chrono::Utc>, DatabaseError> {
    parse_timestamp(raw).map_err(|e| decode_err(column, e))
}

fn decode_stage<T: DeserializeOwned>(
    row: &StageRow,
    column: &'static str,
) -> Result<StageState<T>, DatabaseError> {
    let status = StageStatus::parse(&row.status)
        .ok_or_else(|| decode_err(column, format!("unknown status '{}'", row.status)))?;
    Ok(StageState {
        status,
        attempts: row.attempts,
        result: row
            .result
            .as_deref()
            .map(|r| decode_json(r, column))
            .transpose()?,
        error: row
            .error
            .as_deref()
            .map(|e| decode_json::<ErrorDetails>(e, column))
            .transpose()?,
    })
}

pub(crate) fn record_from_row(row: &RecordRow) -> Result<CatalogProcessingRecord, DatabaseError> {
    let language_hint = LanguageCode::parse(&row.language_hint).ok_or_else(|| {
        decode_err(
            "language_hint",
            format!("unknown language '{}'", row.language_hint),
        )
    })?;
    let priority = Priority::parse(&row.priority)
        .ok_or_else(|| decode_err("priority", format!("unknown priority '{}'", row.priority)))?;
    let outcome = RecordOutcome::parse(&row.outcome)
        .ok_or_else(|| decode_err("outcome", format!("unknown outcome '{}'", row.outcome)))?;

    Ok(CatalogProcessingRecord {
        tracking_id: row.tracking_id.clone(),
        tenant_id: row.tenant_id.clone(),
        artisan_id: row.artisan_id.clone(),
        media: MediaRefs {
            photo_ref: row.photo_ref.clone(),
            audio_ref: row.audio_ref.clone(),
        },
        language_hint,
        priority,
        asr: decode_stage(&row.asr, "asr")?,
        vision: decode_stage(&row.vision, "vision")?,
        extraction: decode_stage(&row.extraction, "extraction")?,
        mapping: decode_stage(&row.mapping, "mapping")?,
        submission: decode_stage(&row.submission, "submission")?,
        idempotency_key: row.idempotency_key.clone(),
        ondc_catalog_id: row.ondc_catalog_id.clone(),
        version: row.version,
        outcome,
        needs_manual_review: row.needs_manual_review,
        error_details: row
            .error_details
            .as_deref()
            .map(|e| decode_json(e, "error_details"))
            .transpose()?,
        revision: row.revision,
        lease_owner: row.lease_owner.clone(),
        lease_expires_at: row
            .lease_expires_at
            .as_deref()
            .map(|t| decode_time(t, "lease_expires_at"))
            .transpose()?,
        created_at: decode_time(&row.created_at, "created_at")?,
        updated_at: decode_time(&row.updated_at, "updated_at")?,
        completed_at: row
            .completed_at
            .as_deref()
            .map(|t| decode_time(t, "completed_at"))
            .transpose()?,
    })
}

// ─── Audit ──────────────────────────────────────────────────────────────────

pub(crate) fn audit_to_row(entry: &AuditEntry) -> AuditRow {
    AuditRow {
        id: 0,
        tracking_id: entry.tracking_id.clone(),
        stage: entry.stage.as_str().to_string(),
        attempt: entry.attempt,
        idempotency_key: entry.idempotency_key.clone(),
        timestamp: format_timestamp(entry.timestamp),
        response_code: entry.response_code,
        error_category: entry.error_category.map(|c| c.as_str().to_string()),
        succeeded: entry.succeeded,
        detail: entry.detail.clone(),
    }
}

pub(crate) fn audit_from_row(row: &AuditRow) -> Result<AuditEntry, DatabaseError> {
    let stage = Stage::parse(&row.stage)
        .ok_or_else(|| decode_err("stage", format!("unknown stage '{}'", row.stage)))?;
    let error_category = row
        .error_category
        .as_deref()
        .map(|c| {
            ErrorCategory::parse(c)
                .ok_or_else(|| decode_err("error_category", format!("unknown category '{}'", c)))
        })
        .transpose()?;

    Ok(AuditEntry {
        tracking_id: row.tracking_id.clone(),
        stage,
        attempt: row.attempt,
        idempotency_key: row.idempotency_key.clone(),
        timestamp: decode_time(&row.timestamp, "timestamp")?,
        response_code: row.response_code,
        error_category,
        succeeded: row.succeeded,
        detail: row.detail.clone(),
    })
}
