//! Record store: the single source of truth for stage status.
//!
//! Every write to a record goes through [`RecordStore::transition`], which
//! loads the record, applies a closure and writes the result back with a
//! compare-and-swap on the record's revision. The swap is also conditioned
//! on the caller holding an unexpired lease, so a worker whose lease ran out
//! mid-stage cannot overwrite the work of the worker that took over.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::{
    CatalogProcessingRecord, ErrorCategory, ErrorDetails, QueueMessage, RecordOutcome, Stage,
    StageStatus,
};
use crate::db::{audit_repo, record_repo, Database};
use crate::error::StoreError;
use crate::time::{format_timestamp, Clock, SystemClock};

mod convert;

use convert::{audit_from_row, audit_to_row, record_from_row, record_to_row};

/// Swap attempts before a transition gives up as contended.
const MAX_CAS_ATTEMPTS: u32 = 5;

/// A held per-record lease.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lease {
    pub tracking_id: String,
    pub owner: String,
    pub expires_at: DateTime<Utc>,
}

/// One append-only audit entry: a submission attempt or a stage failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEntry {
    pub tracking_id: String,
    pub stage: Stage,
    pub attempt: u32,
    /// Set for submission attempts only.
    pub idempotency_key: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub response_code: Option<u16>,
    pub error_category: Option<ErrorCategory>,
    pub succeeded: bool,
    /// Internal diagnostic text. Never surfaced in lifecycle events.
    pub detail: Option<String>,
}

/// A listing already published for an idempotency key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExistingListing {
    pub tracking_id: String,
    pub catalog_id: String,
    pub version: u32,
}

/// Answer to a status query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    pub tracking_id: String,
    pub stage: Stage,
    pub stage_status: StageStatus,
    pub outcome: RecordOutcome,
    pub needs_manual_review: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub catalog_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_details: Option<ErrorDetails>,
}

impl StatusSnapshot {
    pub fn of(rec: &CatalogProcessingRecord) -> Self {
        let stage = rec
            .error_details
            .as_ref()
            .map(|e| e.stage)
            .unwrap_or_else(|| rec.current_stage());
        let error_details = rec.error_details.clone().map(|mut e| {
            e.diagnostic = None;
            e
        });
        Self {
            tracking_id: rec.tracking_id.clone(),
            stage,
            stage_status: rec.stage_status(stage),
            outcome: rec.outcome,
            needs_manual_review: rec.needs_manual_review,
            catalog_id: rec.ondc_catalog_id.clone(),
            error_details,
        }
    }
}

/// Cloneable handle over the record and audit tables.
#[derive(Clone)]
pub struct RecordStore {
    db: Database,
    clock: Arc<dyn Clock>,
    lease_ttl: chrono::Duration,
}

impl RecordStore {
    pub fn new(db: Database, lease_ttl: Duration) -> Self {
        Self::with_clock(db, lease_ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(db: Database, lease_ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        let lease_ttl = chrono::Duration::from_std(lease_ttl)
            .unwrap_or_else(|_| chrono::Duration::seconds(300));
        Self {
            db,
            clock,
            lease_ttl,
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Creates the record for a validated message, or returns the existing
    /// one. A redelivered message may still change the language hint while
    /// ASR has not started.
    pub fn create_if_absent(
        &self,
        message: &QueueMessage,
    ) -> Result<CatalogProcessingRecord, StoreError> {
        let now = self.now();
        let fresh = CatalogProcessingRecord::new(message, now);
        let inserted = record_repo::insert_if_absent(&self.db, &record_to_row(&fresh)?)?;

        if inserted {
            log::info!("Created record {}", message.tracking_id);
        } else {
            let changed = record_repo::update_language_hint(
                &self.db,
                &message.tracking_id,
                message.language_hint.as_str(),
                &format_timestamp(now),
            )?;
            if changed {
                log::info!(
                    "Updated language hint of record {} to {}",
                    message.tracking_id,
                    message.language_hint
                );
            }
        }

        self.load(&message.tracking_id)?
            .ok_or_else(|| StoreError::NotFound(message.tracking_id.clone()))
    }

    pub fn load(&self, tracking_id: &str) -> Result<Option<CatalogProcessingRecord>, StoreError> {
        match record_repo::find_by_id(&self.db, tracking_id)? {
            Some(row) => Ok(Some(record_from_row(&row)?)),
            None => Ok(None),
        }
    }

    /// Pure read for collaborators.
    pub fn get_status(&self, tracking_id: &str) -> Result<Option<StatusSnapshot>, StoreError> {
        Ok(self.load(tracking_id)?.map(|rec| StatusSnapshot::of(&rec)))
    }

    /// Takes the record's lease. `None` means another worker holds it.
    pub fn acquire_lease(&self, tracking_id: &str, owner: &str) -> Result<Option<Lease>, StoreError> {
        let now = self.now();
        let expires_at = now + self.lease_ttl;
        let acquired = record_repo::acquire_lease(
            &self.db,
            tracking_id,
            owner,
            &format_timestamp(now),
            &format_timestamp(expires_at),
        )?;

        if !acquired {
            if record_repo::find_by_id(&self.db, tracking_id)?.is_none() {
                return Err(StoreError::NotFound(tracking_id.to_string()));
            }
            return Ok(None);
        }

        Ok(Some(Lease {
            tracking_id: tracking_id.to_string(),
            owner: owner.to_string(),
            expires_at,
        }))
    }

    /// Pushes the lease expiry forward; fails if the lease was lost.
    pub fn renew_lease(&self, lease: &Lease) -> Result<Lease, StoreError> {
        let now = self.now();
        let expires_at = now + self.lease_ttl;
        let renewed = record_repo::renew_lease(
            &self.db,
            &lease.tracking_id,
            &lease.owner,
            &format_timestamp(now),
            &format_timestamp(expires_at),
        )?;
        if !renewed {
            return Err(StoreError::LeaseLost {
                tracking_id: lease.tracking_id.clone(),
                owner: lease.owner.clone(),
            });
        }
        Ok(Lease {
            expires_at,
            ..lease.clone()
        })
    }

    /// Releases the lease. Returns `false` if it had already been taken over.
    pub fn release_lease(&self, lease: &Lease) -> Result<bool, StoreError> {
        Ok(record_repo::release_lease(
            &self.db,
            &lease.tracking_id,
            &lease.owner,
        )?)
    }

    /// Applies `apply` to the current record and persists the result as one
    /// atomic compare-and-swap. On a revision conflict the record is reloaded
    /// and `apply` runs again on the fresh copy. If `apply` fails nothing is
    /// written.
    pub fn transition<T, F>(
        &self,
        lease: &Lease,
        mut apply: F,
    ) -> Result<(T, CatalogProcessingRecord), StoreError>
    where
        F: FnMut(&mut CatalogProcessingRecord) -> Result<T, StoreError>,
    {
        for _ in 0..MAX_CAS_ATTEMPTS {
            let mut rec = self
                .load(&lease.tracking_id)?
                .ok_or_else(|| StoreError::NotFound(lease.tracking_id.clone()))?;

            let now = self.now();
            if !rec.holds_lease(&lease.owner, now) {
                return Err(StoreError::LeaseLost {
                    tracking_id: lease.tracking_id.clone(),
                    owner: lease.owner.clone(),
                });
            }

            let out = apply(&mut rec)?;
            rec.updated_at = now;

            let expected = rec.revision;
            let swapped = record_repo::compare_and_swap(
                &self.db,
                &record_to_row(&rec)?,
                expected,
                &lease.owner,
                &format_timestamp(now),
            )?;
            if swapped {
                rec.revision = expected + 1;
                return Ok((out, rec));
            }
            log::debug!(
                "Revision conflict on record {} at revision {}, retrying",
                lease.tracking_id,
                expected
            );
        }

        Err(StoreError::Contended(lease.tracking_id.clone()))
    }

    /// Operator action: reopen failed/skipped stages so the record can be
    /// processed again. Returns the reopened stages.
    pub fn retry_from_failure(
        &self,
        tracking_id: &str,
        operator: &str,
    ) -> Result<Vec<Stage>, StoreError> {
        let lease = self.acquire_lease(tracking_id, operator)?.ok_or_else(|| {
            StoreError::LeaseLost {
                tracking_id: tracking_id.to_string(),
                owner: operator.to_string(),
            }
        })?;

        let result = self.transition(&lease, |rec| Ok(rec.reopen_for_retry()?));
        self.release_lease(&lease)?;
        let (reopened, _) = result?;

        log::info!(
            "Reopened stages {:?} of record {} for retry",
            reopened,
            tracking_id
        );
        Ok(reopened)
    }

    /// Latest listing published for `idempotency_key`, if any.
    pub fn find_existing_listing(
        &self,
        idempotency_key: &str,
    ) -> Result<Option<ExistingListing>, StoreError> {
        Ok(
            record_repo::find_listing_by_key(&self.db, idempotency_key)?.map(|row| {
                ExistingListing {
                    tracking_id: row.tracking_id,
                    catalog_id: row.ondc_catalog_id,
                    version: row.version,
                }
            }),
        )
    }

    pub fn append_audit(&self, entry: &AuditEntry) -> Result<(), StoreError> {
        audit_repo::append(&self.db, &audit_to_row(entry))?;
        Ok(())
    }

    /// Number of audited attempts for one stage of a record, across runs.
    pub fn audited_attempts(&self, tracking_id: &str, stage: Stage) -> Result<u32, StoreError> {
        let count = audit_repo::count_for_stage(&self.db, tracking_id, stage.as_str())?;
        Ok(u32::try_from(count).unwrap_or(u32::MAX))
    }

    pub fn audit_trail(&self, tracking_id: &str) -> Result<Vec<AuditEntry>, StoreError> {
        audit_repo::list_for_record(&self.db, tracking_id)?
            .iter()
            .map(|row| audit_from_row(row).map_err(StoreError::from))
            .collect()
    }

    /// Tracking ids of unfinished records whose lease expired or was
    /// dropped mid-run, oldest first.
    pub fn resumable(&self, limit: u32) -> Result<Vec<String>, StoreError> {
        Ok(record_repo::find_resumable(
            &self.db,
            &format_timestamp(self.now()),
            limit,
        )?)
    }

    /// Records waiting for manual review, oldest first.
    pub fn manual_review_queue(
        &self,
        limit: u32,
    ) -> Result<Vec<CatalogProcessingRecord>, StoreError> {
        record_repo::list_manual_review(&self.db, limit)?
            .iter()
            .map(|row| record_from_row(row).map_err(StoreError::from))
            .collect()
    }
}
