use std::sync::Arc;

use crate::adapters::{
    AdapterError, GatewayResponse, Guarded, MarketplaceGateway, SubmissionRequest,
};
use crate::catalog::{ErrorCategory, ErrorDetails, MappingResult, Stage, SubmissionReceipt};
use crate::error::StoreError;
use crate::store::{AuditEntry, Lease, RecordStore};

use super::retry::RetryPolicy;

/// How a submission run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmissionOutcome {
    Accepted(SubmissionReceipt),
    /// A permanent error. Not retried.
    Rejected { error: AdapterError, attempts: u32 },
    /// Every allowed attempt failed with a transient error.
    Exhausted { last_error: AdapterError, attempts: u32 },
}

impl SubmissionOutcome {
    /// Category recorded on the record when the run did not succeed.
    pub fn failure_category(&self) -> Option<ErrorCategory> {
        match self {
            SubmissionOutcome::Accepted(_) => None,
            SubmissionOutcome::Rejected { error, .. } => Some(error.category),
            SubmissionOutcome::Exhausted { .. } => Some(ErrorCategory::RetriesExhausted),
        }
    }
}

/// Publishes mapped items to the marketplace.
///
/// Decides create vs update from the idempotency key, retries transient
/// failures with the same key, and audits every attempt before deciding
/// what to do next.
pub struct SubmissionManager {
    store: RecordStore,
    gateway: Arc<Guarded<dyn MarketplaceGateway>>,
    policy: RetryPolicy,
}

impl SubmissionManager {
    pub fn new(
        store: RecordStore,
        gateway: Arc<Guarded<dyn MarketplaceGateway>>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            store,
            gateway,
            policy,
        }
    }

    /// Builds the gateway request for `mapping`: an update of the latest
    /// listing with the same key if one exists, else a create.
    pub fn prepare(&self, mapping: &MappingResult) -> Result<SubmissionRequest, StoreError> {
        let existing = self.store.find_existing_listing(&mapping.idempotency_key)?;
        Ok(match existing {
            Some(listing) => {
                log::info!(
                    "Listing {} (from record {}) already carries key {}, submitting as update v{}",
                    listing.catalog_id,
                    listing.tracking_id,
                    short_key(&mapping.idempotency_key),
                    listing.version + 1
                );
                SubmissionRequest {
                    item: mapping.item.clone(),
                    idempotency_key: mapping.idempotency_key.clone(),
                    is_update: true,
                    existing_catalog_id: Some(listing.catalog_id),
                    version: listing.version + 1,
                }
            }
            None => SubmissionRequest {
                item: mapping.item.clone(),
                idempotency_key: mapping.idempotency_key.clone(),
                is_update: false,
                existing_catalog_id: None,
                version: 1,
            },
        })
    }

    /// Runs the submission loop while holding `lease`. The submission stage
    /// must already be in progress.
    ///
    /// The lease is renewed before every attempt; losing it aborts the run
    /// with [`StoreError::LeaseLost`] and nothing further is written. A
    /// transient failure is stored on the stage (`Failed`, then back to
    /// `Pending`) before the next attempt starts it again.
    /// Returns the outcome and the latest lease.
    pub async fn submit(
        &self,
        lease: &Lease,
        mapping: &MappingResult,
    ) -> Result<(SubmissionOutcome, Lease), StoreError> {
        let request = self.prepare(mapping)?;
        let prior = self
            .store
            .audited_attempts(&lease.tracking_id, Stage::Submission)?;
        let mut lease = lease.clone();
        let mut attempts = 0u32;

        loop {
            attempts += 1;
            lease = self.store.renew_lease(&lease)?;
            if attempts > 1 {
                self.store
                    .transition(&lease, |rec| Ok(rec.begin_stage(Stage::Submission)?))?;
            }

            let result = self
                .gateway
                .submit(&request)
                .await
                .and_then(|response| check_catalog_id(&request, response));
            self.audit(&lease, &request, prior + attempts, &result)?;

            match result {
                Ok(response) => {
                    log::info!(
                        "Record {} published as {} (HTTP {}, attempt {})",
                        lease.tracking_id,
                        response.catalog_id,
                        response.response_code,
                        attempts
                    );
                    let catalog_id = match &request.existing_catalog_id {
                        Some(existing) if request.is_update => existing.clone(),
                        _ => response.catalog_id,
                    };
                    let receipt = SubmissionReceipt {
                        catalog_id,
                        response_code: response.response_code,
                        is_update: request.is_update,
                        version: request.version,
                        attempts,
                    };
                    return Ok((SubmissionOutcome::Accepted(receipt), lease));
                }
                Err(error) if !error.is_retryable() => {
                    log::warn!(
                        "Submission of record {} rejected permanently: {}",
                        lease.tracking_id,
                        error.category
                    );
                    return Ok((SubmissionOutcome::Rejected { error, attempts }, lease));
                }
                Err(error) => {
                    if !self.policy.allows_another(attempts) {
                        log::warn!(
                            "Submission of record {} gave up after {} attempts: {}",
                            lease.tracking_id,
                            attempts,
                            error.category
                        );
                        return Ok((
                            SubmissionOutcome::Exhausted {
                                last_error: error,
                                attempts,
                            },
                            lease,
                        ));
                    }
                    let details = ErrorDetails::new(Stage::Submission, error.category)
                        .with_diagnostic(format!("attempt {}: {}", attempts, error.message));
                    self.store.transition(&lease, |rec| {
                        rec.fail_stage(Stage::Submission, details.clone())?;
                        Ok(())
                    })?;
                    self.store
                        .transition(&lease, |rec| Ok(rec.retry_stage(Stage::Submission)?))?;

                    let delay = self.policy.delay_for_attempt(attempts);
                    log::debug!(
                        "Submission of record {} failed ({}), retrying in {:?}",
                        lease.tracking_id,
                        error.category,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    fn audit(
        &self,
        lease: &Lease,
        request: &SubmissionRequest,
        attempt: u32,
        result: &Result<GatewayResponse, AdapterError>,
    ) -> Result<(), StoreError> {
        let entry = match result {
            Ok(response) => AuditEntry {
                tracking_id: lease.tracking_id.clone(),
                stage: Stage::Submission,
                attempt,
                idempotency_key: Some(request.idempotency_key.clone()),
                timestamp: self.store.now(),
                response_code: Some(response.response_code),
                error_category: None,
                succeeded: true,
                detail: Some(format!("catalog id {}", response.catalog_id)),
            },
            Err(error) => AuditEntry {
                tracking_id: lease.tracking_id.clone(),
                stage: Stage::Submission,
                attempt,
                idempotency_key: Some(request.idempotency_key.clone()),
                timestamp: self.store.now(),
                response_code: error.response_code,
                error_category: Some(error.category),
                succeeded: false,
                detail: Some(error.message.clone()),
            },
        };
        self.store.append_audit(&entry)
    }
}

/// An update must come back under the listing id it was sent for.
fn check_catalog_id(
    request: &SubmissionRequest,
    response: GatewayResponse,
) -> Result<GatewayResponse, AdapterError> {
    match &request.existing_catalog_id {
        Some(existing) if request.is_update && *existing != response.catalog_id => {
            Err(AdapterError::malformed_response(format!(
                "update of {} answered with catalog id {}",
                existing, response.catalog_id
            ))
            .with_response_code(response.response_code))
        }
        _ => Ok(response),
    }
}

fn short_key(key: &str) -> &str {
    key.get(..12).unwrap_or(key)
}
