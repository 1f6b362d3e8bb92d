use std::future::Future;
use std::sync::Arc;

use futures_util::stream::{self, StreamExt};
use tracing::{info_span, Instrument};
use uuid::Uuid;

use crate::adapters::{AdapterError, ServiceSet};
use crate::catalog::{
    AsrResult, CatalogProcessingRecord, ErrorCategory, ErrorDetails, QueueMessage, RecordOutcome,
    Stage, StageStatus, TransitionError, VisionResult,
};
use crate::error::StoreError;
use crate::events::{EventSink, LifecycleEvent};
use crate::extract::AttributeExtractor;
use crate::sanitize;
use crate::store::{AuditEntry, Lease, RecordStore, StatusSnapshot};
use crate::submission::{SubmissionManager, SubmissionOutcome};

use super::config::PipelineConfig;
use super::context::{EntryContext, EntryOutcome, EntryReport};
use super::error::PipelineError;

/// Drives records through ASR, vision, extraction, mapping and submission.
///
/// All state lives in the [`RecordStore`]; an `Orchestrator` can be shared by
/// any number of concurrent callers. At most one of them makes progress on a
/// given record at a time, because every run first takes the record's lease.
pub struct Orchestrator {
    config: PipelineConfig,
    store: RecordStore,
    services: ServiceSet,
    extractor: AttributeExtractor,
    submitter: SubmissionManager,
    events: Arc<dyn EventSink>,
}

impl Orchestrator {
    pub fn new(
        config: PipelineConfig,
        store: RecordStore,
        services: ServiceSet,
        events: Arc<dyn EventSink>,
    ) -> Self {
        let extractor = AttributeExtractor::new(
            services.generator.clone(),
            services.cultural.clone(),
            &config.extractor,
        );
        let submitter = SubmissionManager::new(
            store.clone(),
            Arc::clone(&services.gateway),
            config.retry.clone(),
        );

        Self {
            config,
            store,
            services,
            extractor,
            submitter,
            events,
        }
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    pub fn get_status(&self, tracking_id: &str) -> Result<Option<StatusSnapshot>, PipelineError> {
        Ok(self.store.get_status(tracking_id)?)
    }

    /// Operator action: reopens the failed or skipped stages of a terminal
    /// record. The next [`Orchestrator::process_record`] call resumes it.
    pub fn retry_from_failure(&self, tracking_id: &str) -> Result<Vec<Stage>, PipelineError> {
        let operator = format!("operator-{}", Uuid::new_v4());
        Ok(self.store.retry_from_failure(tracking_id, &operator)?)
    }

    /// Validates a queue message, creates its record if needed and processes
    /// it. Safe to call concurrently and repeatedly for the same message.
    pub async fn process_entry(&self, message: &QueueMessage) -> Result<EntryReport, PipelineError> {
        message.validate(&self.config.supported_languages)?;
        self.store.create_if_absent(message)?;
        self.process_record(&message.tracking_id).await
    }

    /// Processes several messages with bounded parallelism. Each record is
    /// still driven by a single future, so per-record stage order holds.
    pub async fn process_batch(
        &self,
        messages: Vec<QueueMessage>,
        parallelism: usize,
    ) -> Vec<(String, Result<EntryReport, PipelineError>)> {
        stream::iter(messages)
            .map(|message| async move {
                let result = self.process_entry(&message).await;
                (message.tracking_id, result)
            })
            .buffer_unordered(parallelism.max(1))
            .collect()
            .await
    }

    /// Resumes a record from its last settled stage.
    pub async fn process_record(&self, tracking_id: &str) -> Result<EntryReport, PipelineError> {
        let owner = format!("{}-{}", self.config.owner_prefix, Uuid::new_v4());
        let Some(lease) = self.store.acquire_lease(tracking_id, &owner)? else {
            log::debug!("Record {} is leased by another worker", tracking_id);
            return Ok(EntryReport::new(tracking_id, EntryOutcome::Busy));
        };

        let record = self
            .store
            .load(tracking_id)?
            .ok_or_else(|| StoreError::NotFound(tracking_id.to_string()))?;
        if record.outcome.is_terminal() {
            self.release(&lease);
            return Ok(EntryReport::new(
                tracking_id,
                EntryOutcome::AlreadyFinished(record.outcome),
            ));
        }

        let span = info_span!(
            "process_entry",
            tracking_id = %tracking_id,
            priority = record.priority.as_str(),
            photo = %sanitize::redact_optional(record.media.photo_ref.as_deref()),
            audio = %sanitize::redact_optional(record.media.audio_ref.as_deref()),
        );
        let mut ctx = EntryContext::new(lease, record);
        let result = self.drive(&mut ctx).instrument(span).await;

        match result {
            Ok(()) => {
                self.release(&ctx.lease);
                log::info!(
                    "Record {} finished as {}{}",
                    tracking_id,
                    ctx.record.outcome,
                    if ctx.record.needs_manual_review {
                        " (manual review)"
                    } else {
                        ""
                    }
                );
                Ok(EntryReport::finished(&ctx.record))
            }
            Err(e) if e.is_lease_lost() => {
                log::warn!(
                    "Lease on record {} expired mid-run; in-flight stage result discarded",
                    tracking_id
                );
                Ok(EntryReport::new(tracking_id, EntryOutcome::LeaseLost))
            }
            Err(e) => {
                log::error!("Processing record {} failed: {}", tracking_id, e);
                self.release(&ctx.lease);
                Err(e)
            }
        }
    }

    async fn drive(&self, ctx: &mut EntryContext) -> Result<(), PipelineError> {
        if ctx.record.outcome != RecordOutcome::InProgress {
            let (_, record) = self.store.transition(&ctx.lease, |rec| {
                rec.outcome = RecordOutcome::InProgress;
                Ok(())
            })?;
            ctx.record = record;
        }

        // ASR and vision are independent and run side by side.
        ctx.lease = self.store.renew_lease(&ctx.lease)?;
        {
            let lease = &ctx.lease;
            let record = &ctx.record;
            let language = record.language_hint;
            let asr = self
                .run_media_stage(
                    lease,
                    record,
                    Stage::Asr,
                    record.media.audio_ref.as_deref(),
                    |audio| self.services.transcription.transcribe(audio, language),
                    complete_asr,
                )
                .instrument(info_span!("stage", name = Stage::Asr.as_str()));
            let vision = self
                .run_media_stage(
                    lease,
                    record,
                    Stage::Vision,
                    record.media.photo_ref.as_deref(),
                    |photo| self.services.vision.analyze(photo),
                    complete_vision,
                )
                .instrument(info_span!("stage", name = Stage::Vision.as_str()));
            let (asr, vision) = tokio::join!(asr, vision);
            asr?;
            vision?;
        }
        ctx.record = self.reload(&ctx.lease)?;

        ctx.lease = self.store.renew_lease(&ctx.lease)?;
        self.step_extract(ctx)
            .instrument(info_span!("stage", name = Stage::Extraction.as_str()))
            .await?;

        ctx.lease = self.store.renew_lease(&ctx.lease)?;
        {
            let _stage = info_span!("stage", name = Stage::Mapping.as_str()).entered();
            self.step_map(ctx)?;
        }
        if ctx.record.outcome.is_terminal() {
            return Ok(());
        }

        ctx.lease = self.store.renew_lease(&ctx.lease)?;
        self.step_submit(ctx)
            .instrument(info_span!("stage", name = Stage::Submission.as_str()))
            .await
    }

    // ─── Media stages ───

    /// Runs ASR or vision with bounded in-run retries. Any failure that
    /// survives the retries skips the stage; the record carries on without
    /// that input.
    async fn run_media_stage<'a, T, F, Fut>(
        &self,
        lease: &Lease,
        record: &CatalogProcessingRecord,
        stage: Stage,
        media_ref: Option<&'a str>,
        call: F,
        complete: fn(&mut CatalogProcessingRecord, T) -> Result<(), TransitionError>,
    ) -> Result<(), PipelineError>
    where
        T: Clone,
        F: Fn(&'a str) -> Fut,
        Fut: Future<Output = Result<T, AdapterError>>,
    {
        if record.stage_status(stage).is_settled() {
            return Ok(());
        }

        let Some(media_ref) = media_ref else {
            log::debug!("Record {} has no media for {}", lease.tracking_id, stage);
            let (_, rec) = self
                .store
                .transition(lease, |rec| Ok(rec.skip_stage(stage)?))?;
            self.emit_stage(&rec, stage);
            return Ok(());
        };

        let mut tries = 0u32;
        loop {
            tries += 1;
            let (attempt, _) = self.store.transition(lease, |rec| {
                if rec.stage_status(stage) == StageStatus::Failed {
                    rec.retry_stage(stage)?;
                }
                rec.begin_stage(stage)?;
                Ok(rec.stage_attempts(stage))
            })?;

            let error = match call(media_ref).await {
                Ok(result) => {
                    let (_, rec) = self
                        .store
                        .transition(lease, |rec| Ok(complete(rec, result.clone())?))?;
                    self.emit_stage(&rec, stage);
                    return Ok(());
                }
                Err(error) => error,
            };

            let details =
                ErrorDetails::new(stage, error.category).with_diagnostic(error.message.clone());
            self.store
                .transition(lease, |rec| Ok(rec.fail_stage(stage, details.clone())?))?;
            self.audit_failure(lease, stage, attempt, &error, &error.message)?;

            if error.is_retryable() && tries < self.config.stage_max_attempts {
                log::info!(
                    "{} failed for record {} ({}), retrying",
                    stage,
                    lease.tracking_id,
                    error.category
                );
                self.store
                    .transition(lease, |rec| Ok(rec.retry_stage(stage)?))?;
                tokio::time::sleep(self.config.retry.delay_for_attempt(tries)).await;
                continue;
            }

            log::warn!(
                "{} unavailable for record {} ({}), continuing without it",
                stage,
                lease.tracking_id,
                error.category
            );
            let (_, rec) = self
                .store
                .transition(lease, |rec| Ok(rec.skip_stage(stage)?))?;
            self.emit_stage(&rec, stage);
            return Ok(());
        }
    }

    // ─── Extraction ───

    async fn step_extract(&self, ctx: &mut EntryContext) -> Result<(), PipelineError> {
        if ctx.record.extraction.status == StageStatus::Completed {
            return Ok(());
        }

        let (attempt, record) = self.store.transition(&ctx.lease, |rec| {
            reopen_and_begin(rec, Stage::Extraction)?;
            Ok(rec.extraction.attempts)
        })?;

        let asr = completed_result(&record.asr.status, record.asr.result.as_ref());
        let vision = completed_result(&record.vision.status, record.vision.result.as_ref());
        let extraction = self
            .extractor
            .extract(asr, vision, record.language_hint)
            .await;

        for degraded in &extraction.degraded {
            let detail = format!("{}: {}", degraded.service, degraded.error.message);
            self.audit_failure(
                &ctx.lease,
                Stage::Extraction,
                attempt,
                &degraded.error,
                &detail,
            )?;
        }

        let attributes = extraction.attributes;
        let (_, record) = self.store.transition(&ctx.lease, |rec| {
            Ok(rec
                .extraction
                .complete(Stage::Extraction, attributes.clone())?)
        })?;
        self.emit_stage(&record, Stage::Extraction);
        ctx.record = record;
        Ok(())
    }

    // ─── Mapping ───

    /// Maps the extracted attributes. A payload that cannot be made
    /// compliant fails the record for manual review.
    fn step_map(&self, ctx: &mut EntryContext) -> Result<(), PipelineError> {
        if ctx.record.mapping.status == StageStatus::Completed {
            ctx.mapping = Some(ctx.record.mapping.result.clone().ok_or_else(|| {
                PipelineError::MissingStageResult {
                    tracking_id: ctx.record.tracking_id.clone(),
                    stage: Stage::Mapping.as_str(),
                }
            })?);
            return Ok(());
        }

        let (attempt, record) = self.store.transition(&ctx.lease, |rec| {
            reopen_and_begin(rec, Stage::Mapping)?;
            Ok(rec.mapping.attempts)
        })?;
        let attributes = record.extraction.result.as_ref().ok_or_else(|| {
            PipelineError::MissingStageResult {
                tracking_id: record.tracking_id.clone(),
                stage: Stage::Extraction.as_str(),
            }
        })?;

        match self.config.mapper.map(attributes, record.listing_photo()) {
            Ok(mapping) => {
                if mapping.auto_corrected {
                    log::info!("Record {} needed auto-correction", record.tracking_id);
                }
                let (_, record) = self.store.transition(&ctx.lease, |rec| {
                    rec.mapping.complete(Stage::Mapping, mapping.clone())?;
                    rec.idempotency_key = Some(mapping.idempotency_key.clone());
                    Ok(())
                })?;
                self.emit_stage(&record, Stage::Mapping);
                ctx.record = record;
                ctx.mapping = Some(mapping);
                Ok(())
            }
            Err(e) => {
                log::warn!("Record {} cannot be listed: {}", record.tracking_id, e);
                let details = ErrorDetails::new(Stage::Mapping, ErrorCategory::SchemaRejected)
                    .with_diagnostic(e.to_string());
                let (_, record) = self.store.transition(&ctx.lease, |rec| {
                    Ok(rec.fail_stage(Stage::Mapping, details.clone())?)
                })?;
                self.emit_stage(&record, Stage::Mapping);
                self.audit(AuditEntry {
                    tracking_id: record.tracking_id.clone(),
                    stage: Stage::Mapping,
                    attempt,
                    idempotency_key: None,
                    timestamp: self.store.now(),
                    response_code: None,
                    error_category: Some(ErrorCategory::SchemaRejected),
                    succeeded: false,
                    detail: Some(e.to_string()),
                })?;

                ctx.record = self.finish(&ctx.lease, RecordOutcome::Failed, Some(details), |rec| {
                    Ok(rec.skip_pending_stages()?)
                })?;
                Ok(())
            }
        }
    }

    // ─── Submission ───

    async fn step_submit(&self, ctx: &mut EntryContext) -> Result<(), PipelineError> {
        let Some(mapping) = ctx.mapping.clone() else {
            return Err(PipelineError::MissingStageResult {
                tracking_id: ctx.record.tracking_id.clone(),
                stage: Stage::Mapping.as_str(),
            });
        };

        if ctx.record.submission.status == StageStatus::Completed {
            // Published before a crash, but never marked terminal.
            ctx.record = self.finish(&ctx.lease, RecordOutcome::Completed, None, |_| Ok(()))?;
            return Ok(());
        }

        self.store.transition(&ctx.lease, |rec| {
            reopen_and_begin(rec, Stage::Submission)?;
            Ok(())
        })?;

        let (outcome, lease) = self.submitter.submit(&ctx.lease, &mapping).await?;
        ctx.lease = lease;

        ctx.record = match outcome {
            SubmissionOutcome::Accepted(receipt) => {
                let (_, record) = self.store.transition(&ctx.lease, |rec| {
                    rec.submission.complete(Stage::Submission, receipt.clone())?;
                    if rec.ondc_catalog_id.is_none() {
                        rec.ondc_catalog_id = Some(receipt.catalog_id.clone());
                    }
                    rec.version = receipt.version;
                    Ok(())
                })?;
                self.emit_stage(&record, Stage::Submission);
                self.finish(&ctx.lease, RecordOutcome::Completed, None, |_| Ok(()))?
            }
            SubmissionOutcome::Rejected { error, attempts } => {
                let details = ErrorDetails::new(Stage::Submission, error.category)
                    .with_diagnostic(format!("attempt {}: {}", attempts, error.message));
                let (_, record) = self.store.transition(&ctx.lease, |rec| {
                    Ok(rec.fail_stage(Stage::Submission, details.clone())?)
                })?;
                self.emit_stage(&record, Stage::Submission);
                self.finish(&ctx.lease, RecordOutcome::Failed, Some(details), |_| Ok(()))?
            }
            SubmissionOutcome::Exhausted {
                last_error,
                attempts,
            } => {
                let details =
                    ErrorDetails::new(Stage::Submission, ErrorCategory::RetriesExhausted)
                        .with_diagnostic(format!(
                            "{} attempts, last {}: {}",
                            attempts, last_error.category, last_error.message
                        ));
                self.store.transition(&ctx.lease, |rec| {
                    Ok(rec.fail_stage(Stage::Submission, details.clone())?)
                })?;
                let (_, record) = self.store.transition(&ctx.lease, |rec| {
                    Ok(rec.skip_stage(Stage::Submission)?)
                })?;
                self.emit_stage(&record, Stage::Submission);
                self.finish(&ctx.lease, RecordOutcome::Skipped, Some(details), |_| Ok(()))?
            }
        };
        Ok(())
    }

    // ─── Helpers ───

    /// Marks the record terminal and emits the final event.
    fn finish<F>(
        &self,
        lease: &Lease,
        outcome: RecordOutcome,
        error: Option<ErrorDetails>,
        mut before: F,
    ) -> Result<CatalogProcessingRecord, PipelineError>
    where
        F: FnMut(&mut CatalogProcessingRecord) -> Result<(), StoreError>,
    {
        let now = self.store.now();
        let (_, record) = self.store.transition(lease, |rec| {
            before(rec)?;
            rec.finish(outcome, error.clone(), now);
            Ok(())
        })?;
        self.events.emit(LifecycleEvent::finished(&record));
        Ok(record)
    }

    fn reload(&self, lease: &Lease) -> Result<CatalogProcessingRecord, PipelineError> {
        Ok(self
            .store
            .load(&lease.tracking_id)?
            .ok_or_else(|| StoreError::NotFound(lease.tracking_id.clone()))?)
    }

    fn emit_stage(&self, record: &CatalogProcessingRecord, stage: Stage) {
        self.events.emit(LifecycleEvent::stage(
            &record.tracking_id,
            stage,
            record.stage_status(stage),
            record.stage_error(stage),
            record.updated_at,
        ));
    }

    fn audit_failure(
        &self,
        lease: &Lease,
        stage: Stage,
        attempt: u32,
        error: &AdapterError,
        detail: &str,
    ) -> Result<(), PipelineError> {
        self.audit(AuditEntry {
            tracking_id: lease.tracking_id.clone(),
            stage,
            attempt,
            idempotency_key: None,
            timestamp: self.store.now(),
            response_code: error.response_code,
            error_category: Some(error.category),
            succeeded: false,
            detail: Some(detail.to_string()),
        })
    }

    fn audit(&self, entry: AuditEntry) -> Result<(), PipelineError> {
        Ok(self.store.append_audit(&entry)?)
    }

    fn release(&self, lease: &Lease) {
        match self.store.release_lease(lease) {
            Ok(true) => {}
            Ok(false) => log::debug!("Lease on {} was already taken over", lease.tracking_id),
            Err(e) => log::warn!("Failed to release lease on {}: {}", lease.tracking_id, e),
        }
    }
}

fn complete_asr(rec: &mut CatalogProcessingRecord, result: AsrResult) -> Result<(), TransitionError> {
    rec.asr.complete(Stage::Asr, result)
}

fn complete_vision(
    rec: &mut CatalogProcessingRecord,
    result: VisionResult,
) -> Result<(), TransitionError> {
    rec.vision.complete(Stage::Vision, result)
}

/// Downstream stages found failed or skipped are reopened before they start.
fn reopen_and_begin(rec: &mut CatalogProcessingRecord, stage: Stage) -> Result<(), TransitionError> {
    if matches!(
        rec.stage_status(stage),
        StageStatus::Failed | StageStatus::Skipped
    ) {
        rec.retry_stage(stage)?;
    }
    rec.begin_stage(stage)
}

fn completed_result<'a, T>(status: &StageStatus, result: Option<&'a T>) -> Option<&'a T> {
    if *status == StageStatus::Completed {
        result
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{
        BreakerSettings, CulturalKnowledge, DescriptionGenerator, GatewayResponse, Guarded,
        MarketplaceGateway, SubmissionRequest, TranscriptionService, VisionService,
    };
    use crate::catalog::{
        CulturallySignificantItem, ExtractedAttributes, LanguageCode, Priority,
    };
    use crate::db::Database;
    use crate::events::LifecycleBroadcaster;
    use crate::submission::RetryPolicy;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    struct Asr(Result<AsrResult, AdapterError>);

    #[async_trait]
    impl TranscriptionService for Asr {
        async fn transcribe(
            &self,
            _audio_ref: &str,
            _language: LanguageCode,
        ) -> Result<AsrResult, AdapterError> {
            self.0.clone()
        }
    }

    struct Vision {
        calls: AtomicU32,
        reply: Result<VisionResult, AdapterError>,
    }

    #[async_trait]
    impl VisionService for Vision {
        async fn analyze(&self, _photo_ref: &str) -> Result<VisionResult, AdapterError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.reply.clone()
        }
    }

    struct Gateway {
        calls: AtomicU32,
    }

    #[async_trait]
    impl MarketplaceGateway for Gateway {
        async fn submit(&self, _request: &SubmissionRequest) -> Result<GatewayResponse, AdapterError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(GatewayResponse {
                catalog_id: "ONDC-1".to_string(),
                response_code: 201,
            })
        }
    }

    struct NoGenerator;

    #[async_trait]
    impl DescriptionGenerator for NoGenerator {
        async fn generate(
            &self,
            _transcription: &str,
            _vision: Option<&VisionResult>,
            _language: LanguageCode,
        ) -> Result<ExtractedAttributes, AdapterError> {
            Err(AdapterError::network("down"))
        }
    }

    struct NoCulture;

    #[async_trait]
    impl CulturalKnowledge for NoCulture {
        async fn lookup(
            &self,
            _transcription: &str,
            _language: LanguageCode,
        ) -> Result<Vec<CulturallySignificantItem>, AdapterError> {
            Ok(Vec::new())
        }
    }

    fn guarded<S: ?Sized>(name: &str, inner: Arc<S>) -> Arc<Guarded<S>> {
        Arc::new(Guarded::new(
            name,
            inner,
            Duration::from_secs(5),
            BreakerSettings::default(),
        ))
    }

    fn saree_asr() -> AsrResult {
        AsrResult {
            transcription: "yeh lal banarasi silk saree hai, daam 2500 rupaye".to_string(),
            detected_language: "hi".to_string(),
            confidence: 0.9,
        }
    }

    fn message(id: &str) -> QueueMessage {
        QueueMessage {
            tracking_id: id.to_string(),
            tenant_id: "tenant".to_string(),
            artisan_id: "artisan".to_string(),
            photo_ref: Some("https://media.example.com/p.jpg".to_string()),
            audio_ref: Some("https://media.example.com/a.ogg".to_string()),
            language_hint: LanguageCode::Hindi,
            priority: Priority::Normal,
        }
    }

    fn orchestrator(
        asr: Result<AsrResult, AdapterError>,
        vision: Arc<Vision>,
        gateway: Arc<Gateway>,
        events: Arc<LifecycleBroadcaster>,
    ) -> Orchestrator {
        let store = RecordStore::new(Database::open_in_memory().unwrap(), Duration::from_secs(300));
        let transcription: Arc<dyn TranscriptionService> = Arc::new(Asr(asr));
        let vision: Arc<dyn VisionService> = vision;
        let gateway: Arc<dyn MarketplaceGateway> = gateway;
        let generator: Arc<dyn DescriptionGenerator> = Arc::new(NoGenerator);
        let cultural: Arc<dyn CulturalKnowledge> = Arc::new(NoCulture);
        let services = ServiceSet {
            transcription: guarded("asr", transcription),
            vision: guarded("vision", vision),
            generator: Some(guarded("generator", generator)),
            cultural: Some(guarded("cultural", cultural)),
            gateway: guarded("gateway", gateway),
        };
        let config = PipelineConfig {
            retry: RetryPolicy {
                initial_backoff: Duration::from_millis(1),
                max_backoff: Duration::from_millis(2),
                ..Default::default()
            },
            ..Default::default()
        };
        Orchestrator::new(config, store, services, events)
    }

    fn vision_ok() -> Arc<Vision> {
        Arc::new(Vision {
            calls: AtomicU32::new(0),
            reply: Ok(VisionResult {
                category: Some("saree".to_string()),
                colors: vec!["gold".to_string()],
                materials: vec!["cotton".to_string()],
                confidence: 0.7,
                enhanced_photo_ref: Some("https://media.example.com/p-enhanced.jpg".to_string()),
            }),
        })
    }

    fn gateway() -> Arc<Gateway> {
        Arc::new(Gateway {
            calls: AtomicU32::new(0),
        })
    }

    #[tokio::test]
    async fn test_happy_path_completes_and_emits_events() {
        let events = Arc::new(LifecycleBroadcaster::new(64));
        let mut rx = events.subscribe();
        let gateway = gateway();
        let orch = orchestrator(Ok(saree_asr()), vision_ok(), gateway.clone(), events);

        let report = orch.process_entry(&message("r1")).await.unwrap();
        assert_eq!(
            report.outcome,
            EntryOutcome::Finished {
                outcome: RecordOutcome::Completed,
                catalog_id: Some("ONDC-1".to_string()),
            }
        );
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 1);

        let rec = orch.store().load("r1").unwrap().unwrap();
        for stage in Stage::ALL {
            assert_eq!(rec.stage_status(stage), StageStatus::Completed);
        }
        let item = &rec.mapping.result.as_ref().unwrap().item;
        assert_eq!(
            item.descriptor.images,
            vec!["https://media.example.com/p-enhanced.jpg"]
        );
        // Voice wins over vision for the material.
        assert_eq!(item.tags.get("material").map(String::as_str), Some("silk"));

        let mut stage_events = 0;
        let mut final_events = 0;
        while let Ok(event) = rx.try_recv() {
            if event.is_final {
                final_events += 1;
                assert_eq!(event.outcome, RecordOutcome::Completed);
            } else {
                stage_events += 1;
            }
        }
        assert_eq!(stage_events, 5);
        assert_eq!(final_events, 1);
    }

    #[tokio::test]
    async fn test_asr_failure_degrades_to_vision_only() {
        let events = Arc::new(LifecycleBroadcaster::default());
        let orch = orchestrator(
            Err(AdapterError::new(ErrorCategory::MalformedResponse, "bad audio")),
            vision_ok(),
            gateway(),
            events,
        );

        orch.process_entry(&message("r2")).await.unwrap();

        let rec = orch.store().load("r2").unwrap().unwrap();
        assert_eq!(rec.asr.status, StageStatus::Skipped);
        assert_eq!(rec.vision.status, StageStatus::Completed);
        // No price without the voice note, so the item cannot be listed.
        assert_eq!(rec.outcome, RecordOutcome::Failed);
        assert!(rec.needs_manual_review);
        assert_eq!(rec.submission.status, StageStatus::Skipped);
    }

    #[tokio::test]
    async fn test_vision_retried_then_skipped() {
        let vision = Arc::new(Vision {
            calls: AtomicU32::new(0),
            reply: Err(AdapterError::new(ErrorCategory::ServerError, "500")),
        });
        let events = Arc::new(LifecycleBroadcaster::default());
        let orch = orchestrator(Ok(saree_asr()), vision.clone(), gateway(), events);

        let report = orch.process_entry(&message("r3")).await.unwrap();
        assert!(matches!(
            report.outcome,
            EntryOutcome::Finished {
                outcome: RecordOutcome::Completed,
                ..
            }
        ));
        assert_eq!(vision.calls.load(Ordering::SeqCst), 2);

        let rec = orch.store().load("r3").unwrap().unwrap();
        assert_eq!(rec.vision.status, StageStatus::Skipped);
        assert_eq!(rec.vision.attempts, 2);
        assert_eq!(
            rec.mapping.result.unwrap().item.descriptor.images,
            vec!["https://media.example.com/p.jpg"]
        );
        let audited = orch
            .store()
            .audit_trail("r3")
            .unwrap()
            .into_iter()
            .filter(|e| e.stage == Stage::Vision)
            .count();
        assert_eq!(audited, 2);
    }

    #[tokio::test]
    async fn test_terminal_record_is_not_reprocessed() {
        let gateway = gateway();
        let orch = orchestrator(
            Ok(saree_asr()),
            vision_ok(),
            gateway.clone(),
            Arc::new(LifecycleBroadcaster::default()),
        );

        orch.process_entry(&message("r4")).await.unwrap();
        let again = orch.process_entry(&message("r4")).await.unwrap();
        assert_eq!(
            again.outcome,
            EntryOutcome::AlreadyFinished(RecordOutcome::Completed)
        );
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_invalid_message_creates_no_record() {
        let orch = orchestrator(
            Ok(saree_asr()),
            vision_ok(),
            gateway(),
            Arc::new(LifecycleBroadcaster::default()),
        );
        let mut msg = message("r5");
        msg.photo_ref = None;
        msg.audio_ref = None;

        let err = orch.process_entry(&msg).await.unwrap_err();
        assert!(matches!(err, PipelineError::InvalidMessage(_)));
        assert!(orch.get_status("r5").unwrap().is_none());
    }
}
