//! The per-item processing record and its typed stage payloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::attributes::ExtractedAttributes;
use super::failure::ErrorDetails;
use super::item::MarketplaceCatalogItem;
use super::message::{LanguageCode, Priority, QueueMessage};
use super::status::{RecordOutcome, Stage, StageStatus};

/// Rejected stage transition.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Illegal transition for stage {stage}: {from} -> {to}")]
pub struct TransitionError {
    pub stage: &'static str,
    pub from: StageStatus,
    pub to: StageStatus,
}

/// Immutable pointers to the captured media blobs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaRefs {
    pub photo_ref: Option<String>,
    pub audio_ref: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AsrResult {
    pub transcription: String,
    pub detected_language: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisionResult {
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub colors: Vec<String>,
    #[serde(default)]
    pub materials: Vec<String>,
    pub confidence: f64,
    /// Enhanced photo produced by the vision service, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enhanced_photo_ref: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingResult {
    pub item: MarketplaceCatalogItem,
    pub idempotency_key: String,
    /// Whether the auto-correction pass had to run.
    pub auto_corrected: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionReceipt {
    pub catalog_id: String,
    pub response_code: u16,
    pub is_update: bool,
    pub version: u32,
    pub attempts: u32,
}

/// Status, attempt count, payload and last error of one stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageState<T> {
    pub status: StageStatus,
    pub attempts: u32,
    pub result: Option<T>,
    pub error: Option<ErrorDetails>,
}

impl<T> Default for StageState<T> {
    fn default() -> Self {
        Self {
            status: StageStatus::Pending,
            attempts: 0,
            result: None,
            error: None,
        }
    }
}

impl<T> StageState<T> {
    fn transition(&mut self, stage: Stage, next: StageStatus) -> Result<(), TransitionError> {
        if !self.status.can_transition_to(next) {
            return Err(TransitionError {
                stage: stage.as_str(),
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }

    /// `Pending -> InProgress` (or a re-claim), counting the attempt.
    pub fn begin(&mut self, stage: Stage) -> Result<(), TransitionError> {
        self.transition(stage, StageStatus::InProgress)?;
        self.attempts += 1;
        Ok(())
    }

    /// Stores the payload and flips to `Completed` in one step.
    pub fn complete(&mut self, stage: Stage, result: T) -> Result<(), TransitionError> {
        self.transition(stage, StageStatus::Completed)?;
        self.result = Some(result);
        self.error = None;
        Ok(())
    }

    pub fn fail(&mut self, stage: Stage, error: ErrorDetails) -> Result<(), TransitionError> {
        self.transition(stage, StageStatus::Failed)?;
        self.error = Some(error);
        Ok(())
    }

    /// `Failed -> Pending`: the explicit retry edge.
    pub fn retry(&mut self, stage: Stage) -> Result<(), TransitionError> {
        self.transition(stage, StageStatus::Pending)
    }

    pub fn skip(&mut self, stage: Stage) -> Result<(), TransitionError> {
        self.transition(stage, StageStatus::Skipped)
    }
}

/// One captured item's end-to-end processing state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogProcessingRecord {
    pub tracking_id: String,
    pub tenant_id: String,
    pub artisan_id: String,
    pub media: MediaRefs,
    pub language_hint: LanguageCode,
    pub priority: Priority,

    pub asr: StageState<AsrResult>,
    pub vision: StageState<VisionResult>,
    pub extraction: StageState<ExtractedAttributes>,
    pub mapping: StageState<MappingResult>,
    pub submission: StageState<SubmissionReceipt>,

    pub idempotency_key: Option<String>,
    pub ondc_catalog_id: Option<String>,
    pub version: u32,
    pub outcome: RecordOutcome,
    pub needs_manual_review: bool,
    pub error_details: Option<ErrorDetails>,

    /// Optimistic-concurrency token, bumped by every persisted transition.
    pub revision: i64,
    pub lease_owner: Option<String>,
    pub lease_expires_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl CatalogProcessingRecord {
    /// Fresh record for a validated queue message. All stages pending.
    pub fn new(message: &QueueMessage, now: DateTime<Utc>) -> Self {
        Self {
            tracking_id: message.tracking_id.clone(),
            tenant_id: message.tenant_id.clone(),
            artisan_id: message.artisan_id.clone(),
            media: MediaRefs {
                photo_ref: non_empty(message.photo_ref.as_deref()),
                audio_ref: non_empty(message.audio_ref.as_deref()),
            },
            language_hint: message.language_hint,
            priority: message.priority,
            asr: StageState::default(),
            vision: StageState::default(),
            extraction: StageState::default(),
            mapping: StageState::default(),
            submission: StageState::default(),
            idempotency_key: None,
            ondc_catalog_id: None,
            version: 1,
            outcome: RecordOutcome::Pending,
            needs_manual_review: false,
            error_details: None,
            revision: 0,
            lease_owner: None,
            lease_expires_at: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    pub fn stage_status(&self, stage: Stage) -> StageStatus {
        match stage {
            Stage::Asr => self.asr.status,
            Stage::Vision => self.vision.status,
            Stage::Extraction => self.extraction.status,
            Stage::Mapping => self.mapping.status,
            Stage::Submission => self.submission.status,
        }
    }

    pub fn stage_attempts(&self, stage: Stage) -> u32 {
        match stage {
            Stage::Asr => self.asr.attempts,
            Stage::Vision => self.vision.attempts,
            Stage::Extraction => self.extraction.attempts,
            Stage::Mapping => self.mapping.attempts,
            Stage::Submission => self.submission.attempts,
        }
    }

    pub fn stage_error(&self, stage: Stage) -> Option<&ErrorDetails> {
        match stage {
            Stage::Asr => self.asr.error.as_ref(),
            Stage::Vision => self.vision.error.as_ref(),
            Stage::Extraction => self.extraction.error.as_ref(),
            Stage::Mapping => self.mapping.error.as_ref(),
            Stage::Submission => self.submission.error.as_ref(),
        }
    }

    /// Untyped transitions (begin, fail, retry, skip) addressed by stage.
    /// Completion is typed and goes through the stage field directly.
    pub fn begin_stage(&mut self, stage: Stage) -> Result<(), TransitionError> {
        match stage {
            Stage::Asr => self.asr.begin(stage),
            Stage::Vision => self.vision.begin(stage),
            Stage::Extraction => self.extraction.begin(stage),
            Stage::Mapping => self.mapping.begin(stage),
            Stage::Submission => self.submission.begin(stage),
        }
    }

    pub fn fail_stage(&mut self, stage: Stage, error: ErrorDetails) -> Result<(), TransitionError> {
        match stage {
            Stage::Asr => self.asr.fail(stage, error),
            Stage::Vision => self.vision.fail(stage, error),
            Stage::Extraction => self.extraction.fail(stage, error),
            Stage::Mapping => self.mapping.fail(stage, error),
            Stage::Submission => self.submission.fail(stage, error),
        }
    }

    pub fn retry_stage(&mut self, stage: Stage) -> Result<(), TransitionError> {
        match stage {
            Stage::Asr => self.asr.retry(stage),
            Stage::Vision => self.vision.retry(stage),
            Stage::Extraction => self.extraction.retry(stage),
            Stage::Mapping => self.mapping.retry(stage),
            Stage::Submission => self.submission.retry(stage),
        }
    }

    pub fn skip_stage(&mut self, stage: Stage) -> Result<(), TransitionError> {
        match stage {
            Stage::Asr => self.asr.skip(stage),
            Stage::Vision => self.vision.skip(stage),
            Stage::Extraction => self.extraction.skip(stage),
            Stage::Mapping => self.mapping.skip(stage),
            Stage::Submission => self.submission.skip(stage),
        }
    }

    /// First stage still needing work, or `Submission` once everything settled.
    pub fn current_stage(&self) -> Stage {
        Stage::ALL
            .into_iter()
            .find(|s| !self.stage_status(*s).is_settled())
            .unwrap_or(Stage::Submission)
    }

    /// The photo the listing should carry: enhanced if vision produced one.
    pub fn listing_photo(&self) -> Option<&str> {
        self.vision
            .result
            .as_ref()
            .and_then(|v| v.enhanced_photo_ref.as_deref())
            .or(self.media.photo_ref.as_deref())
    }

    /// Whether `owner` holds an unexpired lease at `now`.
    pub fn holds_lease(&self, owner: &str, now: DateTime<Utc>) -> bool {
        self.lease_owner.as_deref() == Some(owner)
            && self.lease_expires_at.is_some_and(|exp| exp > now)
    }

    /// Marks the record terminal. `Completed` clears any review flag.
    pub fn finish(&mut self, outcome: RecordOutcome, error: Option<ErrorDetails>, now: DateTime<Utc>) {
        self.outcome = outcome;
        self.needs_manual_review = outcome != RecordOutcome::Completed;
        self.error_details = error;
        self.completed_at = Some(now);
    }

    /// Closes every stage that is still pending; used when an upstream
    /// failure ends the record early.
    pub fn skip_pending_stages(&mut self) -> Result<(), TransitionError> {
        for stage in Stage::ALL {
            if self.stage_status(stage) == StageStatus::Pending {
                self.skip_stage(stage)?;
            }
        }
        Ok(())
    }

    /// Operator retry: reopens failed/skipped stages that no completed
    /// downstream stage depends on, and clears the terminal state.
    /// Returns the stages that were reopened.
    pub fn reopen_for_retry(&mut self) -> Result<Vec<Stage>, TransitionError> {
        let mut reopened = Vec::new();
        for stage in Stage::ALL {
            let status = self.stage_status(stage);
            if !matches!(status, StageStatus::Failed | StageStatus::Skipped) {
                continue;
            }
            if self.has_completed_downstream(stage) {
                continue;
            }
            self.retry_stage(stage)?;
            reopened.push(stage);
        }

        if !reopened.is_empty() {
            self.outcome = RecordOutcome::Pending;
            self.needs_manual_review = false;
            self.error_details = None;
            self.completed_at = None;
        }
        Ok(reopened)
    }

    fn has_completed_downstream(&self, stage: Stage) -> bool {
        let downstream: &[Stage] = match stage {
            Stage::Asr | Stage::Vision => &[Stage::Extraction, Stage::Mapping, Stage::Submission],
            Stage::Extraction => &[Stage::Mapping, Stage::Submission],
            Stage::Mapping => &[Stage::Submission],
            Stage::Submission => &[],
        };
        downstream
            .iter()
            .any(|s| self.stage_status(*s) == StageStatus::Completed)
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
