//! Lifecycle events for notification collaborators.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::catalog::{
    CatalogProcessingRecord, ErrorCategory, ErrorDetails, RecordOutcome, Stage, StageStatus,
};

/// One stage settling, or the record reaching its terminal outcome.
///
/// Failures are described by category and a fixed summary; internal
/// diagnostics never appear here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LifecycleEvent {
    pub tracking_id: String,
    pub stage: Stage,
    pub outcome: RecordOutcome,
    /// True for the single per-record terminal event.
    pub is_final: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub catalog_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_category: Option<ErrorCategory>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_summary: Option<String>,
    pub timestamp: DateTime<Utc>,
}

fn outcome_of(status: StageStatus) -> RecordOutcome {
    match status {
        StageStatus::Pending => RecordOutcome::Pending,
        StageStatus::InProgress => RecordOutcome::InProgress,
        StageStatus::Completed => RecordOutcome::Completed,
        StageStatus::Failed => RecordOutcome::Failed,
        StageStatus::Skipped => RecordOutcome::Skipped,
    }
}

impl LifecycleEvent {
    pub fn stage(
        tracking_id: &str,
        stage: Stage,
        status: StageStatus,
        error: Option<&ErrorDetails>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            tracking_id: tracking_id.to_string(),
            stage,
            outcome: outcome_of(status),
            is_final: false,
            catalog_id: None,
            error_category: error.map(|e| e.category),
            error_summary: error.map(|e| e.summary.clone()),
            timestamp,
        }
    }

    /// The terminal event for `rec`.
    pub fn finished(rec: &CatalogProcessingRecord) -> Self {
        let error = rec.error_details.as_ref();
        Self {
            tracking_id: rec.tracking_id.clone(),
            stage: error.map(|e| e.stage).unwrap_or(Stage::Submission),
            outcome: rec.outcome,
            is_final: true,
            catalog_id: rec.ondc_catalog_id.clone(),
            error_category: error.map(|e| e.category),
            error_summary: error.map(|e| e.summary.clone()),
            timestamp: rec.completed_at.unwrap_or(rec.updated_at),
        }
    }
}

/// Receiver of lifecycle events. Emitting never blocks or fails the
/// pipeline.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: LifecycleEvent);
}

/// Fans events out over a tokio broadcast channel.
#[derive(Clone)]
pub struct LifecycleBroadcaster {
    sender: Arc<broadcast::Sender<LifecycleEvent>>,
}

impl LifecycleBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.sender.subscribe()
    }
}

impl Default for LifecycleBroadcaster {
    fn default() -> Self {
        Self::new(256)
    }
}

impl EventSink for LifecycleBroadcaster {
    fn emit(&self, event: LifecycleEvent) {
        // No subscribers is fine.
        let _ = self.sender.send(event);
    }
}
