//! Stage and record status state machine.

use serde::{Deserialize, Serialize};

/// One pipeline phase of a catalog record.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Asr,
    Vision,
    Extraction,
    Mapping,
    Submission,
}

impl Stage {
    /// All stages in pipeline order. ASR and vision share the first slot.
    pub const ALL: [Stage; 5] = [
        Stage::Asr,
        Stage::Vision,
        Stage::Extraction,
        Stage::Mapping,
        Stage::Submission,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Asr => "asr",
            Stage::Vision => "vision",
            Stage::Extraction => "extraction",
            Stage::Mapping => "mapping",
            Stage::Submission => "submission",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "asr" => Some(Stage::Asr),
            "vision" => Some(Stage::Vision),
            "extraction" => Some(Stage::Extraction),
            "mapping" => Some(Stage::Mapping),
            "submission" => Some(Stage::Submission),
            _ => None,
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Asr => write!(f, "Transcription"),
            Stage::Vision => write!(f, "Vision analysis"),
            Stage::Extraction => write!(f, "Attribute extraction"),
            Stage::Mapping => write!(f, "Schema mapping"),
            Stage::Submission => write!(f, "Marketplace submission"),
        }
    }
}

/// Status of a single stage.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Failed,
    Skipped,
}

impl StageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageStatus::Pending => "pending",
            StageStatus::InProgress => "in_progress",
            StageStatus::Completed => "completed",
            StageStatus::Failed => "failed",
            StageStatus::Skipped => "skipped",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(StageStatus::Pending),
            "in_progress" => Some(StageStatus::InProgress),
            "completed" => Some(StageStatus::Completed),
            "failed" => Some(StageStatus::Failed),
            "skipped" => Some(StageStatus::Skipped),
            _ => None,
        }
    }

    /// Whether the stage no longer needs work in the current processing pass.
    pub fn is_settled(&self) -> bool {
        matches!(self, StageStatus::Completed | StageStatus::Skipped)
    }

    /// Returns true if `self -> next` is a legal transition.
    ///
    /// `Completed` is final. `Failed -> Pending` is the explicit retry edge,
    /// `InProgress -> InProgress` re-claims a stage abandoned by an expired
    /// lease, and `Pending -> Skipped` closes stages an upstream failure
    /// prevented from running.
    pub fn can_transition_to(&self, next: StageStatus) -> bool {
        use StageStatus::*;
        matches!(
            (self, next),
            (Pending, InProgress)
                | (Pending, Skipped)
                | (InProgress, InProgress)
                | (InProgress, Completed)
                | (InProgress, Failed)
                | (InProgress, Skipped)
                | (Failed, Pending)
                | (Failed, Skipped)
                | (Skipped, Pending)
        )
    }
}

impl std::fmt::Display for StageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Record-level outcome, derived from the stages and persisted with the record.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum RecordOutcome {
    #[default]
    Pending,
    InProgress,
    Completed,
    Failed,
    Skipped,
}

impl RecordOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordOutcome::Pending => "pending",
            RecordOutcome::InProgress => "in_progress",
            RecordOutcome::Completed => "completed",
            RecordOutcome::Failed => "failed",
            RecordOutcome::Skipped => "skipped",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(RecordOutcome::Pending),
            "in_progress" => Some(RecordOutcome::InProgress),
            "completed" => Some(RecordOutcome::Completed),
            "failed" => Some(RecordOutcome::Failed),
            "skipped" => Some(RecordOutcome::Skipped),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RecordOutcome::Completed | RecordOutcome::Failed | RecordOutcome::Skipped
        )
    }
}

impl std::fmt::Display for RecordOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
