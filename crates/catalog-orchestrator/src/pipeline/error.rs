use thiserror::Error;

use crate::catalog::{MessageError, TransitionError};
use crate::error::StoreError;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Queue message rejected: {0}")]
    InvalidMessage(#[from] MessageError),

    #[error("Record store failed: {0}")]
    Store(#[from] StoreError),

    #[error("Record {tracking_id} has no {stage} result to continue from")]
    MissingStageResult {
        tracking_id: String,
        stage: &'static str,
    },
}

impl PipelineError {
    pub fn is_lease_lost(&self) -> bool {
        matches!(self, PipelineError::Store(StoreError::LeaseLost { .. }))
    }
}

impl From<TransitionError> for PipelineError {
    fn from(e: TransitionError) -> Self {
        PipelineError::Store(StoreError::Transition(e))
    }
}
