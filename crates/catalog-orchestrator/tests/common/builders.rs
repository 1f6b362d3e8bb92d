//! Builders for queue messages and canned stage results.

#![allow(dead_code)]

use catalog_orchestrator::catalog::{AsrResult, VisionResult};
use catalog_orchestrator::{LanguageCode, Priority, QueueMessage};

pub const SAREE_TRANSCRIPT: &str = "yeh lal banarasi silk saree hai, daam 2500 rupaye";
pub const PHOTO_REF: &str = "https://media.example.com/u/123/photo.jpg?sig=secret";
pub const ENHANCED_PHOTO_REF: &str = "https://media.example.com/u/123/photo-enhanced.jpg";
pub const AUDIO_REF: &str = "https://media.example.com/u/123/note.ogg?sig=secret";

/// Builder for `QueueMessage` instances.
pub struct MessageBuilder {
    message: QueueMessage,
}

impl MessageBuilder {
    /// A message with both media references, Hindi, normal priority.
    pub fn new(tracking_id: &str) -> Self {
        Self {
            message: QueueMessage {
                tracking_id: tracking_id.to_string(),
                tenant_id: "tenant-1".to_string(),
                artisan_id: "artisan-1".to_string(),
                photo_ref: Some(PHOTO_REF.to_string()),
                audio_ref: Some(AUDIO_REF.to_string()),
                language_hint: LanguageCode::Hindi,
                priority: Priority::Normal,
            },
        }
    }

    pub fn photo_only(mut self) -> Self {
        self.message.audio_ref = None;
        self
    }

    pub fn audio_only(mut self) -> Self {
        self.message.photo_ref = None;
        self
    }

    pub fn no_media(mut self) -> Self {
        self.message.photo_ref = None;
        self.message.audio_ref = None;
        self
    }

    pub fn language(mut self, language: LanguageCode) -> Self {
        self.message.language_hint = language;
        self
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.message.priority = priority;
        self
    }

    pub fn tenant(mut self, tenant_id: &str) -> Self {
        self.message.tenant_id = tenant_id.to_string();
        self
    }

    pub fn build(self) -> QueueMessage {
        self.message
    }
}

pub fn message(tracking_id: &str) -> QueueMessage {
    MessageBuilder::new(tracking_id).build()
}

pub fn saree_asr() -> AsrResult {
    AsrResult {
        transcription: SAREE_TRANSCRIPT.to_string(),
        detected_language: "hi".to_string(),
        confidence: 0.92,
    }
}

pub fn asr(transcription: &str) -> AsrResult {
    AsrResult {
        transcription: transcription.to_string(),
        detected_language: "hi".to_string(),
        confidence: 0.9,
    }
}

pub fn saree_vision() -> VisionResult {
    VisionResult {
        category: Some("saree".to_string()),
        colors: vec!["gold".to_string()],
        materials: vec!["cotton".to_string()],
        confidence: 0.74,
        enhanced_photo_ref: Some(ENHANCED_PHOTO_REF.to_string()),
    }
}

/// A vision result without an enhanced photo.
pub fn plain_vision() -> VisionResult {
    VisionResult {
        enhanced_photo_ref: None,
        ..saree_vision()
    }
}
