//! Queue message consumed by the orchestrator, one per captured item.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Languages the capture app records in (ISO 639-1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LanguageCode {
    #[serde(rename = "hi")]
    Hindi,
    #[serde(rename = "te")]
    Telugu,
    #[serde(rename = "ta")]
    Tamil,
    #[serde(rename = "bn")]
    Bengali,
    #[serde(rename = "mr")]
    Marathi,
    #[serde(rename = "gu")]
    Gujarati,
    #[serde(rename = "kn")]
    Kannada,
    #[serde(rename = "ml")]
    Malayalam,
    #[serde(rename = "pa")]
    Punjabi,
    #[serde(rename = "or")]
    Odia,
    #[serde(rename = "en")]
    English,
}

impl LanguageCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            LanguageCode::Hindi => "hi",
            LanguageCode::Telugu => "te",
            LanguageCode::Tamil => "ta",
            LanguageCode::Bengali => "bn",
            LanguageCode::Marathi => "mr",
            LanguageCode::Gujarati => "gu",
            LanguageCode::Kannada => "kn",
            LanguageCode::Malayalam => "ml",
            LanguageCode::Punjabi => "pa",
            LanguageCode::Odia => "or",
            LanguageCode::English => "en",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "hi" => Some(LanguageCode::Hindi),
            "te" => Some(LanguageCode::Telugu),
            "ta" => Some(LanguageCode::Tamil),
            "bn" => Some(LanguageCode::Bengali),
            "mr" => Some(LanguageCode::Marathi),
            "gu" => Some(LanguageCode::Gujarati),
            "kn" => Some(LanguageCode::Kannada),
            "ml" => Some(LanguageCode::Malayalam),
            "pa" => Some(LanguageCode::Punjabi),
            "or" => Some(LanguageCode::Odia),
            "en" => Some(LanguageCode::English),
            _ => None,
        }
    }
}

impl std::fmt::Display for LanguageCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Normal => "normal",
            Priority::High => "high",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "low" => Some(Priority::Low),
            "normal" => Some(Priority::Normal),
            "high" => Some(Priority::High),
            _ => None,
        }
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum MessageError {
    #[error("Required field '{0}' is missing or empty")]
    MissingField(&'static str),

    #[error("At least one of 'photoRef' or 'audioRef' must be provided")]
    NoMedia,

    #[error("Unsupported language '{0}'")]
    UnsupportedLanguage(String),

    #[error("Malformed queue message: {0}")]
    Malformed(String),
}

/// One queued capture, as delivered by the upload pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueMessage {
    pub tracking_id: String,
    pub tenant_id: String,
    pub artisan_id: String,
    #[serde(default)]
    pub photo_ref: Option<String>,
    #[serde(default)]
    pub audio_ref: Option<String>,
    pub language_hint: LanguageCode,
    #[serde(default)]
    pub priority: Priority,
}

impl QueueMessage {
    /// Parses one JSON message body.
    pub fn from_json(body: &str) -> Result<Self, MessageError> {
        serde_json::from_str(body).map_err(|e| MessageError::Malformed(e.to_string()))
    }

    /// Checks required fields and the language against the supported set.
    pub fn validate(&self, supported_languages: &[LanguageCode]) -> Result<(), MessageError> {
        if self.tracking_id.trim().is_empty() {
            return Err(MessageError::MissingField("trackingId"));
        }
        if self.tenant_id.trim().is_empty() {
            return Err(MessageError::MissingField("tenantId"));
        }
        if self.artisan_id.trim().is_empty() {
            return Err(MessageError::MissingField("artisanId"));
        }

        let has_photo = self.photo_ref.as_deref().is_some_and(|r| !r.trim().is_empty());
        let has_audio = self.audio_ref.as_deref().is_some_and(|r| !r.trim().is_empty());
        if !has_photo && !has_audio {
            return Err(MessageError::NoMedia);
        }

        if !supported_languages.contains(&self.language_hint) {
            return Err(MessageError::UnsupportedLanguage(
                self.language_hint.as_str().to_string(),
            ));
        }

        Ok(())
    }
}
