//! Failure taxonomy shared by adapters, the record store and lifecycle events.

use serde::{Deserialize, Serialize};

use super::status::Stage;

/// How the pipeline must react to a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    /// Retry with backoff, bounded attempts.
    Transient,
    /// Never retried, surfaced to manual review.
    Permanent,
}

/// Categorical failure reason. Adapters choose the category; nothing
/// downstream re-classifies it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Network,
    Timeout,
    RateLimited,
    ServerError,
    CircuitOpen,
    ValidationRejected,
    Unauthorized,
    MalformedRequest,
    MalformedResponse,
    SchemaRejected,
    RetriesExhausted,
}

impl ErrorCategory {
    pub fn class(&self) -> ErrorClass {
        match self {
            ErrorCategory::Network
            | ErrorCategory::Timeout
            | ErrorCategory::RateLimited
            | ErrorCategory::ServerError
            | ErrorCategory::CircuitOpen => ErrorClass::Transient,
            ErrorCategory::ValidationRejected
            | ErrorCategory::Unauthorized
            | ErrorCategory::MalformedRequest
            | ErrorCategory::MalformedResponse
            | ErrorCategory::SchemaRejected
            | ErrorCategory::RetriesExhausted => ErrorClass::Permanent,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.class() == ErrorClass::Transient
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Network => "network",
            ErrorCategory::Timeout => "timeout",
            ErrorCategory::RateLimited => "rate_limited",
            ErrorCategory::ServerError => "server_error",
            ErrorCategory::CircuitOpen => "circuit_open",
            ErrorCategory::ValidationRejected => "validation_rejected",
            ErrorCategory::Unauthorized => "unauthorized",
            ErrorCategory::MalformedRequest => "malformed_request",
            ErrorCategory::MalformedResponse => "malformed_response",
            ErrorCategory::SchemaRejected => "schema_rejected",
            ErrorCategory::RetriesExhausted => "retries_exhausted",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "network" => Some(ErrorCategory::Network),
            "timeout" => Some(ErrorCategory::Timeout),
            "rate_limited" => Some(ErrorCategory::RateLimited),
            "server_error" => Some(ErrorCategory::ServerError),
            "circuit_open" => Some(ErrorCategory::CircuitOpen),
            "validation_rejected" => Some(ErrorCategory::ValidationRejected),
            "unauthorized" => Some(ErrorCategory::Unauthorized),
            "malformed_request" => Some(ErrorCategory::MalformedRequest),
            "malformed_response" => Some(ErrorCategory::MalformedResponse),
            "schema_rejected" => Some(ErrorCategory::SchemaRejected),
            "retries_exhausted" => Some(ErrorCategory::RetriesExhausted),
            _ => None,
        }
    }

    /// User-facing explanation. Never includes raw internal error text.
    pub fn describe(&self) -> &'static str {
        match self {
            ErrorCategory::Network => "A connected service could not be reached",
            ErrorCategory::Timeout => "A connected service took too long to respond",
            ErrorCategory::RateLimited => "A connected service is temporarily limiting requests",
            ErrorCategory::ServerError => "A connected service reported an internal problem",
            ErrorCategory::CircuitOpen => "A connected service is temporarily unavailable",
            ErrorCategory::ValidationRejected => "The marketplace rejected the listing details",
            ErrorCategory::Unauthorized => "The marketplace credentials were not accepted",
            ErrorCategory::MalformedRequest => "The listing request was not understood",
            ErrorCategory::MalformedResponse => "A connected service returned an unreadable answer",
            ErrorCategory::SchemaRejected => {
                "The listing is missing required details (name, price, category or photo)"
            }
            ErrorCategory::RetriesExhausted => {
                "The marketplace stayed unavailable after several attempts"
            }
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure details persisted on a record or a stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorDetails {
    pub stage: Stage,
    pub category: ErrorCategory,
    /// Categorical summary safe to show to the artisan.
    pub summary: String,
    /// Internal diagnostic message; kept out of lifecycle events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnostic: Option<String>,
}

impl ErrorDetails {
    pub fn new(stage: Stage, category: ErrorCategory) -> Self {
        Self {
            stage,
            category,
            summary: format!("{}: {}", stage, category.describe()),
            diagnostic: None,
        }
    }

    pub fn with_diagnostic(mut self, diagnostic: impl Into<String>) -> Self {
        self.diagnostic = Some(diagnostic.into());
        self
    }
}
