//! Adapter failures, already classified by the adapter that produced them.

use thiserror::Error;

use crate::catalog::{ErrorCategory, ErrorClass};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{category}: {message}")]
pub struct AdapterError {
    pub category: ErrorCategory,
    /// Internal diagnostic. Kept out of user-facing events.
    pub message: String,
    /// HTTP status (or equivalent) if the remote side answered.
    pub response_code: Option<u16>,
}

impl AdapterError {
    pub fn new(category: ErrorCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
            response_code: None,
        }
    }

    pub fn with_response_code(mut self, code: u16) -> Self {
        self.response_code = Some(code);
        self
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Network, message)
    }

    pub fn timeout(service: &str, after: std::time::Duration) -> Self {
        Self::new(
            ErrorCategory::Timeout,
            format!("{} did not answer within {:?}", service, after),
        )
    }

    pub fn circuit_open(service: &str) -> Self {
        Self::new(
            ErrorCategory::CircuitOpen,
            format!("circuit for {} is open", service),
        )
    }

    pub fn malformed_response(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::MalformedResponse, message)
    }

    pub fn class(&self) -> ErrorClass {
        self.category.class()
    }

    pub fn is_retryable(&self) -> bool {
        self.category.is_retryable()
    }
}

/// Maps a non-success HTTP status to its failure category.
///
/// Returns `None` for 1xx-3xx. 429 and 5xx are transient; 400/422,
/// 401/403 and every other 4xx are permanent.
pub fn classify_status(status: u16) -> Option<ErrorCategory> {
    match status {
        100..=399 => None,
        429 => Some(ErrorCategory::RateLimited),
        408 => Some(ErrorCategory::Timeout),
        400 | 422 => Some(ErrorCategory::ValidationRejected),
        401 | 403 => Some(ErrorCategory::Unauthorized),
        500..=599 => Some(ErrorCategory::ServerError),
        _ => Some(ErrorCategory::MalformedRequest),
    }
}
