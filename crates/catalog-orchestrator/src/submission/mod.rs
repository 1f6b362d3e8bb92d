//! Idempotent marketplace submission with bounded retry.

pub mod idempotency;
pub mod manager;
pub mod retry;

pub use idempotency::{idempotency_key, normalize_decimal};
pub use manager::{SubmissionManager, SubmissionOutcome};
pub use retry::RetryPolicy;
