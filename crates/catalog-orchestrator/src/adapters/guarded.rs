//! Timeout and circuit-breaker wrapper owned by each adapter.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::catalog::{
    AsrResult, CulturallySignificantItem, ExtractedAttributes, LanguageCode, VisionResult,
};

use super::breaker::{BreakerSettings, BreakerState, CircuitBreaker};
use super::error::AdapterError;
use super::{
    CulturalKnowledge, DescriptionGenerator, GatewayResponse, MarketplaceGateway,
    SubmissionRequest, TranscriptionService, VisionService,
};

/// An adapter together with its own breaker and call timeout.
///
/// Only transient failures count against the breaker. A permanent error
/// means the dependency answered, so it counts as a healthy call.
pub struct Guarded<S: ?Sized> {
    inner: Arc<S>,
    breaker: CircuitBreaker,
    timeout: Duration,
}

impl<S: ?Sized> Guarded<S> {
    pub fn new(
        name: impl Into<String>,
        inner: Arc<S>,
        timeout: Duration,
        breaker: BreakerSettings,
    ) -> Self {
        Self {
            inner,
            breaker: CircuitBreaker::new(name, breaker),
            timeout,
        }
    }

    pub fn name(&self) -> &str {
        self.breaker.name()
    }

    pub fn breaker_state(&self) -> BreakerState {
        self.breaker.state()
    }

    /// Runs `call` unless the circuit is open, bounded by the timeout.
    /// The future is not polled when the call is rejected.
    pub async fn call<T, F>(&self, call: F) -> Result<T, AdapterError>
    where
        F: Future<Output = Result<T, AdapterError>>,
    {
        if !self.breaker.try_acquire() {
            return Err(AdapterError::circuit_open(self.name()));
        }

        let result = match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(AdapterError::timeout(self.name(), self.timeout)),
        };

        match &result {
            Err(e) if e.is_retryable() => self.breaker.record_failure(),
            _ => self.breaker.record_success(),
        }
        result
    }
}

impl Guarded<dyn TranscriptionService> {
    pub async fn transcribe(
        &self,
        audio_ref: &str,
        language: LanguageCode,
    ) -> Result<AsrResult, AdapterError> {
        self.call(self.inner.transcribe(audio_ref, language)).await
    }
}

impl Guarded<dyn VisionService> {
    pub async fn analyze(&self, photo_ref: &str) -> Result<VisionResult, AdapterError> {
        self.call(self.inner.analyze(photo_ref)).await
    }
}

impl Guarded<dyn DescriptionGenerator> {
    pub async fn generate(
        &self,
        transcription: &str,
        vision: Option<&VisionResult>,
        language: LanguageCode,
    ) -> Result<ExtractedAttributes, AdapterError> {
        self.call(self.inner.generate(transcription, vision, language))
            .await
    }
}

impl Guarded<dyn CulturalKnowledge> {
    pub async fn lookup(
        &self,
        transcription: &str,
        language: LanguageCode,
    ) -> Result<Vec<CulturallySignificantItem>, AdapterError> {
        self.call(self.inner.lookup(transcription, language)).await
    }
}

impl Guarded<dyn MarketplaceGateway> {
    pub async fn submit(&self, request: &SubmissionRequest) -> Result<GatewayResponse, AdapterError> {
        self.call(self.inner.submit(request)).await
    }
}
