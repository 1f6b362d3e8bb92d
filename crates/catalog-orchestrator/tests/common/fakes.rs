//! Scripted stand-ins for the external services.
//!
//! Each fake answers from a queue of scripted replies and falls back to a
//! fixed reply once the queue is empty. Every call is counted.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use catalog_orchestrator::adapters::{
    CulturalKnowledge, DescriptionGenerator, GatewayResponse, MarketplaceGateway,
    SubmissionRequest, TranscriptionService, VisionService,
};
use catalog_orchestrator::catalog::{
    AsrResult, CulturallySignificantItem, ExtractedAttributes, VisionResult,
};
use catalog_orchestrator::{AdapterError, ErrorCategory, LanguageCode};

/// Replies handed out in order, then `fallback` forever.
pub struct Script<T> {
    queue: Mutex<VecDeque<Result<T, AdapterError>>>,
    fallback: Mutex<Result<T, AdapterError>>,
    calls: AtomicU32,
}

impl<T: Clone> Script<T> {
    pub fn always(reply: Result<T, AdapterError>) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            fallback: Mutex::new(reply),
            calls: AtomicU32::new(0),
        }
    }

    pub fn then(self, reply: Result<T, AdapterError>) -> Self {
        self.queue.lock().unwrap().push_back(reply);
        self
    }

    pub fn set_fallback(&self, reply: Result<T, AdapterError>) {
        *self.fallback.lock().unwrap() = reply;
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    fn next(&self) -> Result<T, AdapterError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(reply) = self.queue.lock().unwrap().pop_front() {
            return reply;
        }
        self.fallback.lock().unwrap().clone()
    }
}

pub struct FakeAsr {
    pub script: Script<AsrResult>,
    /// Simulated latency per call, in milliseconds.
    delay_ms: AtomicU64,
}

impl FakeAsr {
    pub fn new(script: Script<AsrResult>) -> Self {
        Self {
            script,
            delay_ms: AtomicU64::new(0),
        }
    }

    pub fn set_delay(&self, delay: Duration) {
        self.delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }
}

#[async_trait]
impl TranscriptionService for FakeAsr {
    async fn transcribe(
        &self,
        _audio_ref: &str,
        _language: LanguageCode,
    ) -> Result<AsrResult, AdapterError> {
        let delay = self.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        self.script.next()
    }
}

pub struct FakeVision {
    pub script: Script<VisionResult>,
}

#[async_trait]
impl VisionService for FakeVision {
    async fn analyze(&self, _photo_ref: &str) -> Result<VisionResult, AdapterError> {
        self.script.next()
    }
}

/// Marketplace fake. Answers updates with the catalog id it was given and
/// creates with a fresh `ONDC-<n>` id. Keeps every request it saw.
pub struct FakeGateway {
    failures: Mutex<VecDeque<AdapterError>>,
    always_fail: Mutex<Option<AdapterError>>,
    requests: Mutex<Vec<SubmissionRequest>>,
    created: AtomicU32,
    reassign_updates: AtomicBool,
}

impl FakeGateway {
    pub fn accepting() -> Self {
        Self {
            failures: Mutex::new(VecDeque::new()),
            always_fail: Mutex::new(None),
            requests: Mutex::new(Vec::new()),
            created: AtomicU32::new(0),
            reassign_updates: AtomicBool::new(false),
        }
    }

    /// Answers updates with a freshly minted id instead of the one sent.
    pub fn reassigning_updates() -> Self {
        let gateway = Self::accepting();
        gateway.reassign_updates.store(true, Ordering::SeqCst);
        gateway
    }

    /// Fails the next calls with `errors`, in order, then accepts.
    pub fn failing_first(errors: Vec<AdapterError>) -> Self {
        let gateway = Self::accepting();
        *gateway.failures.lock().unwrap() = errors.into();
        gateway
    }

    pub fn always_failing(error: AdapterError) -> Self {
        let gateway = Self::accepting();
        *gateway.always_fail.lock().unwrap() = Some(error);
        gateway
    }

    pub fn start_accepting(&self) {
        *self.always_fail.lock().unwrap() = None;
        self.failures.lock().unwrap().clear();
    }

    pub fn requests(&self) -> Vec<SubmissionRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl MarketplaceGateway for FakeGateway {
    async fn submit(&self, request: &SubmissionRequest) -> Result<GatewayResponse, AdapterError> {
        self.requests.lock().unwrap().push(request.clone());

        if let Some(error) = self.always_fail.lock().unwrap().clone() {
            return Err(error);
        }
        if let Some(error) = self.failures.lock().unwrap().pop_front() {
            return Err(error);
        }

        match &request.existing_catalog_id {
            Some(catalog_id)
                if request.is_update && !self.reassign_updates.load(Ordering::SeqCst) =>
            {
                Ok(GatewayResponse {
                    catalog_id: catalog_id.clone(),
                    response_code: 200,
                })
            }
            _ => {
                let n = self.created.fetch_add(1, Ordering::SeqCst) + 1;
                Ok(GatewayResponse {
                    catalog_id: format!("ONDC-{}", n),
                    response_code: 201,
                })
            }
        }
    }
}

/// Generator that is always down; extraction falls back to local rules.
pub struct DownGenerator;

#[async_trait]
impl DescriptionGenerator for DownGenerator {
    async fn generate(
        &self,
        _transcription: &str,
        _vision: Option<&VisionResult>,
        _language: LanguageCode,
    ) -> Result<ExtractedAttributes, AdapterError> {
        Err(AdapterError::new(ErrorCategory::ServerError, "generator down").with_response_code(503))
    }
}

pub struct EmptyCulture;

#[async_trait]
impl CulturalKnowledge for EmptyCulture {
    async fn lookup(
        &self,
        _transcription: &str,
        _language: LanguageCode,
    ) -> Result<Vec<CulturallySignificantItem>, AdapterError> {
        Ok(Vec::new())
    }
}

pub fn server_error() -> AdapterError {
    AdapterError::new(ErrorCategory::ServerError, "upstream returned 503").with_response_code(503)
}

pub fn rejected() -> AdapterError {
    AdapterError::new(ErrorCategory::ValidationRejected, "gateway rejected item: bad tags")
        .with_response_code(422)
}
