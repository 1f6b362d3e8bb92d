//! External service adapters.
//!
//! Each collaborator is a trait so the orchestrator can be driven by HTTP
//! clients in production and scripted fakes in tests. Adapters classify
//! their own failures into an [`ErrorCategory`](crate::catalog::ErrorCategory);
//! callers only act on that classification.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::catalog::{
    AsrResult, CulturallySignificantItem, ExtractedAttributes, LanguageCode,
    MarketplaceCatalogItem, VisionResult,
};

pub mod breaker;
pub mod error;
pub mod guarded;
pub mod http;

pub use breaker::{BreakerSettings, BreakerState, CircuitBreaker};
pub use error::{classify_status, AdapterError};
pub use guarded::Guarded;

#[async_trait]
pub trait TranscriptionService: Send + Sync {
    async fn transcribe(
        &self,
        audio_ref: &str,
        language: LanguageCode,
    ) -> Result<AsrResult, AdapterError>;
}

#[async_trait]
pub trait VisionService: Send + Sync {
    async fn analyze(&self, photo_ref: &str) -> Result<VisionResult, AdapterError>;
}

/// Language generation: descriptions, cultural context and measurements.
#[async_trait]
pub trait DescriptionGenerator: Send + Sync {
    async fn generate(
        &self,
        transcription: &str,
        vision: Option<&VisionResult>,
        language: LanguageCode,
    ) -> Result<ExtractedAttributes, AdapterError>;
}

#[async_trait]
pub trait CulturalKnowledge: Send + Sync {
    async fn lookup(
        &self,
        transcription: &str,
        language: LanguageCode,
    ) -> Result<Vec<CulturallySignificantItem>, AdapterError>;
}

/// One call to the marketplace gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionRequest {
    pub item: MarketplaceCatalogItem,
    pub idempotency_key: String,
    pub is_update: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub existing_catalog_id: Option<String>,
    pub version: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayResponse {
    pub catalog_id: String,
    pub response_code: u16,
}

#[async_trait]
pub trait MarketplaceGateway: Send + Sync {
    async fn submit(&self, request: &SubmissionRequest) -> Result<GatewayResponse, AdapterError>;
}

/// Every collaborator the orchestrator calls, each behind its own breaker.
/// The enrichment services are optional.
#[derive(Clone)]
pub struct ServiceSet {
    pub transcription: std::sync::Arc<Guarded<dyn TranscriptionService>>,
    pub vision: std::sync::Arc<Guarded<dyn VisionService>>,
    pub generator: Option<std::sync::Arc<Guarded<dyn DescriptionGenerator>>>,
    pub cultural: Option<std::sync::Arc<Guarded<dyn CulturalKnowledge>>>,
    pub gateway: std::sync::Arc<Guarded<dyn MarketplaceGateway>>,
}
