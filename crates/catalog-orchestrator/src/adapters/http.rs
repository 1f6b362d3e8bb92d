//! HTTP/JSON implementations of every adapter.
//!
//! All services share [`JsonClient`], which maps transport failures and
//! HTTP status codes onto the failure taxonomy before anything reaches the
//! orchestrator.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, Url};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::catalog::{
    AsrResult, CulturallySignificantItem, ErrorCategory, ExtractedAttributes, LanguageCode,
    VisionResult,
};
use crate::config::{ServiceConfig, ServicesConfig};
use crate::error::ConfigError;

use super::breaker::BreakerSettings;
use super::error::{classify_status, AdapterError};
use super::guarded::Guarded;
use super::{
    CulturalKnowledge, DescriptionGenerator, GatewayResponse, MarketplaceGateway, ServiceSet,
    SubmissionRequest, TranscriptionService, VisionService,
};

/// Error bodies are cut to this many characters before they are kept as
/// diagnostics.
const MAX_ERROR_BODY_CHARS: usize = 200;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

fn truncate_body(body: &str) -> String {
    match body.char_indices().nth(MAX_ERROR_BODY_CHARS) {
        Some((idx, _)) => format!("{}... (truncated)", &body[..idx]),
        None => body.to_string(),
    }
}

fn classify_transport(e: &reqwest::Error) -> ErrorCategory {
    if e.is_timeout() {
        ErrorCategory::Timeout
    } else if e.is_decode() {
        ErrorCategory::MalformedResponse
    } else if e.is_builder() {
        ErrorCategory::MalformedRequest
    } else {
        ErrorCategory::Network
    }
}

/// Shared JSON-over-HTTP plumbing for one service base URL.
#[derive(Clone)]
pub struct JsonClient {
    service: String,
    client: Client,
    base_url: Url,
    api_key: Option<SecretString>,
}

impl JsonClient {
    pub fn new(
        service: &str,
        base_url: &str,
        api_key: Option<SecretString>,
        request_timeout: Duration,
    ) -> Result<Self, ConfigError> {
        let mut base_url = Url::parse(base_url).map_err(|e| ConfigError::InvalidEndpoint {
            service: service.to_string(),
            reason: e.to_string(),
        })?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidEndpoint {
                service: service.to_string(),
                reason: format!("unsupported scheme '{}'", base_url.scheme()),
            });
        }
        // Url::join replaces the last segment unless the path ends in '/'.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(request_timeout)
            .build()
            .map_err(|e| ConfigError::InvalidEndpoint {
                service: service.to_string(),
                reason: format!("failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            service: service.to_string(),
            client,
            base_url,
            api_key,
        })
    }

    pub fn endpoint(&self, path: &str) -> Result<Url, AdapterError> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| AdapterError::new(ErrorCategory::MalformedRequest, e.to_string()))
    }

    /// Sends `body` as JSON and decodes the JSON answer. Returns the decoded
    /// body with the HTTP status code.
    pub async fn send<B, R>(
        &self,
        method: Method,
        path: &str,
        body: &B,
        headers: &[(&str, String)],
    ) -> Result<(R, u16), AdapterError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let url = self.endpoint(path)?;
        let mut request = self.client.request(method, url).json(body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key.expose_secret());
        }
        for (name, value) in headers {
            request = request.header(*name, value);
        }

        let response = request.send().await.map_err(|e| {
            AdapterError::new(
                classify_transport(&e),
                format!("{} request failed: {}", self.service, e),
            )
        })?;

        let status = response.status().as_u16();
        if let Some(category) = classify_status(status) {
            let body = response.text().await.unwrap_or_default();
            return Err(AdapterError::new(
                category,
                format!("{} answered {}: {}", self.service, status, truncate_body(&body)),
            )
            .with_response_code(status));
        }

        let decoded = response.json::<R>().await.map_err(|e| {
            AdapterError::new(
                classify_transport(&e),
                format!("{} returned an unreadable body: {}", self.service, e),
            )
            .with_response_code(status)
        })?;
        Ok((decoded, status))
    }
}

// ─── Transcription ──────────────────────────────────────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TranscribeRequest<'a> {
    audio_ref: &'a str,
    language_hint: LanguageCode,
}

pub struct HttpTranscription {
    client: JsonClient,
}

impl HttpTranscription {
    pub fn new(client: JsonClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl TranscriptionService for HttpTranscription {
    async fn transcribe(
        &self,
        audio_ref: &str,
        language: LanguageCode,
    ) -> Result<AsrResult, AdapterError> {
        let body = TranscribeRequest {
            audio_ref,
            language_hint: language,
        };
        let (result, _) = self
            .client
            .send(Method::POST, "transcribe", &body, &[])
            .await?;
        Ok(result)
    }
}

// ─── Vision ─────────────────────────────────────────────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeRequest<'a> {
    photo_ref: &'a str,
    enhance: bool,
}

pub struct HttpVision {
    client: JsonClient,
}

impl HttpVision {
    pub fn new(client: JsonClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl VisionService for HttpVision {
    async fn analyze(&self, photo_ref: &str) -> Result<VisionResult, AdapterError> {
        let body = AnalyzeRequest {
            photo_ref,
            enhance: true,
        };
        let (result, _) = self
            .client
            .send(Method::POST, "vision/analyze", &body, &[])
            .await?;
        Ok(result)
    }
}

// ─── Description generation ─────────────────────────────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DescribeRequest<'a> {
    transcription: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    vision: Option<&'a VisionResult>,
    language: LanguageCode,
}

pub struct HttpDescriptionGenerator {
    client: JsonClient,
}

impl HttpDescriptionGenerator {
    pub fn new(client: JsonClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl DescriptionGenerator for HttpDescriptionGenerator {
    async fn generate(
        &self,
        transcription: &str,
        vision: Option<&VisionResult>,
        language: LanguageCode,
    ) -> Result<ExtractedAttributes, AdapterError> {
        let body = DescribeRequest {
            transcription,
            vision,
            language,
        };
        let (result, _) = self
            .client
            .send(Method::POST, "describe", &body, &[])
            .await?;
        Ok(result)
    }
}

// ─── Cultural knowledge ─────────────────────────────────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CulturalLookupRequest<'a> {
    transcription: &'a str,
    language: LanguageCode,
}

#[derive(Deserialize)]
struct CulturalLookupResponse {
    #[serde(default)]
    items: Vec<CulturallySignificantItem>,
}

pub struct HttpCulturalKnowledge {
    client: JsonClient,
}

impl HttpCulturalKnowledge {
    pub fn new(client: JsonClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl CulturalKnowledge for HttpCulturalKnowledge {
    async fn lookup(
        &self,
        transcription: &str,
        language: LanguageCode,
    ) -> Result<Vec<CulturallySignificantItem>, AdapterError> {
        let body = CulturalLookupRequest {
            transcription,
            language,
        };
        let (response, _): (CulturalLookupResponse, u16) = self
            .client
            .send(Method::POST, "cultural/lookup", &body, &[])
            .await?;
        Ok(response.items)
    }
}

// ─── Marketplace gateway ────────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CatalogItemResponse {
    catalog_id: String,
}

pub struct HttpMarketplaceGateway {
    client: JsonClient,
}

impl HttpMarketplaceGateway {
    pub fn new(client: JsonClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl MarketplaceGateway for HttpMarketplaceGateway {
    async fn submit(&self, request: &SubmissionRequest) -> Result<GatewayResponse, AdapterError> {
        let (method, path) = match (&request.existing_catalog_id, request.is_update) {
            (Some(id), true) => (Method::PUT, format!("catalog/items/{}", id)),
            (None, true) => {
                return Err(AdapterError::new(
                    ErrorCategory::MalformedRequest,
                    "update submission without an existing catalog id",
                ))
            }
            (_, false) => (Method::POST, "catalog/items".to_string()),
        };
        let headers = [
            ("Idempotency-Key", request.idempotency_key.clone()),
            ("X-Catalog-Version", request.version.to_string()),
        ];

        let (response, status): (CatalogItemResponse, u16) = self
            .client
            .send(method, &path, &request.item, &headers)
            .await?;

        if response.catalog_id.trim().is_empty() {
            return Err(AdapterError::malformed_response(
                "gateway accepted the item but returned no catalog id",
            )
            .with_response_code(status));
        }

        Ok(GatewayResponse {
            catalog_id: response.catalog_id,
            response_code: status,
        })
    }
}

// ─── Wiring ───

fn client_for(service: &str, config: &ServiceConfig) -> Result<JsonClient, ConfigError> {
    let api_key = config
        .credentials
        .resolve()
        .map_err(|source| ConfigError::Credential {
            service: service.to_string(),
            source,
        })?;
    JsonClient::new(service, &config.endpoint, api_key, config.timeout())
}

/// Builds the HTTP-backed [`ServiceSet`] from the `services` config section.
///
/// The adapter timeout wraps the whole call; the HTTP client gets the same
/// value so a hung connection is also torn down.
pub fn build_services(
    services: &ServicesConfig,
    breaker: BreakerSettings,
) -> Result<ServiceSet, ConfigError> {
    let transcription: Arc<dyn TranscriptionService> = Arc::new(HttpTranscription::new(
        client_for("transcription", &services.transcription)?,
    ));
    let vision: Arc<dyn VisionService> =
        Arc::new(HttpVision::new(client_for("vision", &services.vision)?));
    let gateway: Arc<dyn MarketplaceGateway> = Arc::new(HttpMarketplaceGateway::new(
        client_for("marketplace", &services.marketplace)?,
    ));

    let generator = match &services.description_generator {
        Some(config) => {
            let service: Arc<dyn DescriptionGenerator> = Arc::new(HttpDescriptionGenerator::new(
                client_for("description_generator", config)?,
            ));
            Some(Arc::new(Guarded::new(
                "description_generator",
                service,
                config.timeout(),
                breaker,
            )))
        }
        None => None,
    };
    let cultural = match &services.cultural_knowledge {
        Some(config) => {
            let service: Arc<dyn CulturalKnowledge> = Arc::new(HttpCulturalKnowledge::new(
                client_for("cultural_knowledge", config)?,
            ));
            Some(Arc::new(Guarded::new(
                "cultural_knowledge",
                service,
                config.timeout(),
                breaker,
            )))
        }
        None => None,
    };

    Ok(ServiceSet {
        transcription: Arc::new(Guarded::new(
            "transcription",
            transcription,
            services.transcription.timeout(),
            breaker,
        )),
        vision: Arc::new(Guarded::new(
            "vision",
            vision,
            services.vision.timeout(),
            breaker,
        )),
        generator,
        cultural,
        gateway: Arc::new(Guarded::new(
            "marketplace",
            gateway,
            services.marketplace.timeout(),
            breaker,
        )),
    })
}
