use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::adapters::BreakerSettings;
use crate::catalog::LanguageCode;
use crate::extract::ExtractorSettings;
use crate::mapping::MappingLimits;
use crate::secrets::CredentialSource;
use crate::submission::RetryPolicy;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    pub version: String,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub workers: WorkersConfig,
    #[serde(default = "default_lease_ttl_secs")]
    pub lease_ttl_secs: u64,
    /// Attempts per run for the ASR and vision stages.
    #[serde(default = "default_stage_max_attempts")]
    pub stage_max_attempts: u32,
    #[serde(default)]
    pub batch: BatchConfig,
    pub services: ServicesConfig,
    #[serde(default)]
    pub breaker: BreakerConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub mapping: MappingConfig,
    #[serde(default)]
    pub cultural_cache: CulturalCacheConfig,
    #[serde(default = "default_supported_languages")]
    pub supported_languages: Vec<LanguageCode>,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

fn default_lease_ttl_secs() -> u64 {
    300
}

fn default_stage_max_attempts() -> u32 {
    2
}

fn default_event_capacity() -> usize {
    256
}

pub fn default_supported_languages() -> Vec<LanguageCode> {
    vec![
        LanguageCode::Hindi,
        LanguageCode::Telugu,
        LanguageCode::Tamil,
        LanguageCode::Bengali,
        LanguageCode::Marathi,
        LanguageCode::Gujarati,
        LanguageCode::Kannada,
        LanguageCode::Malayalam,
        LanguageCode::Punjabi,
        LanguageCode::Odia,
    ]
}

impl Config {
    pub fn lease_ttl(&self) -> Duration {
        Duration::from_secs(self.lease_ttl_secs)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseConfig {
    /// SQLite file. Defaults to `~/.catalog-orchestrator/data/records.db`,
    /// or `./records.db` without a home directory.
    #[serde(default)]
    pub path: Option<String>,
}

impl DatabaseConfig {
    pub fn resolved_path(&self) -> PathBuf {
        match &self.path {
            Some(path) => PathBuf::from(path),
            None => crate::db::default_database_path()
                .unwrap_or_else(|| PathBuf::from("records.db")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkersConfig {
    #[serde(default = "default_worker_count")]
    pub count: usize,
    /// Prefix of the lease owner ids this process uses.
    #[serde(default = "default_owner_prefix")]
    pub owner_prefix: String,
}

fn default_worker_count() -> usize {
    num_cpus::get()
}

fn default_owner_prefix() -> String {
    "catalog-worker".to_string()
}

impl Default for WorkersConfig {
    fn default() -> Self {
        Self {
            count: default_worker_count(),
            owner_prefix: default_owner_prefix(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchConfig {
    /// Queued messages at or above which a worker drains a batch.
    #[serde(default = "default_batch_threshold")]
    pub threshold: usize,
    #[serde(default = "default_batch_size")]
    pub max_size: usize,
    #[serde(default = "default_batch_parallelism")]
    pub parallelism: usize,
}

fn default_batch_threshold() -> usize {
    16
}

fn default_batch_size() -> usize {
    8
}

fn default_batch_parallelism() -> usize {
    4
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            threshold: default_batch_threshold(),
            max_size: default_batch_size(),
            parallelism: default_batch_parallelism(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServicesConfig {
    pub transcription: ServiceConfig,
    pub vision: ServiceConfig,
    #[serde(default)]
    pub description_generator: Option<ServiceConfig>,
    #[serde(default)]
    pub cultural_knowledge: Option<ServiceConfig>,
    pub marketplace: ServiceConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceConfig {
    pub endpoint: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(flatten)]
    pub credentials: CredentialSource,
}

fn default_timeout_secs() -> u64 {
    30
}

impl ServiceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakerConfig {
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,
}

fn default_failure_threshold() -> u32 {
    5
}

fn default_window_secs() -> u64 {
    60
}

fn default_cooldown_secs() -> u64 {
    60
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            window_secs: default_window_secs(),
            cooldown_secs: default_cooldown_secs(),
        }
    }
}

impl BreakerConfig {
    pub fn settings(&self) -> BreakerSettings {
        BreakerSettings {
            failure_threshold: self.failure_threshold,
            window: Duration::from_secs(self.window_secs),
            cooldown: Duration::from_secs(self.cooldown_secs),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

fn default_max_attempts() -> u32 {
    5
}

fn default_initial_backoff_ms() -> u64 {
    1_000
}

fn default_multiplier() -> f64 {
    2.0
}

fn default_max_backoff_ms() -> u64 {
    16_000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            multiplier: default_multiplier(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            initial_backoff: Duration::from_millis(self.initial_backoff_ms),
            multiplier: self.multiplier,
            max_backoff: Duration::from_millis(self.max_backoff_ms),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingConfig {
    #[serde(default = "default_max_name_chars")]
    pub max_name_chars: usize,
    #[serde(default = "default_max_short_desc_chars")]
    pub max_short_desc_chars: usize,
    #[serde(default = "default_max_long_desc_chars")]
    pub max_long_desc_chars: usize,
    /// Extra `category → categoryId` entries, curated by operators.
    #[serde(default)]
    pub taxonomy_overrides: BTreeMap<String, String>,
}

fn default_max_name_chars() -> usize {
    100
}

fn default_max_short_desc_chars() -> usize {
    500
}

fn default_max_long_desc_chars() -> usize {
    4_000
}

impl Default for MappingConfig {
    fn default() -> Self {
        Self {
            max_name_chars: default_max_name_chars(),
            max_short_desc_chars: default_max_short_desc_chars(),
            max_long_desc_chars: default_max_long_desc_chars(),
            taxonomy_overrides: BTreeMap::new(),
        }
    }
}

impl MappingConfig {
    pub fn limits(&self) -> MappingLimits {
        MappingLimits {
            max_name_chars: self.max_name_chars,
            max_short_desc_chars: self.max_short_desc_chars,
            max_long_desc_chars: self.max_long_desc_chars,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CulturalCacheConfig {
    #[serde(default = "default_cache_ttl_secs")]
    pub ttl_secs: u64,
    #[serde(default = "default_cache_capacity")]
    pub capacity: u64,
}

fn default_cache_ttl_secs() -> u64 {
    3_600
}

fn default_cache_capacity() -> u64 {
    10_000
}

impl Default for CulturalCacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_cache_ttl_secs(),
            capacity: default_cache_capacity(),
        }
    }
}

impl CulturalCacheConfig {
    pub fn extractor_settings(&self) -> ExtractorSettings {
        ExtractorSettings {
            cultural_cache_ttl: Duration::from_secs(self.ttl_secs),
            cultural_cache_capacity: self.capacity,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::Text,
        }
    }
}
