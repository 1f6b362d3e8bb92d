use crate::catalog::LanguageCode;
use crate::config::schema::default_supported_languages;
use crate::config::Config;
use crate::error::ConfigError;
use crate::extract::ExtractorSettings;
use crate::mapping::SchemaMapper;
use crate::submission::RetryPolicy;

/// Everything the orchestrator needs from the config file besides the
/// services and the store.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Prefix of the lease owner ids; each entry run appends a unique suffix.
    pub owner_prefix: String,
    pub stage_max_attempts: u32,
    pub supported_languages: Vec<LanguageCode>,
    pub retry: RetryPolicy,
    pub extractor: ExtractorSettings,
    pub mapper: SchemaMapper,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            owner_prefix: "catalog-worker".to_string(),
            stage_max_attempts: 2,
            supported_languages: default_supported_languages(),
            retry: RetryPolicy::default(),
            extractor: ExtractorSettings::default(),
            mapper: SchemaMapper::default(),
        }
    }
}

impl PipelineConfig {
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        Ok(Self {
            owner_prefix: config.workers.owner_prefix.clone(),
            stage_max_attempts: config.stage_max_attempts.max(1),
            supported_languages: config.supported_languages.clone(),
            retry: config.retry.policy(),
            extractor: config.cultural_cache.extractor_settings(),
            mapper: SchemaMapper::from_overrides(
                &config.mapping.taxonomy_overrides,
                config.mapping.limits(),
            )?,
        })
    }
}
