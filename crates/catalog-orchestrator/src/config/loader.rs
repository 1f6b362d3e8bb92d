use std::path::Path;

use reqwest::Url;

use crate::config::schema::{Config, ServiceConfig};
use crate::error::ConfigError;
use crate::mapping::Taxonomy;

const SCHEMA_JSON: &str = include_str!("../../schema/config-v1.json");

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error", "off"];

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let json_value: serde_json::Value = serde_json::from_str(content)?;

    validate_schema(&json_value)?;

    let config: Config = serde_json::from_value(json_value)?;

    validate_config(&config)?;

    Ok(config)
}

fn validate_schema(json_value: &serde_json::Value) -> Result<(), ConfigError> {
    let schema: serde_json::Value =
        serde_json::from_str(SCHEMA_JSON).map_err(|e| ConfigError::Validation {
            message: format!("Invalid embedded schema JSON: {}", e),
        })?;

    let validator = jsonschema::validator_for(&schema).map_err(|e| ConfigError::Validation {
        message: format!("Failed to compile JSON schema: {}", e),
    })?;

    let error_messages: Vec<String> = validator
        .iter_errors(json_value)
        .map(|e| e.to_string())
        .collect();
    if !error_messages.is_empty() {
        return Err(ConfigError::SchemaValidation {
            errors: error_messages.join("; "),
        });
    }

    Ok(())
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.version != "1.0" {
        return Err(ConfigError::Validation {
            message: format!("Unsupported config version: {}", config.version),
        });
    }

    if config.workers.count == 0 {
        return Err(ConfigError::Validation {
            message: "workers.count must be at least 1".to_string(),
        });
    }
    if config.batch.parallelism == 0 || config.batch.max_size == 0 {
        return Err(ConfigError::Validation {
            message: "batch.parallelism and batch.maxSize must be at least 1".to_string(),
        });
    }
    if config.retry.max_backoff_ms < config.retry.initial_backoff_ms {
        return Err(ConfigError::Validation {
            message: "retry.maxBackoffMs must not be below retry.initialBackoffMs".to_string(),
        });
    }
    if config.supported_languages.is_empty() {
        return Err(ConfigError::Validation {
            message: "supportedLanguages must not be empty".to_string(),
        });
    }
    if !LOG_LEVELS.contains(&config.logging.level.to_lowercase().as_str()) {
        return Err(ConfigError::Validation {
            message: format!("Unknown log level: {}", config.logging.level),
        });
    }

    let services = &config.services;
    validate_service("transcription", &services.transcription)?;
    validate_service("vision", &services.vision)?;
    validate_service("marketplace", &services.marketplace)?;
    if let Some(generator) = &services.description_generator {
        validate_service("descriptionGenerator", generator)?;
    }
    if let Some(cultural) = &services.cultural_knowledge {
        validate_service("culturalKnowledge", cultural)?;
    }

    Taxonomy::with_overrides(&config.mapping.taxonomy_overrides)?;

    Ok(())
}

fn validate_service(name: &str, service: &ServiceConfig) -> Result<(), ConfigError> {
    let url = Url::parse(&service.endpoint).map_err(|e| ConfigError::InvalidEndpoint {
        service: name.to_string(),
        reason: e.to_string(),
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidEndpoint {
            service: name.to_string(),
            reason: format!("unsupported scheme '{}'", url.scheme()),
        });
    }
    if service.timeout_secs == 0 {
        return Err(ConfigError::Validation {
            message: format!("services.{}.timeoutSecs must be at least 1", name),
        });
    }
    Ok(())
}
