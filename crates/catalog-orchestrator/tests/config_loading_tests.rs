//! Table-driven tests for configuration loading and wiring.

use std::sync::Arc;

use serial_test::serial;
use tempfile::TempDir;

use catalog_orchestrator::adapters::http::build_services;
use catalog_orchestrator::config::{load_config, load_config_from_str};
use catalog_orchestrator::{
    ConfigError, Database, LifecycleBroadcaster, Orchestrator, PipelineConfig, PoolSettings,
    RecordStore,
};

/// Represents a single config loading test case.
struct ConfigTestCase {
    /// Test case name for identification.
    name: &'static str,
    /// The config JSON content to test.
    config_json: &'static str,
    /// Whether loading should succeed.
    should_succeed: bool,
    /// Expected error substring (if should_succeed is false).
    expected_error: Option<&'static str>,
}

const CONFIG_TESTS: &[ConfigTestCase] = &[
    ConfigTestCase {
        name: "valid_minimal",
        config_json: r#"{
            "version": "1.0",
            "services": {
                "transcription": { "endpoint": "http://asr:8080" },
                "vision": { "endpoint": "http://vision:8080" },
                "marketplace": { "endpoint": "https://gateway.example.com" }
            }
        }"#,
        should_succeed: true,
        expected_error: None,
    },
    ConfigTestCase {
        name: "valid_with_enrichment_and_overrides",
        config_json: r#"{
            "version": "1.0",
            "services": {
                "transcription": { "endpoint": "http://asr:8080", "timeoutSecs": 45 },
                "vision": { "endpoint": "http://vision:8080" },
                "descriptionGenerator": { "endpoint": "http://llm:9000" },
                "culturalKnowledge": { "endpoint": "http://culture:9100" },
                "marketplace": { "endpoint": "https://gateway.example.com", "apiKey": "k-123" }
            },
            "mapping": {
                "maxNameChars": 80,
                "taxonomyOverrides": { "pochampally ikat": "fashion-ethnic-sarees-ikat" }
            },
            "supportedLanguages": ["hi", "te", "en"],
            "logging": { "level": "debug", "format": "json" }
        }"#,
        should_succeed: true,
        expected_error: None,
    },
    ConfigTestCase {
        name: "missing_services",
        config_json: r#"{ "version": "1.0" }"#,
        should_succeed: false,
        expected_error: Some("Schema validation failed"),
    },
    ConfigTestCase {
        name: "wrong_version",
        config_json: r#"{
            "version": "2.0",
            "services": {
                "transcription": { "endpoint": "http://asr:8080" },
                "vision": { "endpoint": "http://vision:8080" },
                "marketplace": { "endpoint": "https://gateway.example.com" }
            }
        }"#,
        should_succeed: false,
        expected_error: Some("Schema validation failed"),
    },
    ConfigTestCase {
        name: "ftp_endpoint",
        config_json: r#"{
            "version": "1.0",
            "services": {
                "transcription": { "endpoint": "ftp://asr:21" },
                "vision": { "endpoint": "http://vision:8080" },
                "marketplace": { "endpoint": "https://gateway.example.com" }
            }
        }"#,
        should_succeed: false,
        expected_error: Some("transcription"),
    },
    ConfigTestCase {
        name: "zero_workers",
        config_json: r#"{
            "version": "1.0",
            "workers": { "count": 0 },
            "services": {
                "transcription": { "endpoint": "http://asr:8080" },
                "vision": { "endpoint": "http://vision:8080" },
                "marketplace": { "endpoint": "https://gateway.example.com" }
            }
        }"#,
        should_succeed: false,
        expected_error: None,
    },
    ConfigTestCase {
        name: "unsupported_language",
        config_json: r#"{
            "version": "1.0",
            "supportedLanguages": ["fr"],
            "services": {
                "transcription": { "endpoint": "http://asr:8080" },
                "vision": { "endpoint": "http://vision:8080" },
                "marketplace": { "endpoint": "https://gateway.example.com" }
            }
        }"#,
        should_succeed: false,
        expected_error: None,
    },
];

#[test]
fn test_config_cases() {
    for case in CONFIG_TESTS {
        let result = load_config_from_str(case.config_json);
        match (case.should_succeed, &result) {
            (true, Ok(_)) => {}
            (true, Err(e)) => panic!("{}: expected success, got {}", case.name, e),
            (false, Ok(_)) => panic!("{}: expected failure", case.name),
            (false, Err(e)) => {
                if let Some(expected) = case.expected_error {
                    assert!(
                        e.to_string().contains(expected),
                        "{}: error '{}' does not mention '{}'",
                        case.name,
                        e,
                        expected
                    );
                }
            }
        }
    }
}

fn write_config(dir: &TempDir, marketplace: &str) -> std::path::PathBuf {
    let db_path = dir.path().join("data").join("records.db");
    let json = format!(
        r#"{{
            "version": "1.0",
            "database": {{ "path": {db} }},
            "workers": {{ "count": 2, "ownerPrefix": "node-a" }},
            "stageMaxAttempts": 3,
            "batch": {{ "threshold": 10, "maxSize": 5, "parallelism": 3 }},
            "services": {{
                "transcription": {{ "endpoint": "http://asr:8080" }},
                "vision": {{ "endpoint": "http://vision:8080" }},
                "marketplace": {marketplace}
            }},
            "eventCapacity": 32
        }}"#,
        db = serde_json::to_string(&db_path.to_string_lossy()).unwrap(),
        marketplace = marketplace,
    );
    let path = dir.path().join("config.json");
    std::fs::write(&path, json).unwrap();
    path
}

#[test]
fn test_config_file_wires_a_working_orchestrator() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        r#"{ "endpoint": "https://gateway.example.com", "apiKey": "inline-key" }"#,
    );

    let config = load_config(&path).unwrap();
    let pipeline = PipelineConfig::from_config(&config).unwrap();
    assert_eq!(pipeline.owner_prefix, "node-a");
    assert_eq!(pipeline.stage_max_attempts, 3);

    let pool = PoolSettings::from_config(&config);
    assert_eq!(pool.worker_count, 2);
    assert_eq!(pool.batch.threshold, 10);
    assert_eq!(pool.batch.max_size, 5);
    assert_eq!(pool.batch.parallelism, 3);
    assert_eq!(pool.sweep_interval, config.lease_ttl());

    let db = Database::open(&config.database.resolved_path()).unwrap();
    assert!(dir.path().join("data").join("records.db").exists());

    let services = build_services(&config.services, config.breaker.settings()).unwrap();
    assert!(services.generator.is_none());
    assert!(services.cultural.is_none());

    let orchestrator = Orchestrator::new(
        pipeline,
        RecordStore::new(db, config.lease_ttl()),
        services,
        Arc::new(LifecycleBroadcaster::new(config.event_capacity)),
    );
    assert!(orchestrator.get_status("nothing-yet").unwrap().is_none());
}

#[test]
#[serial]
fn test_marketplace_key_from_environment() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        r#"{ "endpoint": "https://gateway.example.com", "apiKeyEnvVar": "CATALOG_TEST_MARKETPLACE_KEY" }"#,
    );
    let config = load_config(&path).unwrap();

    std::env::remove_var("CATALOG_TEST_MARKETPLACE_KEY");
    let err = build_services(&config.services, config.breaker.settings())
        .err()
        .expect("unset variable must not resolve");
    assert!(matches!(err, ConfigError::Credential { ref service, .. } if service == "marketplace"));

    std::env::set_var("CATALOG_TEST_MARKETPLACE_KEY", "from-env");
    let services = build_services(&config.services, config.breaker.settings());
    std::env::remove_var("CATALOG_TEST_MARKETPLACE_KEY");
    assert!(services.is_ok());
}
