use std::path::PathBuf;
use thiserror::Error;

use crate::catalog::{MessageError, TransitionError};

#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Record store error: {0}")]
    Store(#[from] StoreError),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] crate::pipeline::PipelineError),

    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),

    #[error("Invalid queue message: {0}")]
    Message(#[from] MessageError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Schema validation failed: {errors}")]
    SchemaValidation { errors: String },

    #[error("Invalid endpoint for service '{service}': {reason}")]
    InvalidEndpoint { service: String, reason: String },

    #[error("Invalid taxonomy override '{key}': {reason}")]
    InvalidTaxonomy { key: String, reason: String },

    #[error("Credential for service '{service}' could not be resolved: {source}")]
    Credential {
        service: String,
        #[source]
        source: crate::secrets::SecretError,
    },
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error(transparent)]
    Database(#[from] crate::db::DatabaseError),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Lease on record {tracking_id} is not held by {owner}")]
    LeaseLost { tracking_id: String, owner: String },

    #[error("Record {0} kept changing concurrently; giving up")]
    Contended(String),

    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error("Failed to encode column '{column}': {source}")]
    Encode {
        column: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Failed to spawn worker: {0}")]
    SpawnFailed(String),

    #[error("Worker channel closed unexpectedly")]
    ChannelClosed,

    #[error("Failed to build async runtime: {0}")]
    Runtime(#[source] std::io::Error),
}

pub type Result<T> = std::result::Result<T, OrchestratorError>;
