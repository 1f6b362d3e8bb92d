pub mod adapters;
pub mod catalog;
pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod extract;
pub mod logging;
pub mod mapping;
pub mod pipeline;
pub mod sanitize;
pub mod secrets;
pub mod store;
pub mod submission;
pub mod time;
pub mod worker;

pub use adapters::{AdapterError, BreakerSettings, Guarded, ServiceSet};
pub use catalog::{
    CatalogProcessingRecord, ErrorCategory, ErrorDetails, LanguageCode, MarketplaceCatalogItem,
    Priority, QueueMessage, RecordOutcome, Stage, StageStatus,
};
pub use config::{load_config, Config};
pub use db::Database;
pub use error::{ConfigError, OrchestratorError, Result, StoreError, WorkerError};
pub use events::{EventSink, LifecycleBroadcaster, LifecycleEvent};
pub use pipeline::{EntryOutcome, EntryReport, Orchestrator, PipelineConfig, PipelineError};
pub use store::{AuditEntry, Lease, RecordStore, StatusSnapshot};
pub use worker::{PoolSettings, WorkResult, WorkerPool};
