pub mod config;
pub mod context;
pub mod error;
pub mod runner;

pub use config::PipelineConfig;
pub use context::{EntryContext, EntryOutcome, EntryReport};
pub use error::PipelineError;
pub use runner::Orchestrator;
