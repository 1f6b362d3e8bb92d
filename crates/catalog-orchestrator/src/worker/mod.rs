pub mod job;
pub mod pool;

pub use job::{BatchSettings, PoolSettings, WorkResult};
pub use pool::WorkerPool;

// Re-export crossbeam_channel for use in main
pub use crossbeam_channel;
