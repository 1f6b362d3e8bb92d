use std::time::Duration;

use crate::catalog::QueueMessage;
use crate::pipeline::{EntryReport, PipelineError};

/// One processed queue message, as reported back by a worker.
#[derive(Debug)]
pub struct WorkResult {
    pub worker_id: usize,
    pub tracking_id: String,
    pub result: Result<EntryReport, PipelineError>,
}

impl WorkResult {
    pub fn success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Batch draining knobs, copied from the `batch` config section.
#[derive(Debug, Clone)]
pub struct BatchSettings {
    pub threshold: usize,
    pub max_size: usize,
    pub parallelism: usize,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            threshold: 16,
            max_size: 8,
            parallelism: 4,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PoolSettings {
    pub worker_count: usize,
    pub batch: BatchSettings,
    /// How long an idle worker waits before re-checking for shutdown.
    pub poll_interval: Duration,
    /// Time between sweeps for records with an expired lease.
    pub sweep_interval: Duration,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            worker_count: num_cpus::get(),
            batch: BatchSettings::default(),
            poll_interval: Duration::from_millis(100),
            sweep_interval: Duration::from_secs(300),
        }
    }
}

impl PoolSettings {
    pub fn from_config(config: &crate::config::Config) -> Self {
        Self {
            worker_count: config.workers.count,
            batch: BatchSettings {
                threshold: config.batch.threshold,
                max_size: config.batch.max_size,
                parallelism: config.batch.parallelism,
            },
            sweep_interval: config.lease_ttl(),
            ..Default::default()
        }
    }
}

/// What a worker picked up from the queues.
pub(crate) enum Next {
    Message(QueueMessage),
    Idle,
    Closed,
}
