//! `catalog-worker <config.json>`
//!
//! Reads queue messages as JSON lines from stdin and processes them with a
//! worker pool until stdin closes or the process is interrupted.

use std::io::BufRead;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use log::{error, info, warn};

use catalog_orchestrator::adapters::http::build_services;
use catalog_orchestrator::logging::init_logging;
use catalog_orchestrator::worker::crossbeam_channel::{unbounded, RecvTimeoutError};
use catalog_orchestrator::{
    load_config, Database, EntryOutcome, LifecycleBroadcaster, Orchestrator, OrchestratorError,
    PipelineConfig, PoolSettings, QueueMessage, RecordStore, WorkResult, WorkerPool,
};

fn main() {
    let Some(config_path) = std::env::args().nth(1).map(PathBuf::from) else {
        eprintln!("usage: catalog-worker <config.json>");
        std::process::exit(2);
    };

    if let Err(e) = run(config_path) {
        error!("{}", e);
        eprintln!("catalog-worker: {}", e);
        std::process::exit(1);
    }
}

fn run(config_path: PathBuf) -> Result<(), OrchestratorError> {
    let config = load_config(&config_path)?;

    if let Err(e) = init_logging(&config.logging.level, config.logging.format) {
        eprintln!("catalog-worker: {}", e);
    }

    let db_path = config.database.resolved_path();
    let db = Database::open(&db_path)?;
    let store = RecordStore::new(db, config.lease_ttl());

    let services = build_services(&config.services, config.breaker.settings())?;
    let events = Arc::new(LifecycleBroadcaster::new(config.event_capacity));
    let orchestrator = Arc::new(Orchestrator::new(
        PipelineConfig::from_config(&config)?,
        store,
        services,
        events,
    ));

    let pool = WorkerPool::new(Arc::clone(&orchestrator), PoolSettings::from_config(&config))?;

    let interrupted = Arc::new(AtomicBool::new(false));
    {
        let interrupted = Arc::clone(&interrupted);
        if let Err(e) = ctrlc::set_handler(move || {
            interrupted.store(true, Ordering::Relaxed);
        }) {
            warn!("Failed to install Ctrl-C handler: {}", e);
        }
    }

    let results = pool.results();
    let consumer = thread::Builder::new()
        .name("catalog-results".to_string())
        .spawn(move || {
            for result in results.iter() {
                log_result(&result);
            }
            info!("Result consumer shutting down");
        })
        .map_err(|e| catalog_orchestrator::WorkerError::SpawnFailed(e.to_string()))?;

    // stdin blocks, so it gets its own thread and hands lines over.
    let (line_tx, line_rx) = unbounded::<String>();
    thread::Builder::new()
        .name("catalog-stdin".to_string())
        .spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                match line {
                    Ok(line) => {
                        if line_tx.send(line).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!("Failed to read stdin: {}", e);
                        break;
                    }
                }
            }
        })
        .map_err(|e| catalog_orchestrator::WorkerError::SpawnFailed(e.to_string()))?;

    info!("Reading queue messages from stdin");

    loop {
        if interrupted.load(Ordering::Relaxed) {
            info!("Interrupted; finishing in-flight entries");
            pool.shutdown();
            break;
        }

        match line_rx.recv_timeout(Duration::from_millis(200)) {
            Ok(line) => {
                if line.trim().is_empty() {
                    continue;
                }
                match QueueMessage::from_json(&line) {
                    Ok(message) => {
                        if let Err(e) = pool.submit(message) {
                            error!("Failed to submit message: {}", e);
                        }
                    }
                    Err(e) => warn!("Dropping malformed queue message: {}", e),
                }
            }
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => {
                info!("Input closed; draining {} queued messages", pool.queued());
                break;
            }
        }
    }

    pool.wait();
    if consumer.join().is_err() {
        error!("Result consumer panicked");
    }

    Ok(())
}

fn log_result(result: &WorkResult) {
    match &result.result {
        Ok(report) => match &report.outcome {
            EntryOutcome::Finished {
                outcome,
                catalog_id,
            } => info!(
                "Entry {} finished as {} (catalog id: {})",
                result.tracking_id,
                outcome.as_str(),
                catalog_id.as_deref().unwrap_or("-")
            ),
            EntryOutcome::AlreadyFinished(outcome) => info!(
                "Entry {} was already {}",
                result.tracking_id,
                outcome.as_str()
            ),
            EntryOutcome::Busy => info!(
                "Entry {} is being processed by another worker",
                result.tracking_id
            ),
            EntryOutcome::LeaseLost => warn!(
                "Entry {} lost its lease on worker {}",
                result.tracking_id, result.worker_id
            ),
        },
        Err(e) => error!("Entry {} failed: {}", result.tracking_id, e),
    }
}
