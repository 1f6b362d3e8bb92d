use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, select, unbounded, Receiver, Sender};
use log::{debug, error, info, warn};

use crate::catalog::{Priority, QueueMessage};
use crate::error::WorkerError;
use crate::pipeline::{EntryReport, Orchestrator, PipelineError};

use super::job::{BatchSettings, Next, PoolSettings, WorkResult};

/// Fixed pool of OS threads, each with its own single-threaded tokio
/// runtime, all sharing one [`Orchestrator`].
///
/// High-priority messages sit on their own channel and are always taken
/// first. Workers hold no record state: everything lives in the store.
/// A sweeper thread resumes records whose lease ran out, at start and then
/// once per `sweep_interval`.
pub struct WorkerPool {
    high_sender: Sender<QueueMessage>,
    normal_sender: Sender<QueueMessage>,
    result_receiver: Receiver<WorkResult>,
    workers: Vec<JoinHandle<()>>,
    sweeper: Option<JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
    stop_sweep: Arc<AtomicBool>,
}

impl WorkerPool {
    pub fn new(orchestrator: Arc<Orchestrator>, settings: PoolSettings) -> Result<Self, WorkerError> {
        if settings.worker_count == 0 {
            return Err(WorkerError::SpawnFailed(
                "worker_count must be > 0".to_string(),
            ));
        }

        let (high_sender, high_receiver) = unbounded::<QueueMessage>();
        let (normal_sender, normal_receiver) = unbounded::<QueueMessage>();
        let (result_sender, result_receiver) = bounded::<WorkResult>(settings.worker_count * 4);
        let shutdown = Arc::new(AtomicBool::new(false));
        let stop_sweep = Arc::new(AtomicBool::new(false));

        let mut workers = Vec::with_capacity(settings.worker_count);
        for worker_id in 0..settings.worker_count {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .map_err(WorkerError::Runtime)?;
            let worker = Worker {
                id: worker_id,
                high: high_receiver.clone(),
                normal: normal_receiver.clone(),
                results: result_sender.clone(),
                shutdown: Arc::clone(&shutdown),
                orchestrator: Arc::clone(&orchestrator),
                batch: settings.batch.clone(),
                poll_interval: settings.poll_interval,
            };

            let handle = thread::Builder::new()
                .name(format!("catalog-worker-{}", worker_id))
                .spawn(move || worker.run(runtime))
                .map_err(|e| WorkerError::SpawnFailed(e.to_string()))?;
            workers.push(handle);
        }

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(WorkerError::Runtime)?;
        let sweeper = Sweeper {
            id: settings.worker_count,
            results: result_sender,
            stop: Arc::clone(&stop_sweep),
            orchestrator,
            interval: settings.sweep_interval,
            poll_interval: settings.poll_interval,
        };
        let sweeper = thread::Builder::new()
            .name("catalog-sweeper".to_string())
            .spawn(move || sweeper.run(runtime))
            .map_err(|e| WorkerError::SpawnFailed(e.to_string()))?;

        info!("Started {} workers", settings.worker_count);

        Ok(Self {
            high_sender,
            normal_sender,
            result_receiver,
            workers,
            sweeper: Some(sweeper),
            shutdown,
            stop_sweep,
        })
    }

    pub fn submit(&self, message: QueueMessage) -> Result<(), WorkerError> {
        if self.shutdown.load(Ordering::Relaxed) {
            return Err(WorkerError::ChannelClosed);
        }

        let sender = match message.priority {
            Priority::High => &self.high_sender,
            Priority::Normal | Priority::Low => &self.normal_sender,
        };
        sender.send(message).map_err(|_| WorkerError::ChannelClosed)
    }

    /// Messages waiting to be picked up.
    pub fn queued(&self) -> usize {
        self.high_sender.len() + self.normal_sender.len()
    }

    /// A handle on the result channel. It disconnects once every worker
    /// has stopped, so a consumer thread can outlive [`WorkerPool::wait`].
    pub fn results(&self) -> Receiver<WorkResult> {
        self.result_receiver.clone()
    }

    pub fn try_recv_result(&self) -> Option<WorkResult> {
        self.result_receiver.try_recv().ok()
    }

    pub fn recv_result(&self) -> Option<WorkResult> {
        self.result_receiver.recv().ok()
    }

    pub fn recv_result_timeout(&self, timeout: Duration) -> Option<WorkResult> {
        self.result_receiver.recv_timeout(timeout).ok()
    }

    /// Refuses new messages. Workers finish everything already queued and
    /// then stop.
    pub fn shutdown(&self) {
        info!("Shutting down worker pool...");
        self.shutdown.store(true, Ordering::Relaxed);
        self.stop_sweep.store(true, Ordering::Relaxed);
    }

    /// Closes the queues, lets workers drain them and joins every thread.
    pub fn wait(mut self) {
        self.stop_sweep.store(true, Ordering::Relaxed);
        if let Some(sweeper) = self.sweeper.take() {
            if let Err(e) = sweeper.join() {
                error!("Sweeper panicked: {:?}", e);
            }
        }

        drop(self.high_sender);
        drop(self.normal_sender);

        for (i, worker) in self.workers.into_iter().enumerate() {
            if let Err(e) = worker.join() {
                error!("Worker {} panicked: {:?}", i, e);
            } else {
                debug!("Worker {} finished", i);
            }
        }

        info!("All workers have stopped");
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }
}

struct Worker {
    id: usize,
    high: Receiver<QueueMessage>,
    normal: Receiver<QueueMessage>,
    results: Sender<WorkResult>,
    shutdown: Arc<AtomicBool>,
    orchestrator: Arc<Orchestrator>,
    batch: BatchSettings,
    poll_interval: Duration,
}

impl Worker {
    fn run(self, runtime: tokio::runtime::Runtime) {
        debug!("Worker {} started", self.id);

        loop {
            let next = if self.shutdown.load(Ordering::Relaxed) {
                self.next_queued()
            } else {
                self.next()
            };

            let message = match next {
                Next::Message(message) => message,
                Next::Idle => continue,
                Next::Closed => {
                    debug!("Worker {} has nothing left to do", self.id);
                    break;
                }
            };

            let sent = if self.high.len() + self.normal.len() + 1 >= self.batch.threshold {
                let batch = self.drain_batch(message);
                debug!("Worker {} draining a batch of {}", self.id, batch.len());
                let results = runtime.block_on(
                    self.orchestrator
                        .process_batch(batch, self.batch.parallelism),
                );
                results
                    .into_iter()
                    .all(|(tracking_id, result)| self.report(tracking_id, result))
            } else {
                debug!("Worker {} processing {}", self.id, message.tracking_id);
                let result = runtime.block_on(self.orchestrator.process_entry(&message));
                self.report(message.tracking_id, result)
            };

            if !sent {
                break;
            }
        }

        debug!("Worker {} stopped", self.id);
    }

    /// High priority first, then whichever queue yields a message.
    fn next(&self) -> Next {
        if let Ok(message) = self.high.try_recv() {
            return Next::Message(message);
        }

        select! {
            recv(self.high) -> message => match message {
                Ok(message) => Next::Message(message),
                Err(_) => self.last_from(&self.normal),
            },
            recv(self.normal) -> message => match message {
                Ok(message) => Next::Message(message),
                Err(_) => self.last_from(&self.high),
            },
            default(self.poll_interval) => Next::Idle,
        }
    }

    /// After shutdown: whatever is still queued, without waiting for more.
    fn next_queued(&self) -> Next {
        match self.high.try_recv().or_else(|_| self.normal.try_recv()) {
            Ok(message) => Next::Message(message),
            Err(_) => Next::Closed,
        }
    }

    /// The queues close together; drain what is left in `other`.
    fn last_from(&self, other: &Receiver<QueueMessage>) -> Next {
        match other.try_recv() {
            Ok(message) => Next::Message(message),
            Err(_) => Next::Closed,
        }
    }

    fn drain_batch(&self, first: QueueMessage) -> Vec<QueueMessage> {
        let mut batch = vec![first];
        while batch.len() < self.batch.max_size {
            match self.high.try_recv().or_else(|_| self.normal.try_recv()) {
                Ok(message) => batch.push(message),
                Err(_) => break,
            }
        }
        batch
    }

    fn report(&self, tracking_id: String, result: Result<EntryReport, PipelineError>) -> bool {
        send_result(&self.results, self.id, tracking_id, result)
    }
}

/// Most records a single sweep picks up.
const SWEEP_LIMIT: u32 = 64;

/// Resumes records left behind by a crashed worker or a lost lease.
struct Sweeper {
    id: usize,
    results: Sender<WorkResult>,
    stop: Arc<AtomicBool>,
    orchestrator: Arc<Orchestrator>,
    interval: Duration,
    poll_interval: Duration,
}

impl Sweeper {
    fn run(self, runtime: tokio::runtime::Runtime) {
        debug!("Sweeper started");
        let mut next_sweep = Instant::now();

        while !self.stop.load(Ordering::Relaxed) {
            if Instant::now() >= next_sweep {
                if !self.sweep(&runtime) {
                    break;
                }
                next_sweep = Instant::now() + self.interval;
            }
            thread::sleep(self.poll_interval);
        }

        debug!("Sweeper stopped");
    }

    /// Returns `false` once results can no longer be delivered.
    fn sweep(&self, runtime: &tokio::runtime::Runtime) -> bool {
        let stalled = match self.orchestrator.store().resumable(SWEEP_LIMIT) {
            Ok(stalled) => stalled,
            Err(e) => {
                warn!("Lease sweep failed: {}", e);
                return true;
            }
        };
        if !stalled.is_empty() {
            info!("Resuming {} stalled records", stalled.len());
        }

        for tracking_id in stalled {
            if self.stop.load(Ordering::Relaxed) {
                break;
            }
            let result = runtime.block_on(self.orchestrator.process_record(&tracking_id));
            if !send_result(&self.results, self.id, tracking_id, result) {
                return false;
            }
        }
        true
    }
}

fn send_result(
    results: &Sender<WorkResult>,
    worker_id: usize,
    tracking_id: String,
    result: Result<EntryReport, PipelineError>,
) -> bool {
    let work = WorkResult {
        worker_id,
        tracking_id,
        result,
    };
    if let Err(e) = results.send(work) {
        error!("Worker {} failed to send result: {}", worker_id, e);
        return false;
    }
    true
}
