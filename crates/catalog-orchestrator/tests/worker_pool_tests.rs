//! Worker pool tests: queue priority, batching and shutdown.

mod common;

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use catalog_orchestrator::worker::{BatchSettings, PoolSettings};
use catalog_orchestrator::{
    EntryOutcome, Priority, RecordOutcome, Stage, WorkResult, WorkerError, WorkerPool,
};

use common::harness::LEASE_TTL;
use common::{MessageBuilder, TestHarness};

const RESULT_TIMEOUT: Duration = Duration::from_secs(10);

fn settings(worker_count: usize, threshold: usize) -> PoolSettings {
    PoolSettings {
        worker_count,
        batch: BatchSettings {
            threshold,
            max_size: 8,
            parallelism: 4,
        },
        poll_interval: Duration::from_millis(10),
        sweep_interval: Duration::from_millis(50),
    }
}

fn collect(pool: &WorkerPool, n: usize) -> Vec<WorkResult> {
    (0..n)
        .map(|_| {
            pool.recv_result_timeout(RESULT_TIMEOUT)
                .expect("timed out waiting for a result")
        })
        .collect()
}

fn completed(result: &WorkResult) -> bool {
    matches!(
        result.result.as_ref().map(|r| &r.outcome),
        Ok(EntryOutcome::Finished {
            outcome: RecordOutcome::Completed,
            ..
        })
    )
}

#[test]
fn test_pool_requires_a_worker() {
    let harness = TestHarness::new();
    let result = WorkerPool::new(Arc::clone(&harness.orchestrator), settings(0, 16));
    assert!(matches!(result, Err(WorkerError::SpawnFailed(_))));
}

#[test]
fn test_pool_processes_every_message() {
    let harness = TestHarness::new();
    let pool = WorkerPool::new(Arc::clone(&harness.orchestrator), settings(2, 16)).unwrap();

    for i in 0..5 {
        pool.submit(MessageBuilder::new(&format!("pool-{}", i)).build())
            .unwrap();
    }

    let results = collect(&pool, 5);
    assert!(results.iter().all(completed), "{:?}", results);

    let mut ids: Vec<_> = results.iter().map(|r| r.tracking_id.clone()).collect();
    ids.sort();
    assert_eq!(ids, vec!["pool-0", "pool-1", "pool-2", "pool-3", "pool-4"]);

    pool.shutdown();
    pool.wait();
}

#[test]
fn test_single_result_then_nothing_pending() {
    let harness = TestHarness::new();
    let pool = WorkerPool::new(Arc::clone(&harness.orchestrator), settings(1, 16)).unwrap();

    pool.submit(MessageBuilder::new("solo").build()).unwrap();
    let result = pool.recv_result().expect("pool stopped before reporting");
    assert_eq!(result.tracking_id, "solo");
    assert!(result.success());
    assert_eq!(pool.queued(), 0);
    assert!(pool.try_recv_result().is_none());

    pool.shutdown();
    pool.wait();
}

#[test]
fn test_high_priority_jumps_the_queue() {
    let harness = TestHarness::new();
    harness.asr.set_delay(Duration::from_millis(100));
    let pool = WorkerPool::new(Arc::clone(&harness.orchestrator), settings(1, 64)).unwrap();

    pool.submit(MessageBuilder::new("normal-0").build()).unwrap();
    // Let the single worker pick up the first message.
    thread::sleep(Duration::from_millis(30));

    pool.submit(MessageBuilder::new("normal-1").build()).unwrap();
    pool.submit(MessageBuilder::new("normal-2").priority(Priority::Low).build())
        .unwrap();
    pool.submit(
        MessageBuilder::new("urgent")
            .priority(Priority::High)
            .build(),
    )
    .unwrap();

    let order: Vec<_> = collect(&pool, 4)
        .into_iter()
        .map(|r| r.tracking_id)
        .collect();
    assert_eq!(order, vec!["normal-0", "urgent", "normal-1", "normal-2"]);

    pool.shutdown();
    pool.wait();
}

#[test]
fn test_backlog_is_drained_in_batches() {
    let harness = TestHarness::new();
    harness.asr.set_delay(Duration::from_millis(50));
    let pool = WorkerPool::new(Arc::clone(&harness.orchestrator), settings(1, 3)).unwrap();

    for i in 0..6 {
        pool.submit(MessageBuilder::new(&format!("batch-{}", i)).build())
            .unwrap();
    }

    let results = collect(&pool, 6);
    assert!(results.iter().all(completed), "{:?}", results);
    for i in 0..6 {
        let rec = harness.record(&format!("batch-{}", i));
        assert_eq!(rec.outcome, RecordOutcome::Completed);
    }

    pool.shutdown();
    pool.wait();
}

#[test]
fn test_submit_after_shutdown_is_refused() {
    let harness = TestHarness::new();
    let pool = WorkerPool::new(Arc::clone(&harness.orchestrator), settings(1, 16)).unwrap();

    pool.shutdown();
    assert!(pool.is_shutdown());
    let err = pool.submit(MessageBuilder::new("late").build()).unwrap_err();
    assert!(matches!(err, WorkerError::ChannelClosed));

    pool.wait();
    assert!(harness.store().load("late").unwrap().is_none());
}

#[test]
fn test_wait_drains_queued_messages() {
    let harness = TestHarness::new();
    let pool = WorkerPool::new(Arc::clone(&harness.orchestrator), settings(2, 16)).unwrap();
    let results = pool.results();

    for i in 0..4 {
        pool.submit(MessageBuilder::new(&format!("drain-{}", i)).build())
            .unwrap();
    }
    let consumer = thread::spawn(move || results.iter().count());

    pool.wait();
    assert_eq!(consumer.join().unwrap(), 4);
}

#[test]
fn test_shutdown_still_processes_queued_messages() {
    let harness = TestHarness::new();
    harness.asr.set_delay(Duration::from_millis(30));
    let pool = WorkerPool::new(Arc::clone(&harness.orchestrator), settings(1, 64)).unwrap();
    let results = pool.results();

    for i in 0..4 {
        pool.submit(MessageBuilder::new(&format!("queued-{}", i)).build())
            .unwrap();
    }
    pool.shutdown();
    pool.wait();

    let done: Vec<WorkResult> = results.try_iter().collect();
    assert_eq!(done.len(), 4);
    assert!(done.iter().all(completed), "{:?}", done);
    for i in 0..4 {
        let rec = harness.record(&format!("queued-{}", i));
        assert_eq!(rec.outcome, RecordOutcome::Completed);
    }
}

#[test]
fn test_record_with_expired_lease_is_resumed() {
    let harness = TestHarness::new();
    let store = harness.store();
    store
        .create_if_absent(&MessageBuilder::new("abandoned").build())
        .unwrap();
    let lease = store
        .acquire_lease("abandoned", "crashed-worker")
        .unwrap()
        .unwrap();
    store
        .transition(&lease, |rec| {
            rec.outcome = RecordOutcome::InProgress;
            Ok(rec.begin_stage(Stage::Asr)?)
        })
        .unwrap();
    harness.advance(LEASE_TTL + Duration::from_secs(1));

    let pool = WorkerPool::new(Arc::clone(&harness.orchestrator), settings(1, 16)).unwrap();
    let result = pool
        .recv_result_timeout(RESULT_TIMEOUT)
        .expect("abandoned record was never resumed");
    assert_eq!(result.tracking_id, "abandoned");
    assert!(completed(&result), "{:?}", result);

    let rec = harness.record("abandoned");
    assert_eq!(rec.outcome, RecordOutcome::Completed);
    assert_eq!(rec.asr.attempts, 2);
    assert!(rec.lease_owner.is_none());

    pool.shutdown();
    pool.wait();
}
