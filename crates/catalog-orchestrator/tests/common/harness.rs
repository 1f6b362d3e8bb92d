//! Test harness for isolated orchestrator runs.
//!
//! The `TestHarness` struct provides:
//! - a SQLite record store in a temporary directory
//! - a manual clock shared by every orchestrator it builds
//! - scripted fakes for the five external services
//! - a subscribed lifecycle event receiver

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use tempfile::TempDir;
use tokio::sync::broadcast;

use catalog_orchestrator::adapters::{
    CulturalKnowledge, DescriptionGenerator, MarketplaceGateway, TranscriptionService,
    VisionService,
};
use catalog_orchestrator::catalog::{AsrResult, VisionResult};
use catalog_orchestrator::submission::RetryPolicy;
use catalog_orchestrator::time::ManualClock;
use catalog_orchestrator::{
    BreakerSettings, CatalogProcessingRecord, Database, Guarded, LifecycleBroadcaster,
    LifecycleEvent, Orchestrator, PipelineConfig, RecordStore, ServiceSet,
};

use super::builders::{saree_asr, saree_vision};
use super::fakes::{DownGenerator, EmptyCulture, FakeAsr, FakeGateway, FakeVision, Script};

pub const LEASE_TTL: Duration = Duration::from_secs(300);

/// Test harness providing an isolated orchestrator for integration tests.
pub struct TestHarness {
    /// Holds the database file; removed on drop.
    temp_dir: TempDir,
    pub db_path: PathBuf,
    pub clock: Arc<ManualClock>,
    pub asr: Arc<FakeAsr>,
    pub vision: Arc<FakeVision>,
    pub gateway: Arc<FakeGateway>,
    pub events: Arc<LifecycleBroadcaster>,
    pub config: PipelineConfig,
    pub orchestrator: Arc<Orchestrator>,
}

impl TestHarness {
    /// Every service answers the saree scenario successfully.
    pub fn new() -> Self {
        Self::with_services(
            Script::always(Ok(saree_asr())),
            Script::always(Ok(saree_vision())),
            FakeGateway::accepting(),
        )
    }

    pub fn with_services(
        asr: Script<AsrResult>,
        vision: Script<VisionResult>,
        gateway: FakeGateway,
    ) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let db_path = temp_dir.path().join("records.db");
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap(),
        ));

        let config = PipelineConfig {
            owner_prefix: "test-worker".to_string(),
            retry: RetryPolicy {
                max_attempts: 3,
                initial_backoff: Duration::from_millis(1),
                multiplier: 2.0,
                max_backoff: Duration::from_millis(4),
            },
            ..Default::default()
        };

        let asr = Arc::new(FakeAsr::new(asr));
        let vision = Arc::new(FakeVision { script: vision });
        let gateway = Arc::new(gateway);
        let events = Arc::new(LifecycleBroadcaster::new(512));
        let orchestrator = Arc::new(open_worker(
            &db_path,
            &clock,
            &config,
            service_set(&asr, &vision, &gateway),
            &events,
        ));

        Self {
            temp_dir,
            db_path,
            clock,
            asr,
            vision,
            gateway,
            events,
            config,
            orchestrator,
        }
    }

    /// Another orchestrator over the same database, clock and fakes, as a
    /// second worker process would see them.
    pub fn new_worker(&self) -> Orchestrator {
        open_worker(
            &self.db_path,
            &self.clock,
            &self.config,
            service_set(&self.asr, &self.vision, &self.gateway),
            &self.events,
        )
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.events.subscribe()
    }

    pub fn store(&self) -> &RecordStore {
        self.orchestrator.store()
    }

    pub fn record(&self, tracking_id: &str) -> CatalogProcessingRecord {
        self.store()
            .load(tracking_id)
            .expect("Failed to load record")
            .expect("Record does not exist")
    }

    pub fn advance(&self, by: Duration) {
        self.clock
            .advance(chrono::Duration::from_std(by).expect("duration out of range"));
    }
}

fn guarded<S: ?Sized>(name: &str, inner: Arc<S>) -> Arc<Guarded<S>> {
    Arc::new(Guarded::new(
        name,
        inner,
        Duration::from_secs(5),
        BreakerSettings::default(),
    ))
}

fn service_set(
    asr: &Arc<FakeAsr>,
    vision: &Arc<FakeVision>,
    gateway: &Arc<FakeGateway>,
) -> ServiceSet {
    let transcription: Arc<dyn TranscriptionService> = asr.clone();
    let vision: Arc<dyn VisionService> = vision.clone();
    let gateway: Arc<dyn MarketplaceGateway> = gateway.clone();
    let generator: Arc<dyn DescriptionGenerator> = Arc::new(DownGenerator);
    let cultural: Arc<dyn CulturalKnowledge> = Arc::new(EmptyCulture);

    ServiceSet {
        transcription: guarded("transcription", transcription),
        vision: guarded("vision", vision),
        generator: Some(guarded("description_generator", generator)),
        cultural: Some(guarded("cultural_knowledge", cultural)),
        gateway: guarded("marketplace", gateway),
    }
}

fn open_worker(
    db_path: &Path,
    clock: &Arc<ManualClock>,
    config: &PipelineConfig,
    services: ServiceSet,
    events: &Arc<LifecycleBroadcaster>,
) -> Orchestrator {
    let db = Database::open(db_path).expect("Failed to open record store");
    let store = RecordStore::with_clock(db, LEASE_TTL, clock.clone());
    Orchestrator::new(config.clone(), store, services, events.clone())
}

/// Drains every event received so far.
pub fn drain(rx: &mut broadcast::Receiver<LifecycleEvent>) -> Vec<LifecycleEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
