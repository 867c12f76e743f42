//! Orchestrator integration tests
//!
//! Full runs over a catalog against the scripted widget:
//! 1. Partial failure (one room never selectable)
//! 2. Transient driver failures recovered by retry
//! 3. Exhausted retries reported, not raised
//! 4. Nested concurrency bounds and property filtering
//! 5. Month lists in any order or with repeats
//! 6. Synchronization off the async worker thread

use std::sync::{Arc, Mutex};
use std::thread::ThreadId;
use std::time::Duration;

use calsync::error::Result;
use calsync::models::{AvailabilityRecord, CoverageEntry, ScrapeRange, TargetMonth};
use calsync::orchestrator::{Orchestrator, OrchestratorSettings};
use calsync::scraper::{Classifier, MonthWalker, TaskRunner};
use calsync::storage::{AvailabilityRepository, CatalogRepository, MockStore};
use calsync::utils::retry::RetryConfig;

use crate::common::{month, open_month, september_cells, Script, ScriptedFactory};

fn settings(property_concurrency: usize, room_concurrency: usize, retries: u32) -> OrchestratorSettings {
    OrchestratorSettings {
        property_concurrency,
        room_concurrency,
        batch_delay: Duration::from_millis(1),
        retry: RetryConfig::fixed(retries, 1),
    }
}

fn orchestrator(
    store: &Arc<MockStore>,
    factory: &Arc<ScriptedFactory>,
    settings: OrchestratorSettings,
) -> Orchestrator {
    Orchestrator::new(
        store.clone(),
        store.clone(),
        factory.clone(),
        TaskRunner::new(MonthWalker::new(24, Duration::ZERO), Classifier::default()),
        settings,
    )
}

fn september() -> Vec<TargetMonth> {
    vec![month("September 2025")]
}

fn factory_with(rooms: &[&str]) -> Arc<ScriptedFactory> {
    let script = Script::new(month("August 2025"), rooms);
    script.set_month(month("September 2025"), september_cells());
    Arc::new(ScriptedFactory::new(script))
}

#[tokio::test]
async fn test_one_unselectable_room_among_five() {
    let store = Arc::new(MockStore::new());
    let property = store.add_property("Harbor House", "harbor").unwrap();
    for (external_id, name) in [
        ("r1", "Single"),
        ("r2", "Double"),
        ("r3", "Twin"),
        ("ghost", "Retired Suite"),
        ("r5", "Family"),
    ] {
        store
            .add_room_type(property.id, external_id, name, 2)
            .unwrap();
    }
    let factory = factory_with(&["r1", "r2", "r3", "r5"]);

    let report = orchestrator(&store, &factory, settings(1, 2, 3))
        .run(&september(), None)
        .await
        .unwrap();

    assert_eq!(report.properties_processed, 1);
    assert_eq!(report.room_types_processed, 5);
    assert_eq!(report.tasks_succeeded, 4);
    assert_eq!(report.records_written, 4 * 3);
    assert_eq!(report.failures.len(), 1);

    let failure = &report.failures[0];
    assert_eq!(failure.property, "Harbor House");
    assert_eq!(failure.room.as_deref(), Some("Retired Suite"));
    assert_eq!(failure.attempts, 1);
    assert!(failure.reason.contains("ghost"));

    assert!(factory.peak() <= 2);
    assert_eq!(factory.live(), 0);
    assert!(!report.cancelled);
    assert!(report.finished_at.is_some());
}

#[tokio::test]
async fn test_transient_automation_failures_are_retried() {
    let store = Arc::new(MockStore::new());
    let property = store.add_property("Harbor House", "harbor").unwrap();
    let room = store.add_room_type(property.id, "dbl", "Double", 2).unwrap();
    let factory = factory_with(&["dbl"]);
    factory.script.fail_next_selections(2);

    let report = orchestrator(&store, &factory, settings(1, 1, 3))
        .run(&september(), None)
        .await
        .unwrap();

    assert_eq!(report.tasks_succeeded, 1);
    assert!(report.failures.is_empty());
    // Every attempt starts from a fresh session
    assert_eq!(factory.opened(), 3);
    assert_eq!(store.records(room.id, None).unwrap().len(), 3);
}

#[tokio::test]
async fn test_exhausted_retries_are_reported() {
    let store = Arc::new(MockStore::new());
    let property = store.add_property("Harbor House", "harbor").unwrap();
    store.add_room_type(property.id, "dbl", "Double", 2).unwrap();
    store.add_room_type(property.id, "twn", "Twin", 2).unwrap();
    let factory = factory_with(&["dbl", "twn"]);
    // Room types run one after another, so the first one absorbs all failures
    factory.script.fail_next_selections(3);

    let report = orchestrator(&store, &factory, settings(1, 1, 2))
        .run(&september(), None)
        .await
        .unwrap();

    assert_eq!(report.tasks_succeeded, 1);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].room.as_deref(), Some("Double"));
    assert_eq!(report.failures[0].attempts, 3);
    assert_eq!(report.failures[0].category, "automation");
}

#[tokio::test]
async fn test_navigation_failure_keeps_other_rooms_data() {
    let store = Arc::new(MockStore::new());
    let property = store.add_property("Harbor House", "harbor").unwrap();
    let room = store.add_room_type(property.id, "dbl", "Double", 2).unwrap();
    let factory = factory_with(&["dbl"]);
    let runner = TaskRunner::new(MonthWalker::new(2, Duration::ZERO), Classifier::default());
    let orchestrator = Orchestrator::new(
        store.clone(),
        store.clone(),
        factory.clone(),
        runner,
        settings(1, 1, 1),
    );

    orchestrator.run(&september(), None).await.unwrap();
    let report = orchestrator
        .run(&[month("December 2025")], None)
        .await
        .unwrap();

    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].category, "navigation");
    assert_eq!(report.failures[0].attempts, 2);
    assert_eq!(store.records(room.id, None).unwrap().len(), 3);
}

#[tokio::test]
async fn test_nested_bounds_limit_open_sessions() {
    let store = Arc::new(MockStore::new());
    for p in 0..4 {
        let property = store
            .add_property(&format!("Property {p}"), &format!("ref-{p}"))
            .unwrap();
        for r in 0..3 {
            store
                .add_room_type(property.id, &format!("room-{r}"), &format!("Room {r}"), 2)
                .unwrap();
        }
    }
    let factory = factory_with(&["room-0", "room-1", "room-2"]);

    let report = orchestrator(&store, &factory, settings(2, 2, 0))
        .run(&september(), None)
        .await
        .unwrap();

    assert_eq!(report.properties_processed, 4);
    assert_eq!(report.room_types_processed, 12);
    assert_eq!(report.tasks_succeeded, 12);
    assert!(report.is_clean());
    assert!(factory.peak() <= 4);
    assert!(factory.peak() >= 2);
}

#[tokio::test]
async fn test_property_filter_and_inactive_properties() {
    let store = Arc::new(MockStore::new());
    let harbor = store.add_property("Harbor House", "harbor").unwrap();
    let hill = store.add_property("Hill Lodge", "hill").unwrap();
    let closed = store.add_property("Harbor Annex", "annex").unwrap();
    for property in [&harbor, &hill, &closed] {
        store.add_room_type(property.id, "dbl", "Double", 2).unwrap();
    }
    store.set_property_active(closed.id, false).unwrap();
    let factory = factory_with(&["dbl"]);

    let report = orchestrator(&store, &factory, settings(2, 2, 0))
        .run(&september(), Some("harbor"))
        .await
        .unwrap();

    assert_eq!(report.properties_processed, 1);
    assert_eq!(report.tasks_succeeded, 1);
    assert_eq!(factory.opened(), 1);
}

#[tokio::test]
async fn test_multi_month_run_writes_whole_range() {
    let store = Arc::new(MockStore::new());
    let property = store.add_property("Harbor House", "harbor").unwrap();
    let room = store.add_room_type(property.id, "dbl", "Double", 2).unwrap();
    let factory = factory_with(&["dbl"]);
    let october = month("October 2025");
    factory.script.set_month(october, open_month(october));

    let report = orchestrator(&store, &factory, settings(1, 1, 0))
        .run(&[month("September 2025"), october], None)
        .await
        .unwrap();

    assert_eq!(report.records_written, 3 + 31);
    let ledger = store.coverage(room.id).unwrap();
    assert_eq!(ledger.len(), 1);
    assert_eq!(ledger[0].range.to_string(), "2025-09-01..=2025-10-31");
}

#[tokio::test]
async fn test_repeated_month_is_scraped_once() {
    let store = Arc::new(MockStore::new());
    let property = store.add_property("Harbor House", "harbor").unwrap();
    let room = store.add_room_type(property.id, "dbl", "Double", 2).unwrap();
    let factory = factory_with(&["dbl"]);

    let report = orchestrator(&store, &factory, settings(1, 1, 2))
        .run(&[month("2025-09"), month("September 2025")], None)
        .await
        .unwrap();

    assert!(report.is_clean());
    assert_eq!(report.tasks_succeeded, 1);
    assert_eq!(report.records_written, 3);
    assert_eq!(factory.opened(), 1);
    assert_eq!(store.records(room.id, None).unwrap().len(), 3);
}

#[tokio::test]
async fn test_months_out_of_order_are_walked_forward() {
    let store = Arc::new(MockStore::new());
    let property = store.add_property("Harbor House", "harbor").unwrap();
    let room = store.add_room_type(property.id, "dbl", "Double", 2).unwrap();
    let factory = factory_with(&["dbl"]);
    let october = month("October 2025");
    factory.script.set_month(october, open_month(october));

    let report = orchestrator(&store, &factory, settings(1, 1, 2))
        .run(&[october, month("September 2025")], None)
        .await
        .unwrap();

    assert!(report.is_clean());
    assert_eq!(report.records_written, 3 + 31);
    // No navigation retries
    assert_eq!(factory.opened(), 1);
    assert_eq!(store.records(room.id, None).unwrap().len(), 3 + 31);
}

/// Delegates to a [`MockStore`] and records which thread wrote
struct ThreadRecordingStore {
    inner: MockStore,
    writers: Mutex<Vec<ThreadId>>,
}

impl AvailabilityRepository for ThreadRecordingStore {
    fn replace_range(
        &self,
        room_type_id: i64,
        range: ScrapeRange,
        records: &[AvailabilityRecord],
    ) -> Result<usize> {
        self.writers
            .lock()
            .unwrap()
            .push(std::thread::current().id());
        self.inner.replace_range(room_type_id, range, records)
    }

    fn records(
        &self,
        room_type_id: i64,
        range: Option<ScrapeRange>,
    ) -> Result<Vec<AvailabilityRecord>> {
        self.inner.records(room_type_id, range)
    }

    fn coverage(&self, room_type_id: i64) -> Result<Vec<CoverageEntry>> {
        self.inner.coverage(room_type_id)
    }
}

#[tokio::test(flavor = "current_thread")]
async fn test_synchronizer_runs_on_blocking_pool() {
    let catalog = Arc::new(MockStore::new());
    let property = catalog.add_property("Harbor House", "harbor").unwrap();
    let room = catalog.add_room_type(property.id, "dbl", "Double", 2).unwrap();
    let availability = Arc::new(ThreadRecordingStore {
        inner: MockStore::new(),
        writers: Mutex::new(Vec::new()),
    });
    let factory = factory_with(&["dbl"]);
    let orchestrator = Orchestrator::new(
        catalog,
        availability.clone(),
        factory,
        TaskRunner::new(MonthWalker::new(24, Duration::ZERO), Classifier::default()),
        settings(1, 1, 0),
    );

    let report = orchestrator.run(&september(), None).await.unwrap();

    assert_eq!(report.records_written, 3);
    assert_eq!(availability.records(room.id, None).unwrap().len(), 3);
    let writers = availability.writers.lock().unwrap();
    assert_eq!(writers.len(), 1);
    assert_ne!(writers[0], std::thread::current().id());
}
