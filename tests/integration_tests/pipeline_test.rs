//! Pipeline integration tests
//!
//! Tests the scrape → classify → synchronize flow for a single room type:
//! 1. First scrape into an empty store
//! 2. Rescrape after a day became unavailable
//! 3. Months scraped separately never erase each other
//! 4. Coverage distinguishes unscraped dates from unavailable ones

use std::sync::Arc;
use std::time::Duration;

use calsync::error::Error;
use calsync::models::{AvailabilityState, CalendarCell, Property, RoomType};
use calsync::scraper::{Classifier, MonthWalker, ScrapeTask, SessionFactory, TaskRunner};
use calsync::storage::{AvailabilityRepository, CatalogRepository, SqliteStore, Synchronizer};
use chrono::NaiveDate;
use tempfile::TempDir;

use crate::common::{month, open_month, september_cells, Script, ScriptedFactory};

struct Fixture {
    _dir: TempDir,
    store: Arc<SqliteStore>,
    factory: ScriptedFactory,
    property: Property,
    room: RoomType,
}

impl Fixture {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(
            SqliteStore::new(dir.path().join("availability.db"), Duration::from_secs(1)).unwrap(),
        );
        let property = store.add_property("Harbor House", "harbor").unwrap();
        let room = store
            .add_room_type(property.id, "dbl", "Double Room", 2)
            .unwrap();

        let script = Script::new(month("August 2025"), &["dbl"]);
        script.set_month(month("September 2025"), september_cells());

        Self {
            _dir: dir,
            store,
            factory: ScriptedFactory::new(script),
            property,
            room,
        }
    }

    fn task(&self, months: &[&str]) -> ScrapeTask {
        ScrapeTask::new(
            self.property.clone(),
            self.room.clone(),
            months.iter().map(|m| month(m)).collect(),
        )
        .unwrap()
    }

    async fn scrape_and_sync(&self, months: &[&str]) -> usize {
        let runner = TaskRunner::new(
            MonthWalker::new(24, Duration::ZERO),
            Classifier::new(["occupied", "booked"]),
        );
        let task = self.task(months);
        let mut session = self.factory.open(&self.property).await.unwrap();
        let output = runner.run(&mut *session, &task).await.unwrap();
        session.close().await.unwrap();

        let sync = Synchronizer::new(self.store.clone());
        sync.sync(self.room.id, output.range, &output.days)
            .unwrap()
            .records_written
    }

    fn stored(&self) -> Vec<(NaiveDate, bool, bool)> {
        self.store
            .records(self.room.id, None)
            .unwrap()
            .into_iter()
            .map(|r| (r.date, r.can_checkin, r.can_checkout))
            .collect()
    }
}

fn sep(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 9, day).unwrap()
}

// ============================================================================
// Scrape → Sync Tests
// ============================================================================

#[tokio::test]
async fn test_september_scrape_into_empty_store() {
    let fixture = Fixture::new();

    let written = fixture.scrape_and_sync(&["September 2025"]).await;

    assert_eq!(written, 3);
    assert_eq!(
        fixture.stored(),
        vec![
            (sep(5), true, true),
            (sep(12), true, true),
            (sep(20), true, false),
        ]
    );
}

#[tokio::test]
async fn test_rescrape_removes_stale_day() {
    let fixture = Fixture::new();
    fixture.scrape_and_sync(&["September 2025"]).await;

    let mut cells = september_cells();
    for cell in cells.iter_mut().filter(|c| c.in_displayed_month && c.day == 12) {
        cell.start_blocked = true;
        cell.end_blocked = true;
    }
    fixture.factory.script.set_month(month("September 2025"), cells);

    let written = fixture.scrape_and_sync(&["September 2025"]).await;

    assert_eq!(written, 2);
    assert_eq!(
        fixture.stored(),
        vec![(sep(5), true, true), (sep(20), true, false)]
    );
}

#[tokio::test]
async fn test_rescrape_with_identical_calendar_is_stable() {
    let fixture = Fixture::new();
    fixture.scrape_and_sync(&["September 2025"]).await;
    let first = fixture.stored();

    fixture.scrape_and_sync(&["September 2025"]).await;

    assert_eq!(fixture.stored(), first);
}

#[tokio::test]
async fn test_single_month_scrape_keeps_other_months() {
    let fixture = Fixture::new();
    let october = month("October 2025");
    fixture.factory.script.set_month(october, open_month(october));

    fixture
        .scrape_and_sync(&["September 2025", "October 2025"])
        .await;
    assert_eq!(fixture.stored().len(), 3 + 31);

    // October fills up; only September is rescraped
    let full: Vec<CalendarCell> = (1..=31)
        .map(|day| CalendarCell {
            tooltip: Some("Booked".to_string()),
            ..CalendarCell::open(day)
        })
        .collect();
    fixture.factory.script.set_month(october, full);
    fixture.scrape_and_sync(&["September 2025"]).await;

    let october_records = fixture
        .store
        .records(fixture.room.id, Some(fixture.task(&["October 2025"]).range()))
        .unwrap();
    assert_eq!(october_records.len(), 31);
}

#[tokio::test]
async fn test_coverage_distinguishes_unscraped_from_unavailable() {
    let fixture = Fixture::new();
    fixture.scrape_and_sync(&["September 2025"]).await;

    // Day 6 was scraped and found unavailable
    assert!(fixture.store.is_covered(fixture.room.id, sep(6)).unwrap());
    // October was never looked at
    let oct = NaiveDate::from_ymd_opt(2025, 10, 6).unwrap();
    assert!(!fixture.store.is_covered(fixture.room.id, oct).unwrap());

    let ledger = fixture.store.coverage(fixture.room.id).unwrap();
    assert_eq!(ledger.len(), 1);
    assert_eq!(ledger[0].records_written, 3);
}

// ============================================================================
// Scrape Failure Tests
// ============================================================================

#[tokio::test]
async fn test_unknown_room_fails_selection() {
    let fixture = Fixture::new();
    let runner = TaskRunner::new(MonthWalker::new(24, Duration::ZERO), Classifier::default());
    let mut room = fixture.room.clone();
    room.external_id = "suite".to_string();
    let task = ScrapeTask::new(
        fixture.property.clone(),
        room,
        vec![month("September 2025")],
    )
    .unwrap();

    let mut session = fixture.factory.open(&fixture.property).await.unwrap();
    let err = runner.run(&mut *session, &task).await.unwrap_err();

    assert!(matches!(err, Error::RoomSelection { ref external_id } if external_id == "suite"));
    assert!(!err.is_recoverable());
}

#[tokio::test]
async fn test_unreachable_month_exhausts_navigation() {
    let fixture = Fixture::new();
    let runner = TaskRunner::new(MonthWalker::new(3, Duration::ZERO), Classifier::default());
    let task = fixture.task(&["September 2026"]);

    let mut session = fixture.factory.open(&fixture.property).await.unwrap();
    let err = runner.run(&mut *session, &task).await.unwrap_err();

    match err {
        Error::NavigationExhausted {
            target,
            steps,
            last_seen,
        } => {
            assert_eq!(target, "September 2026");
            assert_eq!(steps, 3);
            assert!(last_seen.contains("November 2025"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_summary_reports_month_counts() {
    let fixture = Fixture::new();
    let runner = TaskRunner::new(MonthWalker::new(24, Duration::ZERO), Classifier::default());
    let task = fixture.task(&["September 2025"]);

    let mut session = fixture.factory.open(&fixture.property).await.unwrap();
    let output = runner.run(&mut *session, &task).await.unwrap();

    assert_eq!(output.days.len(), 30);
    let summary = &output.summary.months[0];
    assert_eq!(summary.month, "September 2025");
    assert_eq!(summary.available, 2);
    assert_eq!(summary.partial, 1);
    assert_eq!(summary.unavailable, 27);

    let day_20 = output.days.iter().find(|d| d.date == sep(20)).unwrap();
    assert_eq!(day_20.state, AvailabilityState::PartialNoEnd);
}
