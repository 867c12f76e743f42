//! Common test utilities
//!
//! A scripted booking widget: one calendar shared by every room, a set of
//! selectable room options and optional injected driver failures.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Datelike;
use calsync::error::{Error, Result};
use calsync::models::{CalendarCell, Property, TargetMonth};
use calsync::scraper::{CalendarSession, SessionFactory};

/// Widget state shared by every session a factory opens
pub struct Script {
    /// Month displayed when the picker opens
    pub start: TargetMonth,
    months: Mutex<HashMap<TargetMonth, Vec<CalendarCell>>>,
    rooms: HashSet<String>,
    /// `select_room` fails with an automation error while this is above zero
    automation_failures: AtomicU32,
    /// Delay inside every `select_room`, so concurrent sessions overlap
    pub interaction_delay: Duration,
}

impl Script {
    pub fn new(start: TargetMonth, rooms: &[&str]) -> Self {
        Self {
            start,
            months: Mutex::new(HashMap::new()),
            rooms: rooms.iter().map(|r| r.to_string()).collect(),
            automation_failures: AtomicU32::new(0),
            interaction_delay: Duration::from_millis(5),
        }
    }

    pub fn set_month(&self, month: TargetMonth, cells: Vec<CalendarCell>) {
        self.months.lock().unwrap().insert(month, cells);
    }

    pub fn fail_next_selections(&self, count: u32) {
        self.automation_failures.store(count, Ordering::SeqCst);
    }

    fn cells(&self, month: TargetMonth) -> Vec<CalendarCell> {
        self.months
            .lock()
            .unwrap()
            .get(&month)
            .cloned()
            .unwrap_or_default()
    }
}

pub struct ScriptedSession {
    script: Arc<Script>,
    shown: TargetMonth,
    live: Arc<AtomicUsize>,
}

#[async_trait]
impl CalendarSession for ScriptedSession {
    async fn select_room(&mut self, external_id: &str) -> Result<()> {
        tokio::time::sleep(self.script.interaction_delay).await;

        let injected = self
            .script
            .automation_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if injected.is_ok() {
            return Err(Error::automation("target closed"));
        }

        if !self.script.rooms.contains(external_id) {
            return Err(Error::RoomSelection {
                external_id: external_id.to_string(),
            });
        }
        Ok(())
    }

    async fn open_calendar(&mut self) -> Result<()> {
        self.shown = self.script.start;
        Ok(())
    }

    async fn displayed_month_label(&mut self) -> Result<String> {
        // Widgets pad their labels
        Ok(format!("  {}\n", self.shown.label()))
    }

    async fn advance_month(&mut self) -> Result<()> {
        self.shown = TargetMonth::sequence(self.shown, 2)[1];
        Ok(())
    }

    async fn calendar_cells(&mut self) -> Result<Vec<CalendarCell>> {
        Ok(self.script.cells(self.shown))
    }

    async fn close(&mut self) -> Result<()> {
        self.live.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Opens [`ScriptedSession`]s and tracks how many are open at once
pub struct ScriptedFactory {
    pub script: Arc<Script>,
    pub opened: AtomicUsize,
    live: Arc<AtomicUsize>,
    pub peak: AtomicUsize,
}

impl ScriptedFactory {
    pub fn new(script: Script) -> Self {
        Self {
            script: Arc::new(script),
            opened: AtomicUsize::new(0),
            live: Arc::new(AtomicUsize::new(0)),
            peak: AtomicUsize::new(0),
        }
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionFactory for ScriptedFactory {
    async fn open(&self, _property: &Property) -> Result<Box<dyn CalendarSession>> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        let live = self.live.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(live, Ordering::SeqCst);

        Ok(Box::new(ScriptedSession {
            script: Arc::clone(&self.script),
            shown: self.script.start,
            live: Arc::clone(&self.live),
        }))
    }
}

pub fn month(label: &str) -> TargetMonth {
    label.parse().unwrap()
}

/// Leading filler cells from the previous month, as date pickers render them
pub fn filler(days: impl IntoIterator<Item = u32>) -> Vec<CalendarCell> {
    days.into_iter()
        .map(|day| CalendarCell {
            day,
            in_displayed_month: false,
            ..CalendarCell::open(day)
        })
        .collect()
}

/// September 2025: days 5 and 12 open, day 20 end-blocked, everything else disallowed
pub fn september_cells() -> Vec<CalendarCell> {
    let mut cells = filler(29..=31);
    for day in 1..=30 {
        let cell = match day {
            5 | 12 => CalendarCell::open(day),
            20 => CalendarCell {
                end_blocked: true,
                ..CalendarCell::open(day)
            },
            _ => CalendarCell {
                disallowed: true,
                ..CalendarCell::open(day)
            },
        };
        cells.push(cell);
    }
    cells
}

/// Every day of `month` open
pub fn open_month(month: TargetMonth) -> Vec<CalendarCell> {
    (1..=month.last_day().day()).map(CalendarCell::open).collect()
}
