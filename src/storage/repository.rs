//! Repository Pattern for Database Abstraction
//!
//! Business logic talks to storage through two traits:
//!
//! - [`CatalogRepository`] - properties and their room types
//! - [`AvailabilityRepository`] - availability records and the scrape
//!   coverage ledger
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │              Orchestrator / Synchronizer                    │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │        CatalogRepository, AvailabilityRepository            │
//! └─────────────────────────────────────────────────────────────┘
//!                   │                           │
//!                   ▼                           ▼
//!          ┌─────────────────┐         ┌─────────────────┐
//!          │   SqliteStore   │         │    MockStore    │
//!          └─────────────────┘         └─────────────────┘
//! ```
//!
//! # Coverage ledger
//!
//! Unavailable days are never stored, so a missing record alone cannot tell
//! "checked and booked out" from "never checked". Every range replace also
//! appends a [`CoverageEntry`]; [`AvailabilityRepository::is_covered`]
//! answers the second question.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, TransactionBehavior};

use crate::error::{Error, Result};
use crate::models::{AvailabilityRecord, CoverageEntry, Property, RoomType, ScrapeRange};

// ============================================================================
// Repository Traits
// ============================================================================

/// Properties and room types
pub trait CatalogRepository: Send + Sync {
    /// Register a property; names are unique
    fn add_property(&self, name: &str, booking_reference: &str) -> Result<Property>;

    /// Register a room type; external ids are unique within a property
    fn add_room_type(
        &self,
        property_id: i64,
        external_id: &str,
        name: &str,
        capacity: u32,
    ) -> Result<RoomType>;

    /// Soft-(de)activate a property
    fn set_property_active(&self, property_id: i64, active: bool) -> Result<()>;

    /// Active properties, optionally filtered by a case-insensitive name substring
    fn active_properties(&self, name_filter: Option<&str>) -> Result<Vec<Property>>;

    /// Active room types of one property
    fn active_room_types(&self, property_id: i64) -> Result<Vec<RoomType>>;
}

/// Availability records, keyed by (room type, date)
pub trait AvailabilityRepository: Send + Sync {
    /// Atomically replace every record of `room_type_id` inside `range`
    ///
    /// Records outside the range are never touched. Also appends a coverage
    /// entry for the range. Returns the number of records written.
    fn replace_range(
        &self,
        room_type_id: i64,
        range: ScrapeRange,
        records: &[AvailabilityRecord],
    ) -> Result<usize>;

    /// Records of one room type ordered by date, optionally limited to a range
    fn records(
        &self,
        room_type_id: i64,
        range: Option<ScrapeRange>,
    ) -> Result<Vec<AvailabilityRecord>>;

    /// Coverage ledger of one room type, oldest first
    fn coverage(&self, room_type_id: i64) -> Result<Vec<CoverageEntry>>;

    /// Whether `date` was inside any synchronized range
    fn is_covered(&self, room_type_id: i64, date: NaiveDate) -> Result<bool> {
        Ok(self
            .coverage(room_type_id)?
            .iter()
            .any(|entry| entry.range.contains(date)))
    }
}

// ============================================================================
// SQLite Implementation
// ============================================================================

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS properties (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE,
        booking_reference TEXT NOT NULL,
        active INTEGER NOT NULL DEFAULT 1
    );

    CREATE TABLE IF NOT EXISTS room_types (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        property_id INTEGER NOT NULL REFERENCES properties(id),
        external_id TEXT NOT NULL,
        name TEXT NOT NULL,
        capacity INTEGER NOT NULL,
        active INTEGER NOT NULL DEFAULT 1,
        UNIQUE (property_id, external_id)
    );

    CREATE TABLE IF NOT EXISTS availability (
        room_type_id INTEGER NOT NULL,
        date TEXT NOT NULL,
        can_checkin INTEGER NOT NULL,
        can_checkout INTEGER NOT NULL,
        synced_at TEXT NOT NULL,
        PRIMARY KEY (room_type_id, date)
    );

    CREATE TABLE IF NOT EXISTS scrape_coverage (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        room_type_id INTEGER NOT NULL,
        range_start TEXT NOT NULL,
        range_end TEXT NOT NULL,
        synced_at TEXT NOT NULL,
        records_written INTEGER NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_scrape_coverage_room
        ON scrape_coverage(room_type_id, range_start, range_end);
"#;

/// SQLite implementation of both repositories
///
/// Uses `Mutex` to ensure thread-safety for the SQLite connection.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the database at `path`
    pub fn new(path: impl AsRef<Path>, busy_timeout: Duration) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;

        // WAL lets readers see the last committed state while a replace runs
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        conn.busy_timeout(busy_timeout)?;

        let store = Self {
            conn: Mutex::new(conn),
        };
        store.create_schema()?;

        tracing::info!(path = %path.display(), "SQLite store initialized");
        Ok(store)
    }

    /// Create in-memory store (for testing)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.create_schema()?;
        Ok(store)
    }

    fn create_schema(&self) -> Result<()> {
        self.conn()?.execute_batch(SCHEMA)?;
        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::other("SQLite connection mutex poisoned"))
    }
}

fn unique_violation(err: rusqlite::Error, what: String) -> Error {
    match err.sqlite_error_code() {
        Some(ErrorCode::ConstraintViolation) => Error::validation(format!("{what} already exists")),
        _ => err.into(),
    }
}

fn parse_date(raw: &str) -> rusqlite::Result<NaiveDate> {
    raw.parse().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn parse_timestamp(raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
        })
}

fn row_to_property(row: &rusqlite::Row<'_>) -> rusqlite::Result<Property> {
    Ok(Property {
        id: row.get(0)?,
        name: row.get(1)?,
        booking_reference: row.get(2)?,
        active: row.get(3)?,
    })
}

fn row_to_room_type(row: &rusqlite::Row<'_>) -> rusqlite::Result<RoomType> {
    Ok(RoomType {
        id: row.get(0)?,
        property_id: row.get(1)?,
        external_id: row.get(2)?,
        name: row.get(3)?,
        capacity: row.get(4)?,
        active: row.get(5)?,
    })
}

impl CatalogRepository for SqliteStore {
    fn add_property(&self, name: &str, booking_reference: &str) -> Result<Property> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO properties (name, booking_reference, active) VALUES (?1, ?2, 1)",
            params![name, booking_reference],
        )
        .map_err(|e| unique_violation(e, format!("property '{name}'")))?;

        Ok(Property {
            id: conn.last_insert_rowid(),
            name: name.to_string(),
            booking_reference: booking_reference.to_string(),
            active: true,
        })
    }

    fn add_room_type(
        &self,
        property_id: i64,
        external_id: &str,
        name: &str,
        capacity: u32,
    ) -> Result<RoomType> {
        let conn = self.conn()?;

        let property_exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM properties WHERE id = ?1)",
            params![property_id],
            |row| row.get(0),
        )?;
        if !property_exists {
            return Err(Error::validation(format!("unknown property {property_id}")));
        }

        conn.execute(
            r#"
                INSERT INTO room_types (property_id, external_id, name, capacity, active)
                VALUES (?1, ?2, ?3, ?4, 1)
                "#,
            params![property_id, external_id, name, capacity],
        )
        .map_err(|e| {
            unique_violation(
                e,
                format!("external id '{external_id}' in property {property_id}"),
            )
        })?;

        Ok(RoomType {
            id: conn.last_insert_rowid(),
            property_id,
            external_id: external_id.to_string(),
            name: name.to_string(),
            capacity,
            active: true,
        })
    }

    fn set_property_active(&self, property_id: i64, active: bool) -> Result<()> {
        let updated = self.conn()?.execute(
            "UPDATE properties SET active = ?2 WHERE id = ?1",
            params![property_id, active],
        )?;
        if updated == 0 {
            return Err(Error::validation(format!("unknown property {property_id}")));
        }
        Ok(())
    }

    fn active_properties(&self, name_filter: Option<&str>) -> Result<Vec<Property>> {
        let conn = self.conn()?;
        let pattern = format!("%{}%", name_filter.unwrap_or("").to_lowercase());

        let mut stmt = conn.prepare(
            r#"
                SELECT id, name, booking_reference, active FROM properties
                WHERE active = 1 AND lower(name) LIKE ?1
                ORDER BY id
                "#,
        )?;
        let properties = stmt
            .query_map(params![pattern], row_to_property)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(properties)
    }

    fn active_room_types(&self, property_id: i64) -> Result<Vec<RoomType>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
                SELECT id, property_id, external_id, name, capacity, active FROM room_types
                WHERE property_id = ?1 AND active = 1
                ORDER BY id
                "#,
        )?;
        let rooms = stmt
            .query_map(params![property_id], row_to_room_type)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(rooms)
    }
}

impl AvailabilityRepository for SqliteStore {
    fn replace_range(
        &self,
        room_type_id: i64,
        range: ScrapeRange,
        records: &[AvailabilityRecord],
    ) -> Result<usize> {
        let mut conn = self.conn()?;
        // IMMEDIATE takes the write lock up front so a busy database fails
        // before the delete instead of between delete and insert
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let start = range.start.to_string();
        let end = range.end.to_string();

        let removed = tx.execute(
            "DELETE FROM availability WHERE room_type_id = ?1 AND date BETWEEN ?2 AND ?3",
            params![room_type_id, start, end],
        )?;

        {
            let mut insert = tx.prepare_cached(
                r#"
                    INSERT INTO availability (room_type_id, date, can_checkin, can_checkout, synced_at)
                    VALUES (?1, ?2, ?3, ?4, ?5)
                    "#,
            )?;
            for record in records {
                insert.execute(params![
                    room_type_id,
                    record.date.to_string(),
                    record.can_checkin,
                    record.can_checkout,
                    record.synced_at.to_rfc3339(),
                ])?;
            }
        }

        tx.execute(
            r#"
                INSERT INTO scrape_coverage (room_type_id, range_start, range_end, synced_at, records_written)
                VALUES (?1, ?2, ?3, ?4, ?5)
                "#,
            params![room_type_id, start, end, Utc::now().to_rfc3339(), records.len() as i64],
        )?;

        tx.commit()?;

        tracing::debug!(
            room_type_id,
            range = %range,
            removed,
            inserted = records.len(),
            "Replaced availability range"
        );
        Ok(records.len())
    }

    fn records(
        &self,
        room_type_id: i64,
        range: Option<ScrapeRange>,
    ) -> Result<Vec<AvailabilityRecord>> {
        let conn = self.conn()?;
        let (start, end) = match range {
            Some(r) => (r.start.to_string(), r.end.to_string()),
            None => ("0000-01-01".to_string(), "9999-12-31".to_string()),
        };

        let mut stmt = conn.prepare(
            r#"
                SELECT date, can_checkin, can_checkout, synced_at FROM availability
                WHERE room_type_id = ?1 AND date BETWEEN ?2 AND ?3
                ORDER BY date
                "#,
        )?;
        let records = stmt
            .query_map(params![room_type_id, start, end], |row| {
                Ok(AvailabilityRecord {
                    room_type_id,
                    date: parse_date(&row.get::<_, String>(0)?)?,
                    can_checkin: row.get(1)?,
                    can_checkout: row.get(2)?,
                    synced_at: parse_timestamp(&row.get::<_, String>(3)?)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(records)
    }

    fn coverage(&self, room_type_id: i64) -> Result<Vec<CoverageEntry>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
                SELECT range_start, range_end, synced_at, records_written FROM scrape_coverage
                WHERE room_type_id = ?1
                ORDER BY id
                "#,
        )?;
        let entries = stmt
            .query_map(params![room_type_id], |row| {
                Ok(CoverageEntry {
                    room_type_id,
                    range: ScrapeRange {
                        start: parse_date(&row.get::<_, String>(0)?)?,
                        end: parse_date(&row.get::<_, String>(1)?)?,
                    },
                    synced_at: parse_timestamp(&row.get::<_, String>(2)?)?,
                    records_written: row.get::<_, i64>(3)? as usize,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(entries)
    }

    fn is_covered(&self, room_type_id: i64, date: NaiveDate) -> Result<bool> {
        let day = date.to_string();
        let covered: Option<i64> = self
            .conn()?
            .query_row(
                r#"
                    SELECT 1 FROM scrape_coverage
                    WHERE room_type_id = ?1 AND range_start <= ?2 AND range_end >= ?2
                    LIMIT 1
                    "#,
                params![room_type_id, day],
                |row| row.get(0),
            )
            .optional()?;
        Ok(covered.is_some())
    }
}

// ============================================================================
// Mock Implementation (for testing)
// ============================================================================

#[derive(Default)]
struct MockState {
    properties: Vec<Property>,
    room_types: Vec<RoomType>,
    availability: HashMap<i64, BTreeMap<NaiveDate, AvailabilityRecord>>,
    coverage: Vec<CoverageEntry>,
}

/// In-memory implementation of both repositories
///
/// Useful for testing without database dependencies.
#[derive(Default)]
pub struct MockStore {
    state: RwLock<MockState>,
}

impl MockStore {
    /// Create a new mock store
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of availability records across all room types
    pub fn len(&self) -> usize {
        self.read()
            .map(|s| s.availability.values().map(BTreeMap::len).sum())
            .unwrap_or(0)
    }

    /// Check if no availability records are stored
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, MockState>> {
        self.state
            .read()
            .map_err(|_| Error::other("mock store lock poisoned"))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, MockState>> {
        self.state
            .write()
            .map_err(|_| Error::other("mock store lock poisoned"))
    }
}

impl CatalogRepository for MockStore {
    fn add_property(&self, name: &str, booking_reference: &str) -> Result<Property> {
        let mut state = self.write()?;
        if state.properties.iter().any(|p| p.name == name) {
            return Err(Error::validation(format!("property '{name}' already exists")));
        }
        let property = Property {
            id: state.properties.len() as i64 + 1,
            name: name.to_string(),
            booking_reference: booking_reference.to_string(),
            active: true,
        };
        state.properties.push(property.clone());
        Ok(property)
    }

    fn add_room_type(
        &self,
        property_id: i64,
        external_id: &str,
        name: &str,
        capacity: u32,
    ) -> Result<RoomType> {
        let mut state = self.write()?;
        if !state.properties.iter().any(|p| p.id == property_id) {
            return Err(Error::validation(format!("unknown property {property_id}")));
        }
        if state
            .room_types
            .iter()
            .any(|r| r.property_id == property_id && r.external_id == external_id)
        {
            return Err(Error::validation(format!(
                "external id '{external_id}' in property {property_id} already exists"
            )));
        }
        let room = RoomType {
            id: state.room_types.len() as i64 + 1,
            property_id,
            external_id: external_id.to_string(),
            name: name.to_string(),
            capacity,
            active: true,
        };
        state.room_types.push(room.clone());
        Ok(room)
    }

    fn set_property_active(&self, property_id: i64, active: bool) -> Result<()> {
        let mut state = self.write()?;
        let property = state
            .properties
            .iter_mut()
            .find(|p| p.id == property_id)
            .ok_or_else(|| Error::validation(format!("unknown property {property_id}")))?;
        property.active = active;
        Ok(())
    }

    fn active_properties(&self, name_filter: Option<&str>) -> Result<Vec<Property>> {
        let needle = name_filter.unwrap_or("").to_lowercase();
        Ok(self
            .read()?
            .properties
            .iter()
            .filter(|p| p.active && p.name.to_lowercase().contains(&needle))
            .cloned()
            .collect())
    }

    fn active_room_types(&self, property_id: i64) -> Result<Vec<RoomType>> {
        Ok(self
            .read()?
            .room_types
            .iter()
            .filter(|r| r.property_id == property_id && r.active)
            .cloned()
            .collect())
    }
}

impl AvailabilityRepository for MockStore {
    fn replace_range(
        &self,
        room_type_id: i64,
        range: ScrapeRange,
        records: &[AvailabilityRecord],
    ) -> Result<usize> {
        // One write guard spans delete and insert
        let mut state = self.write()?;

        let room = state.availability.entry(room_type_id).or_default();
        room.retain(|date, _| !range.contains(*date));
        for record in records {
            room.insert(
                record.date,
                AvailabilityRecord {
                    room_type_id,
                    ..record.clone()
                },
            );
        }

        state.coverage.push(CoverageEntry {
            room_type_id,
            range,
            synced_at: Utc::now(),
            records_written: records.len(),
        });

        Ok(records.len())
    }

    fn records(
        &self,
        room_type_id: i64,
        range: Option<ScrapeRange>,
    ) -> Result<Vec<AvailabilityRecord>> {
        Ok(self
            .read()?
            .availability
            .get(&room_type_id)
            .map(|room| {
                room.values()
                    .filter(|r| range.map_or(true, |range| range.contains(r.date)))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn coverage(&self, room_type_id: i64) -> Result<Vec<CoverageEntry>> {
        Ok(self
            .read()?
            .coverage
            .iter()
            .filter(|c| c.room_type_id == room_type_id)
            .cloned()
            .collect())
    }
}

// ============================================================================
// Tests
// ============================================================================
