//! SQLite-backed local cache.
//!
//! Holds two tables:
//! - `events`: the reconciled slice of the calendar, keyed by source id
//! - `meta`: flat key/value status written by the sync engines and read by the display
//!
//! Every engine thread opens its own [`LocalCache`]; concurrent handles are
//! arbitrated by SQLite itself (WAL journal plus a 2s busy timeout).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{Days, NaiveTime};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::DatabaseError;
use crate::time_util::{self, SECONDS_PER_DAY};

const BUSY_TIMEOUT: Duration = Duration::from_secs(2);

const EVENT_COLUMNS: &str =
    "id, calendar_id, title, start_ts, end_ts, all_day, location, updated_ts, status";

/// One cached calendar event.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EventRecord {
    pub id: String,
    /// Source tag: `mock`, `ics`, or a real calendar id.
    pub calendar_id: String,
    pub title: String,
    pub start_ts: i64,
    pub end_ts: i64,
    pub all_day: bool,
    pub location: String,
    /// When this row was last written; compared against a cycle's `sync_ts`.
    pub updated_ts: i64,
    pub status: String,
}

impl EventRecord {
    pub fn is_cancelled(&self) -> bool {
        self.status == "cancelled"
    }
}

/// Durable event + metadata store.
pub struct LocalCache {
    conn: Connection,
    path: Option<PathBuf>,
}

impl LocalCache {
    /// Open (or create) the cache at `path`.
    ///
    /// Creates the parent directory and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened or the schema cannot be created.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DatabaseError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| DatabaseError::SchemaFailed(format!("{}: {e}", parent.display())))?;
        }
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let cache = Self {
            conn,
            path: Some(path.to_path_buf()),
        };
        cache.configure()?;
        cache.migrate()?;
        debug!(path = %path.display(), "local cache opened");
        Ok(cache)
    }

    /// Open a private in-memory cache (tests and dry runs).
    pub fn open_in_memory() -> Result<Self, DatabaseError> {
        let conn = Connection::open_in_memory().map_err(|source| DatabaseError::OpenFailed {
            path: PathBuf::from(":memory:"),
            source,
        })?;
        let cache = Self { conn, path: None };
        cache.configure()?;
        cache.migrate()?;
        Ok(cache)
    }

    /// Backing file, `None` for in-memory caches.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn configure(&self) -> Result<(), DatabaseError> {
        self.conn.busy_timeout(BUSY_TIMEOUT)?;
        self.conn
            .execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
            .map_err(|e| DatabaseError::SchemaFailed(e.to_string()))
    }

    fn migrate(&self) -> Result<(), DatabaseError> {
        self.conn
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS events (
                    id          TEXT PRIMARY KEY,
                    calendar_id TEXT NOT NULL DEFAULT '',
                    title       TEXT NOT NULL DEFAULT '',
                    start_ts    INTEGER NOT NULL,
                    end_ts      INTEGER NOT NULL,
                    all_day     INTEGER NOT NULL DEFAULT 0,
                    location    TEXT NOT NULL DEFAULT '',
                    updated_ts  INTEGER NOT NULL DEFAULT 0,
                    status      TEXT NOT NULL DEFAULT ''
                );

                CREATE TABLE IF NOT EXISTS meta (
                    key   TEXT PRIMARY KEY,
                    value TEXT NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_events_start ON events(start_ts);
                CREATE INDEX IF NOT EXISTS idx_events_calendar_start ON events(calendar_id, start_ts);",
            )
            .map_err(|e| DatabaseError::SchemaFailed(e.to_string()))
    }

    /// Insert or overwrite an event by id.
    ///
    /// `end_ts` is clamped to `start_ts` so a stored row never ends before it starts.
    pub fn upsert_event(&self, event: &EventRecord) -> Result<(), DatabaseError> {
        let end_ts = event.end_ts.max(event.start_ts);
        self.conn.execute(
            "INSERT INTO events (id, calendar_id, title, start_ts, end_ts, all_day, location, updated_ts, status)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT(id) DO UPDATE SET
                calendar_id = excluded.calendar_id,
                title       = excluded.title,
                start_ts    = excluded.start_ts,
                end_ts      = excluded.end_ts,
                all_day     = excluded.all_day,
                location    = excluded.location,
                updated_ts  = excluded.updated_ts,
                status      = excluded.status",
            params![
                event.id,
                event.calendar_id,
                event.title,
                event.start_ts,
                end_ts,
                event.all_day,
                event.location,
                event.updated_ts,
                event.status,
            ],
        )?;
        Ok(())
    }

    /// Non-cancelled events overlapping the local day that contains `day_ts`.
    pub fn events_for_day(&self, day_ts: i64) -> Result<Vec<EventRecord>, DatabaseError> {
        let start = time_util::start_of_day(day_ts);
        let end = time_util::end_of_day(day_ts);
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {EVENT_COLUMNS} FROM events
             WHERE start_ts <= ?1 AND end_ts >= ?2 AND status != 'cancelled'
             ORDER BY start_ts ASC, id ASC"
        ))?;
        let rows = stmt.query_map(params![end, start], row_to_event)?;
        let events = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(events)
    }

    /// Earliest non-cancelled event starting at or after `ts`.
    pub fn next_event_after(&self, ts: i64) -> Result<Option<EventRecord>, DatabaseError> {
        let event = self
            .conn
            .query_row(
                &format!(
                    "SELECT {EVENT_COLUMNS} FROM events
                     WHERE start_ts >= ?1 AND status != 'cancelled'
                     ORDER BY start_ts ASC, id ASC LIMIT 1"
                ),
                params![ts],
                row_to_event,
            )
            .optional()?;
        Ok(event)
    }

    /// Day-of-month -> number of non-cancelled events starting that day.
    pub fn event_days_in_month(
        &self,
        year: i32,
        month: u32,
    ) -> Result<BTreeMap<u32, u32>, DatabaseError> {
        let mut counts = BTreeMap::new();
        let Some((start, end)) = time_util::month_bounds(year, month) else {
            return Ok(counts);
        };

        let mut stmt = self.conn.prepare(
            "SELECT start_ts FROM events
             WHERE start_ts >= ?1 AND start_ts <= ?2 AND status != 'cancelled'",
        )?;
        let rows = stmt.query_map(params![start, end], |row| row.get::<_, i64>(0))?;
        for row in rows {
            let day = chrono::Datelike::day(&time_util::local_datetime(row?));
            *counts.entry(day).or_insert(0) += 1;
        }
        Ok(counts)
    }

    /// Remove events of `calendar_id` that start inside the window and were
    /// not rewritten during the sync pass stamped `sync_ts`.
    ///
    /// Returns the number of rows deleted.
    pub fn delete_stale_in_window(
        &self,
        calendar_id: &str,
        window_start: i64,
        window_end: i64,
        sync_ts: i64,
    ) -> Result<usize, DatabaseError> {
        let removed = self.conn.execute(
            "DELETE FROM events
             WHERE calendar_id = ?1 AND start_ts >= ?2 AND start_ts <= ?3 AND updated_ts < ?4",
            params![calendar_id, window_start, window_end, sync_ts],
        )?;
        Ok(removed)
    }

    /// Total rows, cancelled included.
    pub fn event_count(&self) -> Result<u64, DatabaseError> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM events", [], |row| row.get::<_, u64>(0))?;
        Ok(count)
    }

    /// Set a metadata value.
    pub fn set_meta(&self, key: &str, value: &str) -> Result<(), DatabaseError> {
        self.conn.execute(
            "INSERT INTO meta (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    /// Set several metadata values in one transaction, so readers see either
    /// all of them or none.
    pub fn set_meta_batch(&self, entries: &[(&str, String)]) -> Result<(), DatabaseError> {
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO meta (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            )?;
            for (key, value) in entries {
                stmt.execute(params![key, value])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Get a metadata value; an absent key reads as the empty string.
    pub fn get_meta(&self, key: &str) -> Result<String, DatabaseError> {
        let value = self
            .conn
            .query_row("SELECT value FROM meta WHERE key = ?1", params![key], |row| {
                row.get::<_, String>(0)
            })
            .optional()?;
        Ok(value.unwrap_or_default())
    }

    /// Seed the fixed demo agenda used in mock mode.
    ///
    /// Events are placed relative to the local day of `now_ts` and stamped
    /// with `calendar_id = "mock"`.
    pub fn insert_sample_events(&self, now_ts: i64) -> Result<(), DatabaseError> {
        let today = time_util::local_datetime(now_ts).date_naive();
        let samples: [(&str, &str, u64, u32, u32, i64, bool); 6] = [
            ("mock-1", "Breakfast with Sam", 0, 8, 30, 60, false),
            ("mock-2", "Design review", 0, 11, 0, 45, false),
            ("mock-3", "Gym", 0, 18, 0, 90, false),
            ("mock-4", "Project kickoff", 1, 10, 0, 60, false),
            ("mock-5", "All-day focus", 2, 0, 0, 0, true),
            ("mock-6", "Dinner", 3, 19, 0, 90, false),
        ];

        for (id, title, day_offset, hour, minute, duration_min, all_day) in samples {
            let Some(start_ts) = today
                .checked_add_days(Days::new(day_offset))
                .and_then(|d| NaiveTime::from_hms_opt(hour, minute, 0).map(|t| d.and_time(t)))
                .and_then(time_util::local_naive_to_ts)
            else {
                continue;
            };
            let end_ts = if all_day {
                start_ts + SECONDS_PER_DAY - 1
            } else {
                start_ts + duration_min * 60
            };
            self.upsert_event(&EventRecord {
                id: id.to_string(),
                calendar_id: "mock".to_string(),
                title: title.to_string(),
                start_ts,
                end_ts,
                all_day,
                location: String::new(),
                updated_ts: now_ts,
                status: "confirmed".to_string(),
            })?;
        }
        Ok(())
    }
}

fn row_to_event(row: &Row<'_>) -> rusqlite::Result<EventRecord> {
    Ok(EventRecord {
        id: row.get(0)?,
        calendar_id: row.get(1)?,
        title: row.get(2)?,
        start_ts: row.get(3)?,
        end_ts: row.get(4)?,
        all_day: row.get(5)?,
        location: row.get(6)?,
        updated_ts: row.get(7)?,
        status: row.get(8)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time_util::local_midnight;

    fn event(
        id: &str,
        calendar_id: &str,
        start_ts: i64,
        end_ts: i64,
        updated_ts: i64,
    ) -> EventRecord {
        EventRecord {
            id: id.to_string(),
            calendar_id: calendar_id.to_string(),
            title: format!("title {id}"),
            start_ts,
            end_ts,
            all_day: false,
            location: String::new(),
            updated_ts,
            status: "confirmed".to_string(),
        }
    }

    #[test]
    fn upsert_replaces_by_id() {
        let cache = LocalCache::open_in_memory().unwrap();
        let mut ev = event("a", "ics", 100, 200, 1);
        cache.upsert_event(&ev).unwrap();
        ev.title = "second".to_string();
        cache.upsert_event(&ev).unwrap();

        assert_eq!(cache.event_count().unwrap(), 1);
        let got = cache.next_event_after(0).unwrap().unwrap();
        assert_eq!(got.title, "second");
    }

    #[test]
    fn upsert_clamps_end_before_start() {
        let cache = LocalCache::open_in_memory().unwrap();
        cache.upsert_event(&event("a", "ics", 500, 100, 1)).unwrap();
        let got = cache.next_event_after(0).unwrap().unwrap();
        assert_eq!(got.start_ts, 500);
        assert_eq!(got.end_ts, 500);
    }

    #[test]
    fn events_for_day_includes_overlaps_and_skips_cancelled() {
        let cache = LocalCache::open_in_memory().unwrap();
        let day = local_midnight(2024, 6, 15).unwrap();
        let prev = local_midnight(2024, 6, 14).unwrap();
        let next = local_midnight(2024, 6, 16).unwrap();

        cache.upsert_event(&event("late", "ics", day + 18 * 3600, day + 19 * 3600, 1)).unwrap();
        cache.upsert_event(&event("multi", "ics", prev + 3600, next + 3600, 1)).unwrap();
        cache.upsert_event(&event("early", "ics", day + 9 * 3600, day + 10 * 3600, 1)).unwrap();
        cache
            .upsert_event(&event("other-day", "ics", next + 9 * 3600, next + 10 * 3600, 1))
            .unwrap();
        let mut cancelled = event("cancelled", "ics", day + 12 * 3600, day + 13 * 3600, 1);
        cancelled.status = "cancelled".to_string();
        cache.upsert_event(&cancelled).unwrap();

        let ids: Vec<String> = cache
            .events_for_day(day + 12 * 3600)
            .unwrap()
            .into_iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(ids, vec!["multi", "early", "late"]);
    }

    #[test]
    fn events_for_day_boundaries_are_inclusive() {
        let cache = LocalCache::open_in_memory().unwrap();
        let day = local_midnight(2024, 6, 15).unwrap();
        let prev = local_midnight(2024, 6, 14).unwrap();
        let end_of_day = time_util::end_of_day(day);

        cache.upsert_event(&event("ends-at-midnight", "ics", prev + 3600, day, 1)).unwrap();
        cache
            .upsert_event(&event(
                "starts-at-last-second",
                "ics",
                end_of_day,
                end_of_day + 60,
                1,
            ))
            .unwrap();
        cache.upsert_event(&event("ends-before", "ics", prev + 3600, day - 1, 1)).unwrap();

        let ids: Vec<String> = cache
            .events_for_day(day)
            .unwrap()
            .into_iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(ids, vec!["ends-at-midnight", "starts-at-last-second"]);
    }

    #[test]
    fn next_event_after_skips_cancelled() {
        let cache = LocalCache::open_in_memory().unwrap();
        let mut first = event("first", "ics", 100, 150, 1);
        first.status = "cancelled".to_string();
        cache.upsert_event(&first).unwrap();
        cache.upsert_event(&event("second", "ics", 200, 250, 1)).unwrap();
        cache.upsert_event(&event("past", "ics", 50, 60, 1)).unwrap();

        assert_eq!(cache.next_event_after(100).unwrap().unwrap().id, "second");
        assert!(cache.next_event_after(201).unwrap().is_none());
    }

    #[test]
    fn event_days_in_month_counts_starts() {
        let cache = LocalCache::open_in_memory().unwrap();
        let d3 = local_midnight(2024, 6, 3).unwrap();
        let d20 = local_midnight(2024, 6, 20).unwrap();
        let july = local_midnight(2024, 7, 1).unwrap();

        cache.upsert_event(&event("a", "ics", d3 + 3600, d3 + 7200, 1)).unwrap();
        cache.upsert_event(&event("b", "ics", d3 + 9000, d3 + 9600, 1)).unwrap();
        cache.upsert_event(&event("c", "ics", d20, d20 + 60, 1)).unwrap();
        cache.upsert_event(&event("d", "ics", july, july + 60, 1)).unwrap();
        let mut cancelled = event("e", "ics", d20 + 60, d20 + 120, 1);
        cancelled.status = "cancelled".to_string();
        cache.upsert_event(&cancelled).unwrap();

        let counts = cache.event_days_in_month(2024, 6).unwrap();
        assert_eq!(counts.get(&3), Some(&2));
        assert_eq!(counts.get(&20), Some(&1));
        assert_eq!(counts.len(), 2);
        assert!(cache.event_days_in_month(2024, 13).unwrap().is_empty());
    }

    #[test]
    fn delete_stale_in_window_is_exact_and_idempotent() {
        let cache = LocalCache::open_in_memory().unwrap();
        let sync_ts = 1_000;
        cache.upsert_event(&event("stale", "ics", 150, 160, 900)).unwrap();
        cache.upsert_event(&event("fresh", "ics", 150, 160, 1_000)).unwrap();
        cache.upsert_event(&event("outside", "ics", 500, 510, 900)).unwrap();
        cache.upsert_event(&event("other-cal", "primary", 150, 160, 900)).unwrap();
        cache.upsert_event(&event("edge", "ics", 100, 100, 999)).unwrap();

        let removed = cache.delete_stale_in_window("ics", 100, 200, sync_ts).unwrap();
        assert_eq!(removed, 2);
        assert_eq!(cache.event_count().unwrap(), 3);
        assert_eq!(cache.delete_stale_in_window("ics", 100, 200, sync_ts).unwrap(), 0);
        assert_eq!(cache.event_count().unwrap(), 3);
    }

    #[test]
    fn meta_batch_writes_all_keys() {
        let cache = LocalCache::open_in_memory().unwrap();
        cache
            .set_meta_batch(&[("a", "1".to_string()), ("b", "2".to_string())])
            .unwrap();
        cache.set_meta_batch(&[("a", "3".to_string())]).unwrap();
        assert_eq!(cache.get_meta("a").unwrap(), "3");
        assert_eq!(cache.get_meta("b").unwrap(), "2");
    }

    #[test]
    fn meta_defaults_to_empty() {
        let cache = LocalCache::open_in_memory().unwrap();
        assert_eq!(cache.get_meta("last_sync_status").unwrap(), "");
        cache.set_meta("last_sync_status", "online").unwrap();
        cache.set_meta("last_sync_status", "offline").unwrap();
        assert_eq!(cache.get_meta("last_sync_status").unwrap(), "offline");
    }

    #[test]
    fn sample_events_are_deterministic() {
        let cache = LocalCache::open_in_memory().unwrap();
        let now = local_midnight(2024, 6, 15).unwrap() + 7 * 3600;
        cache.insert_sample_events(now).unwrap();
        cache.insert_sample_events(now).unwrap();
        assert_eq!(cache.event_count().unwrap(), 6);

        let today = cache.events_for_day(now).unwrap();
        assert_eq!(today.len(), 3);
        assert_eq!(today[0].title, "Breakfast with Sam");
        assert!(today.iter().all(|e| e.calendar_id == "mock"));

        let all_day = cache
            .events_for_day(local_midnight(2024, 6, 17).unwrap())
            .unwrap();
        assert_eq!(all_day.len(), 1);
        assert!(all_day[0].all_day);
        assert_eq!(all_day[0].end_ts - all_day[0].start_ts, SECONDS_PER_DAY - 1);
    }
}
