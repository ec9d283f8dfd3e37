//! Store: durable SQLite collection of decoded pages with inline retention.
//!
//! The store is the single source of truth; the query layer reads from it,
//! never from the decoder directly. It also hosts the liveness row (see
//! [`Liveness`](crate::Liveness)) and the shared `settings` table through
//! which the listener publishes its dedup window to readers in other
//! processes.
//!
//! Retention is enforced on every append: once the table holds more than
//! `capacity` rows, the single oldest row is deleted in the same transaction.

use crate::{
    clock::{Clock, SystemClock},
    dedup::DEFAULT_WINDOW_MINUTES,
    error::{StoreError, StoreResult},
    types::{DecodedLine, Message},
};
use chrono::{DateTime, Duration, Local, NaiveDate, NaiveTime, TimeZone, Utc};
use rusqlite::{params, params_from_iter, types::Value, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

/// Retention ceiling: the store never holds more rows than this.
pub const MAX_MESSAGES: usize = 2000;

const DEDUPE_MINUTES_KEY: &str = "dedupe_minutes";

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS messages (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp_us INTEGER NOT NULL,
    address      TEXT    NOT NULL,
    function     TEXT    NOT NULL,
    content      TEXT    NOT NULL,
    raw_line     TEXT    NOT NULL
);
CREATE INDEX IF NOT EXISTS messages_by_time ON messages (timestamp_us, id);

CREATE TABLE IF NOT EXISTS listener_status (
    id                INTEGER PRIMARY KEY CHECK (id = 1),
    is_active         INTEGER NOT NULL,
    last_heartbeat_us INTEGER NOT NULL,
    started_at_us     INTEGER
);

CREATE TABLE IF NOT EXISTS settings (
    key   TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
";

// ---------------------------------------------------------------------------
// Filters
// ---------------------------------------------------------------------------

/// Row filters applied in SQL before any dedup computation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageFilter {
    /// Case-insensitive substring of the address.
    pub address: Option<String>,
    /// Calendar day of the write timestamp in the local timezone, the same
    /// zone the CLI displays times in.
    pub date: Option<NaiveDate>,
    /// Case-insensitive substring of the address or the content.
    pub search: Option<String>,
}

/// Selection for the administrative purge.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PurgeFilter {
    /// Only rows written more than this long ago are eligible.
    pub older_than: Option<Duration>,
    /// The N most recent rows are never deleted.
    pub keep_recent: usize,
}

/// Outcome of [`MessageStore::purge`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PurgeReport {
    pub matched: usize,
    pub deleted: usize,
    pub remaining: usize,
}

// ---------------------------------------------------------------------------
// MessageStore
// ---------------------------------------------------------------------------

/// SQLite-backed page store.
///
/// Thread-safe: share it as `Arc<MessageStore>`. All access goes through one
/// connection behind a mutex, so a reader never observes a half-written row.
pub struct MessageStore {
    conn: Mutex<Connection>,
    clock: Arc<dyn Clock>,
    capacity: usize,
}

impl std::fmt::Debug for MessageStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageStore")
            .field("capacity", &self.capacity)
            .finish_non_exhaustive()
    }
}

impl MessageStore {
    /// Open or create the database at `path`, creating parent directories.
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        info!(path = %path.display(), "opening message store");

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA busy_timeout=5000;")?;
        Self::init(conn)
    }

    /// A private in-memory database. Used by tests and benches.
    pub fn open_in_memory() -> StoreResult<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> StoreResult<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
            clock: Arc::new(SystemClock),
            capacity: MAX_MESSAGES,
        })
    }

    /// Replace the time source used to stamp records and heartbeats.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Override the retention ceiling.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub(crate) fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    // -----------------------------------------------------------------------
    // Writes
    // -----------------------------------------------------------------------

    /// Persist a decoded page, stamping it with the current time.
    ///
    /// The timestamp never goes backwards: if the clock reads earlier than
    /// the newest stored row, the newest row's timestamp is reused. When the
    /// row count exceeds the capacity afterwards, exactly one row, the oldest,
    /// is deleted.
    pub fn append(&self, line: &DecodedLine) -> StoreResult<Message> {
        if line.address.is_empty() || line.function.is_empty() || line.raw_line.is_empty() {
            return Err(StoreError::InvalidRecord(format!(
                "address, function and raw line are required: {:?}",
                line.raw_line
            )));
        }

        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let newest: Option<i64> =
            tx.query_row("SELECT MAX(timestamp_us) FROM messages", [], |row| row.get(0))?;
        let now_us = self.clock.now().timestamp_micros();
        let ts_us = newest.map_or(now_us, |newest| now_us.max(newest));

        tx.execute(
            "INSERT INTO messages (timestamp_us, address, function, content, raw_line)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![ts_us, line.address, line.function, line.content, line.raw_line],
        )?;
        let id = tx.last_insert_rowid();

        let count: i64 = tx.query_row("SELECT COUNT(*) FROM messages", [], |row| row.get(0))?;
        if count as usize > self.capacity {
            let trimmed = tx.execute(
                "DELETE FROM messages WHERE id = (
                     SELECT id FROM messages ORDER BY timestamp_us ASC, id ASC LIMIT 1
                 )",
                [],
            )?;
            debug!(trimmed, capacity = self.capacity, "retention trim");
        }

        tx.commit()?;

        Ok(Message {
            id,
            timestamp: micros_to_utc("timestamp_us", ts_us)?,
            address: line.address.clone(),
            function: line.function.clone(),
            content: line.content.clone(),
            raw_line: line.raw_line.clone(),
        })
    }

    /// Delete rows selected by `filter`.
    pub fn purge(&self, filter: &PurgeFilter) -> StoreResult<PurgeReport> {
        let (clause, values) = self.purge_clause(filter);
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let matched: i64 = tx.query_row(
            &format!("SELECT COUNT(*) FROM messages WHERE {clause}"),
            params_from_iter(values.iter()),
            |row| row.get(0),
        )?;
        let deleted = tx.execute(
            &format!("DELETE FROM messages WHERE {clause}"),
            params_from_iter(values.iter()),
        )?;
        let remaining: i64 =
            tx.query_row("SELECT COUNT(*) FROM messages", [], |row| row.get(0))?;
        tx.commit()?;

        info!(deleted, remaining, "purged messages");
        Ok(PurgeReport {
            matched: matched as usize,
            deleted,
            remaining: remaining as usize,
        })
    }

    /// How many rows [`purge`](Self::purge) would delete right now.
    pub fn count_purgeable(&self, filter: &PurgeFilter) -> StoreResult<usize> {
        let (clause, values) = self.purge_clause(filter);
        let count: i64 = self.conn().query_row(
            &format!("SELECT COUNT(*) FROM messages WHERE {clause}"),
            params_from_iter(values.iter()),
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    fn purge_clause(&self, filter: &PurgeFilter) -> (String, Vec<Value>) {
        let mut clauses = vec!["1 = 1".to_string()];
        let mut values = Vec::new();

        if let Some(age) = filter.older_than {
            let cutoff = self.clock.now() - age;
            clauses.push(format!("timestamp_us < ?{}", values.len() + 1));
            values.push(Value::Integer(cutoff.timestamp_micros()));
        }
        if filter.keep_recent > 0 {
            clauses.push(format!(
                "id NOT IN (SELECT id FROM messages ORDER BY timestamp_us DESC, id DESC LIMIT ?{})",
                values.len() + 1
            ));
            values.push(Value::Integer(filter.keep_recent as i64));
        }

        (clauses.join(" AND "), values)
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    pub fn len(&self) -> StoreResult<usize> {
        let count: i64 =
            self.conn()
                .query_row("SELECT COUNT(*) FROM messages", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    pub fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.len()? == 0)
    }

    /// All rows matching `filter`, oldest first.
    pub fn scan_ascending(&self, filter: &MessageFilter) -> StoreResult<Vec<Message>> {
        let mut clauses = vec!["1 = 1".to_string()];
        let mut values = Vec::new();

        if let Some(address) = non_blank(&filter.address) {
            values.push(Value::Text(address.to_lowercase()));
            clauses.push(format!("instr(lower(address), ?{}) > 0", values.len()));
        }
        if let Some(date) = filter.date {
            let (start, end) = day_bounds_us(date, &Local);
            values.push(Value::Integer(start));
            clauses.push(format!("timestamp_us >= ?{}", values.len()));
            values.push(Value::Integer(end));
            clauses.push(format!("timestamp_us < ?{}", values.len()));
        }
        if let Some(search) = non_blank(&filter.search) {
            values.push(Value::Text(search.to_lowercase()));
            let n = values.len();
            clauses.push(format!(
                "(instr(lower(content), ?{n}) > 0 OR instr(lower(address), ?{n}) > 0)"
            ));
        }

        let sql = format!(
            "SELECT id, timestamp_us, address, function, content, raw_line
             FROM messages WHERE {} ORDER BY timestamp_us ASC, id ASC",
            clauses.join(" AND ")
        );

        let conn = self.conn();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(values.iter()), |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
            ))
        })?;

        let mut messages = Vec::new();
        for row in rows {
            let (id, ts_us, address, function, content, raw_line) = row?;
            messages.push(Message {
                id,
                timestamp: micros_to_utc("timestamp_us", ts_us)?,
                address,
                function,
                content,
                raw_line,
            });
        }
        Ok(messages)
    }

    // -----------------------------------------------------------------------
    // Shared settings
    // -----------------------------------------------------------------------

    /// Publish the dedup window so query-time readers pick it up.
    pub fn set_dedupe_minutes(&self, minutes: u32) -> StoreResult<()> {
        self.conn().execute(
            "INSERT INTO settings (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![DEDUPE_MINUTES_KEY, minutes.to_string()],
        )?;
        Ok(())
    }

    /// Current dedup window in minutes, or the default when unset.
    pub fn dedupe_minutes(&self) -> StoreResult<u32> {
        let raw: Option<String> = self
            .conn()
            .query_row(
                "SELECT value FROM settings WHERE key = ?1",
                params![DEDUPE_MINUTES_KEY],
                |row| row.get(0),
            )
            .optional()?;

        Ok(match raw {
            None => DEFAULT_WINDOW_MINUTES,
            Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
                warn!(value = %raw, "unparsable dedupe_minutes setting, using default");
                DEFAULT_WINDOW_MINUTES
            }),
        })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

pub(crate) fn micros_to_utc(column: &'static str, value: i64) -> StoreResult<DateTime<Utc>> {
    DateTime::from_timestamp_micros(value).ok_or(StoreError::Timestamp { column, value })
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Start and end (exclusive) of `date` in `tz`, as UTC micros.
fn day_bounds_us<Tz: TimeZone>(date: NaiveDate, tz: &Tz) -> (i64, i64) {
    let end = date
        .succ_opt()
        .map_or(i64::MAX, |next| day_start_us(next, tz));
    (day_start_us(date, tz), end)
}

/// Midnight can fall in a DST gap; the day then starts at the first hour
/// that exists.
fn day_start_us<Tz: TimeZone>(date: NaiveDate, tz: &Tz) -> i64 {
    let midnight = date.and_time(NaiveTime::MIN);
    (0..24)
        .find_map(|h| {
            (midnight + Duration::hours(h))
                .and_local_timezone(tz.clone())
                .earliest()
        })
        .map_or_else(
            || midnight.and_utc().timestamp_micros(),
            |start| start.timestamp_micros(),
        )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
