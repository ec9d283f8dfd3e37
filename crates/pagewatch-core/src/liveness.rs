//! Liveness tracker: the singleton "is the listener running?" row.
//!
//! The listener heartbeats every few seconds while a session runs. Readers
//! never trust the stored flag on its own: if the last heartbeat is older than
//! [`STALE_AFTER_SECS`], the listener is reported inactive and the stored flag
//! is corrected, which covers a listener that died without cleaning up.
//!
//! Each operation is an independent read-modify-write against the database.
//! Concurrent callers serialise on the store's connection; last writer wins.

use crate::{
    error::StoreResult,
    store::{micros_to_utc, MessageStore},
    types::ListenerStatus,
};
use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// A heartbeat older than this many seconds means the listener is gone.
pub const STALE_AFTER_SECS: i64 = 10;

/// Handle on the liveness row. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Liveness {
    store: Arc<MessageStore>,
}

impl Liveness {
    pub fn new(store: Arc<MessageStore>) -> Self {
        Self { store }
    }

    /// Current status, corrected for staleness.
    ///
    /// When the stored flag says active but the heartbeat is stale, the flag
    /// is flipped to inactive and persisted before returning.
    pub fn get_status(&self) -> StoreResult<ListenerStatus> {
        let now = self.store.clock().now();
        let conn = self.store.conn();
        current(&conn, now)
    }

    /// Mark a session as started (`true`) or stopped (`false`).
    ///
    /// Starting stamps `started_at`; stopping clears it. Both refresh the
    /// heartbeat.
    pub fn set_active(&self, active: bool) -> StoreResult<ListenerStatus> {
        let now = self.store.clock().now();
        let conn = self.store.conn();
        let mut status = current(&conn, now)?;

        status.is_active = active;
        status.last_heartbeat = now;
        status.started_at = active.then_some(now);
        write(&conn, &status)?;

        debug!(active, "listener status set");
        Ok(status)
    }

    /// Record that the listener is alive. Leaves `started_at` alone.
    pub fn heartbeat(&self) -> StoreResult<ListenerStatus> {
        let now = self.store.clock().now();
        let conn = self.store.conn();
        beat(&conn, now)
    }

    /// [`heartbeat`](Self::heartbeat), but only while `running` is set.
    ///
    /// The flag is checked with the connection held, so once a caller has
    /// cleared it and then written the row itself, no beat from this call
    /// can land afterwards.
    pub fn heartbeat_while(&self, running: &AtomicBool) -> StoreResult<Option<ListenerStatus>> {
        let now = self.store.clock().now();
        let conn = self.store.conn();
        if !running.load(Ordering::Acquire) {
            return Ok(None);
        }
        beat(&conn, now).map(Some)
    }
}

// ---------------------------------------------------------------------------
// Row access
// ---------------------------------------------------------------------------

fn beat(conn: &Connection, now: DateTime<Utc>) -> StoreResult<ListenerStatus> {
    let mut status = current(conn, now)?;

    status.is_active = true;
    status.last_heartbeat = now;
    write(conn, &status)?;
    Ok(status)
}

/// Load (creating lazily) and staleness-correct the status row.
fn current(conn: &Connection, now: DateTime<Utc>) -> StoreResult<ListenerStatus> {
    let row: Option<(bool, i64, Option<i64>)> = conn
        .query_row(
            "SELECT is_active, last_heartbeat_us, started_at_us
             FROM listener_status WHERE id = 1",
            [],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )
        .optional()?;

    let Some((is_active, heartbeat_us, started_us)) = row else {
        let status = ListenerStatus {
            is_active: false,
            last_heartbeat: now,
            started_at: None,
        };
        write(conn, &status)?;
        return Ok(status);
    };

    let mut status = ListenerStatus {
        is_active,
        last_heartbeat: micros_to_utc("last_heartbeat_us", heartbeat_us)?,
        started_at: started_us
            .map(|us| micros_to_utc("started_at_us", us))
            .transpose()?,
    };

    if status.is_active && now - status.last_heartbeat > Duration::seconds(STALE_AFTER_SECS) {
        warn!(
            last_heartbeat = %status.last_heartbeat,
            "listener heartbeat is stale, marking inactive"
        );
        status.is_active = false;
        conn.execute(
            "UPDATE listener_status SET is_active = 0 WHERE id = 1",
            [],
        )?;
    }

    Ok(status)
}

fn write(conn: &Connection, status: &ListenerStatus) -> StoreResult<()> {
    conn.execute(
        "INSERT INTO listener_status (id, is_active, last_heartbeat_us, started_at_us)
         VALUES (1, ?1, ?2, ?3)
         ON CONFLICT(id) DO UPDATE SET
             is_active = excluded.is_active,
             last_heartbeat_us = excluded.last_heartbeat_us,
             started_at_us = excluded.started_at_us",
        params![
            status.is_active,
            status.last_heartbeat.timestamp_micros(),
            status.started_at.map(|t| t.timestamp_micros()),
        ],
    )?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
