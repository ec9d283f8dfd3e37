//! Dedup window: view-time suppression of repeated pages.
//!
//! Pagers retransmit the same page several times. Given records in ascending
//! time order, a record is *novel* if it is the first one seen for its
//! `(address, content)` key, or if at least `window` has elapsed since the
//! previous novel record with that key. Everything else is dropped.
//!
//! The scan is a single forward pass with one map entry per distinct key.
//! A zero window keeps every record.

use crate::types::Message;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;

/// Default window, in minutes, when none has been configured.
pub const DEFAULT_WINDOW_MINUTES: u32 = 3;

/// A record that can be pushed through the dedup window.
pub trait Windowed {
    fn address(&self) -> &str;
    fn content(&self) -> &str;
    fn timestamp(&self) -> DateTime<Utc>;
}

impl Windowed for Message {
    fn address(&self) -> &str {
        &self.address
    }

    fn content(&self) -> &str {
        &self.content
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// Convert a configured minute count into a window duration.
pub fn window_from_minutes(minutes: u32) -> Duration {
    Duration::minutes(i64::from(minutes))
}

/// Return the novel records of an ascending sequence, still ascending.
pub fn novel_ascending<T, I>(records: I, window: Duration) -> Vec<T>
where
    T: Windowed,
    I: IntoIterator<Item = T>,
{
    let mut last_novel: HashMap<(String, String), DateTime<Utc>> = HashMap::new();
    let mut novel = Vec::new();

    for record in records {
        let ts = record.timestamp();
        let key = (record.address().to_owned(), record.content().to_owned());
        match last_novel.get_mut(&key) {
            Some(last) if ts - *last < window => continue,
            Some(last) => *last = ts,
            None => {
                last_novel.insert(key, ts);
            }
        }
        novel.push(record);
    }

    novel
}

/// Return the novel records of an ascending sequence, most recent first.
///
/// This is the shape the query layer hands to callers.
pub fn dedupe<T, I>(records: I, window: Duration) -> Vec<T>
where
    T: Windowed,
    I: IntoIterator<Item = T>,
{
    let mut novel = novel_ascending(records, window);
    novel.reverse();
    novel
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
