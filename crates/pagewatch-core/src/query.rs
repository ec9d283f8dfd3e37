//! Query facade: the read side consumed by the CLI.
//!
//! Filters run against the raw rows in SQL, then the whole filtered history is
//! scanned in time order through the dedup window, and only then is the result
//! cut down to the requested limit. Scanning everything keeps the output
//! identical to a from-scratch computation regardless of the limit.

use crate::{
    dedup::{dedupe, window_from_minutes},
    error::StoreResult,
    store::{MessageFilter, MessageStore},
    types::Message,
};

/// Result-count limits a caller may ask for.
pub const ALLOWED_LIMITS: [usize; 7] = [20, 50, 100, 150, 200, 500, 1000];

/// Limit used when none (or an invalid one) is given.
pub const DEFAULT_LIMIT: usize = 50;

/// A result-count limit drawn from [`ALLOWED_LIMITS`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limit(usize);

impl Limit {
    /// `None` unless `n` is one of the allowed values.
    pub fn new(n: usize) -> Option<Self> {
        ALLOWED_LIMITS.contains(&n).then_some(Self(n))
    }

    /// Parse user input, falling back to the default on anything invalid.
    pub fn parse_or_default(raw: &str) -> Self {
        raw.trim()
            .parse()
            .ok()
            .and_then(Self::new)
            .unwrap_or_default()
    }

    pub fn get(self) -> usize {
        self.0
    }
}

impl Default for Limit {
    fn default() -> Self {
        Self(DEFAULT_LIMIT)
    }
}

/// A filtered, limited, deduplicated read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageQuery {
    pub filter: MessageFilter,
    pub limit: Limit,
}

/// Run `query`, most recent first.
///
/// The dedup window is read from the store on every call, so a listener
/// restarted with a new window is picked up without restarting readers.
pub fn query_messages(store: &MessageStore, query: &MessageQuery) -> StoreResult<Vec<Message>> {
    let window = window_from_minutes(store.dedupe_minutes()?);
    let rows = store.scan_ascending(&query.filter)?;
    let mut novel = dedupe(rows, window);
    novel.truncate(query.limit.get());
    Ok(novel)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
