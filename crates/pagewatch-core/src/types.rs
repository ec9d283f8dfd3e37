//! Core types shared across pagewatch layers.
//!
//! [`DecodedLine`] is what the extractor produces from one decoder line,
//! [`Message`] is the same data once the store has stamped and persisted it,
//! and [`ListenerStatus`] is the singleton liveness row.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// A structured page pulled out of one line of decoder output.
///
/// Not yet persisted: it has no id and no timestamp. The store assigns both
/// on [`MessageStore::append`](crate::MessageStore::append).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedLine {
    /// Pager address (RIC), digits only.
    pub address: String,
    /// Function code, digits only.
    pub function: String,
    /// Payload text, trimmed. May be empty.
    pub content: String,
    /// Whether the decoder printed the payload as `Alpha:` or `Numeric:`.
    pub kind: PayloadKind,
    /// The original trimmed line, kept for auditing.
    pub raw_line: String,
}

/// Payload encoding marker emitted by the decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PayloadKind {
    Alpha,
    Numeric,
}

impl std::fmt::Display for PayloadKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PayloadKind::Alpha => write!(f, "alpha"),
            PayloadKind::Numeric => write!(f, "numeric"),
        }
    }
}

/// A persisted page. Immutable once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    /// Store-assigned row id, increasing with insertion order.
    pub id: i64,
    /// Write time (UTC), non-decreasing in insertion order.
    pub timestamp: DateTime<Utc>,
    pub address: String,
    pub function: String,
    pub content: String,
    pub raw_line: String,
}

/// The singleton listener liveness row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListenerStatus {
    /// Whether a decode session is running. Already corrected for staleness
    /// when obtained through [`Liveness::get_status`](crate::Liveness::get_status).
    pub is_active: bool,
    pub last_heartbeat: DateTime<Utc>,
    /// Set when a session starts, cleared when it stops.
    pub started_at: Option<DateTime<Utc>>,
}
