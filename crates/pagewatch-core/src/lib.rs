//! pagewatch-core: pager listener core library.
//!
//! This crate holds everything that does not touch a child process: the
//! shared record types, line extraction, the view-time dedup window, the
//! SQLite-backed message store and liveness tracker, and the query facade
//! consumed by the CLI.
//!
//! # Architecture
//!
//! ```text
//! decoder stdout ──► extract ──► MessageStore::append (inline retention)
//!                                      │
//!            Liveness ◄── heartbeat    └──► query ──► dedup ──► CLI
//! ```
//!
//! Raw records are always stored. Deduplication only happens when reading.

pub mod clock;
pub mod config;
pub mod dedup;
pub mod error;
pub mod extract;
pub mod liveness;
pub mod query;
pub mod store;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{StoreError, StoreResult};
pub use liveness::Liveness;
pub use store::MessageStore;
pub use types::{DecodedLine, ListenerStatus, Message, PayloadKind};
