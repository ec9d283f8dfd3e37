//! Test builders: decoder lines and stores.
//!
//! These builders are designed for readability in test assertions, not for
//! production use. They panic on invalid input rather than returning `Result`.

use chrono::{DateTime, TimeZone, Utc};
use pagewatch_core::{DecodedLine, ManualClock, MessageStore, PayloadKind};
use std::sync::Arc;

// ---------------------------------------------------------------------------
// PageLineBuilder
// ---------------------------------------------------------------------------

/// Fluent builder for multimon-ng POCSAG output lines.
///
/// # Example
///
/// ```rust
/// let line = PageLineBuilder::new("1234567", "FIRE AT 12 MAIN ST")
///     .rate(512)
///     .function(3)
///     .build();
/// ```
pub struct PageLineBuilder {
    rate: u32,
    address: String,
    function: u8,
    kind: PayloadKind,
    content: String,
}

impl PageLineBuilder {
    pub fn new(address: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            rate: 1200,
            address: address.into(),
            function: 0,
            kind: PayloadKind::Alpha,
            content: content.into(),
        }
    }

    pub fn rate(mut self, rate: u32) -> Self {
        self.rate = rate;
        self
    }

    pub fn function(mut self, function: u8) -> Self {
        self.function = function;
        self
    }

    pub fn numeric(mut self) -> Self {
        self.kind = PayloadKind::Numeric;
        self
    }

    /// The line as multimon-ng prints it.
    pub fn build(self) -> String {
        let tag = match self.kind {
            PayloadKind::Alpha => "Alpha",
            PayloadKind::Numeric => "Numeric",
        };
        format!(
            "POCSAG{}: Address: {:>7}  Function: {}  {}:   {}",
            self.rate, self.address, self.function, tag, self.content
        )
    }

    /// The record the extractor should produce for [`build`](Self::build).
    pub fn decoded(self) -> DecodedLine {
        let kind = self.kind;
        let address = self.address.trim().to_string();
        let function = self.function.to_string();
        let content = self.content.trim().to_string();
        let raw_line = self.build();
        DecodedLine {
            address,
            function,
            content,
            kind,
            raw_line,
        }
    }
}

/// Shorthand for an alpha page at 1200 baud.
pub fn page(address: &str, content: &str) -> String {
    PageLineBuilder::new(address, content).build()
}

/// Shorthand for an already-extracted record.
pub fn decoded(address: &str, content: &str) -> DecodedLine {
    PageLineBuilder::new(address, content).decoded()
}

// ---------------------------------------------------------------------------
// Stores
// ---------------------------------------------------------------------------

/// 2024-03-01 12:00:00 UTC, the epoch every harness starts from.
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
}

/// An in-memory store on a manual clock set to [`t0`].
pub fn manual_store() -> (Arc<MessageStore>, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(t0()));
    let store = MessageStore::open_in_memory()
        .unwrap()
        .with_clock(clock.clone());
    (Arc::new(store), clock)
}

/// Same as [`manual_store`] with a custom retention capacity.
pub fn manual_store_with_capacity(capacity: usize) -> (Arc<MessageStore>, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(t0()));
    let store = MessageStore::open_in_memory()
        .unwrap()
        .with_clock(clock.clone())
        .with_capacity(capacity);
    (Arc::new(store), clock)
}
