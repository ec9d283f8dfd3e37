//! Line extractor: turns one line of `multimon-ng` output into a
//! [`DecodedLine`].
//!
//! Only POCSAG page lines are recognised:
//!
//! ```text
//! POCSAG1200: Address: 1234567  Function: 3  Alpha:   TEST A
//! POCSAG512: Address:  42 Function: 0 Numeric: 0123-456
//! ```
//!
//! Everything else the decoder prints (banners, `Enabled demodulators:`,
//! tone-only pages, noise) yields `None` and must be skipped by the caller.

use crate::types::{DecodedLine, PayloadKind};
use regex::Regex;
use std::sync::OnceLock;

const PAGE_PATTERN: &str = concat!(
    r"^POCSAG\d+:\s*Address:\s*(?P<address>\d+)",
    r"\s+Function:\s*(?P<function>\d+)",
    r"\s+(?P<kind>Alpha|Numeric):\s*(?P<content>.*)$",
);

fn page_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(PAGE_PATTERN).expect("page pattern must compile"))
}

/// Extract a page from one line of decoder output.
///
/// The line is trimmed before matching, and so is every captured field.
/// Returns `None` for anything that is not a complete page line.
pub fn extract(line: &str) -> Option<DecodedLine> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let caps = page_regex().captures(line)?;
    let kind = match &caps["kind"] {
        "Alpha" => PayloadKind::Alpha,
        _ => PayloadKind::Numeric,
    };

    Some(DecodedLine {
        address: caps["address"].to_string(),
        function: caps["function"].to_string(),
        content: caps["content"].trim().to_string(),
        kind,
        raw_line: line.to_string(),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
