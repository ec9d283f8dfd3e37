//! Domain-specific assertions for pagewatch harnesses.
//!
//! These wrap `pretty_assertions` and add context-rich failure messages that
//! make it clear which property of the message log was violated.

use pagewatch_core::Message;

/// Assert that `messages` holds exactly these (address, content) pairs, in
/// order.
pub fn assert_pages(messages: &[Message], expected: &[(&str, &str)]) {
    let actual: Vec<(&str, &str)> = messages
        .iter()
        .map(|m| (m.address.as_str(), m.content.as_str()))
        .collect();
    pretty_assertions::assert_eq!(actual, expected, "page list mismatch");
}

/// Assert newest-first ordering: timestamps non-increasing, ties broken by
/// descending id.
pub fn assert_newest_first(messages: &[Message]) {
    for pair in messages.windows(2) {
        let (a, b) = (&pair[0], &pair[1]);
        assert!(
            (a.timestamp, a.id) > (b.timestamp, b.id),
            "messages out of order:\n  #{} at {}\n  #{} at {}",
            a.id,
            a.timestamp,
            b.id,
            b.timestamp
        );
    }
}

/// Assert insertion ordering: timestamps non-decreasing and ids increasing.
pub fn assert_oldest_first(messages: &[Message]) {
    for pair in messages.windows(2) {
        let (a, b) = (&pair[0], &pair[1]);
        assert!(
            a.timestamp <= b.timestamp && a.id < b.id,
            "messages out of insertion order:\n  #{} at {}\n  #{} at {}",
            a.id,
            a.timestamp,
            b.id,
            b.timestamp
        );
    }
}
