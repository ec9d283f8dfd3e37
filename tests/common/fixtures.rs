//! Static decoder-output corpora used across harnesses.

/// What multimon-ng prints on a busy channel: banners, noise and pages.
pub const CORPUS_SESSION: &[&str] = &[
    "multimon-ng 1.3.1",
    "  (C) 1996/1997 by Tom Sailer HB9JNX/AE4WA",
    "  (C) 2012-2024 by Elias Oenal",
    "Available demodulators: POCSAG512 POCSAG1200 POCSAG2400",
    "Enabled demodulators: POCSAG512 POCSAG1200 POCSAG2400",
    "POCSAG1200: Address: 1234567  Function: 0  Alpha:   FIRE AT 12 MAIN ST",
    "POCSAG512: Address:  200001  Function: 3  Numeric:  0123456789",
    "POCSAG1200: Address:  1000001  Function: 1  ",
    "POCSAG2400: Address: 7654321  Function: 2  Alpha:   AMBULANCE REQUIRED<CR><LF>",
    "",
];

/// Pages in [`CORPUS_SESSION`], in order: (address, content).
pub const CORPUS_SESSION_PAGES: &[(&str, &str)] = &[
    ("1234567", "FIRE AT 12 MAIN ST"),
    ("200001", "0123456789"),
    ("7654321", "AMBULANCE REQUIRED<CR><LF>"),
];

/// Lines the extractor must never turn into a page.
pub const CORPUS_NOISE: &[&str] = &[
    "",
    "   ",
    "multimon-ng 1.3.1",
    "Enabled demodulators: POCSAG1200",
    "POCSAG1200: Address: 1234567  Function: 0",
    "POCSAG1200: Address: ABCDEF  Function: 0  Alpha:   HELLO",
    "FLEX: 1600/2/A 01.049 [001234567] ALN hello",
    "EAS: ZCZC-WXR-TOR-029037+0030-1051700-KEAX/NWS-",
];

/// Generate `n` distinct pages across 50 addresses for throughput tests.
pub fn corpus_high_volume(n: usize) -> Vec<String> {
    (0..n)
        .map(|i| {
            format!(
                "POCSAG1200: Address: {:>7}  Function: {}  Alpha:   UNIT {} RESPOND INCIDENT {}",
                1_000_000 + (i % 50),
                i % 4,
                i % 17,
                i
            )
        })
        .collect()
}
