//! Plain-text and JSON rendering for the read-side commands.

use chrono::{DateTime, Local, Utc};
use pagewatch_core::{ListenerStatus, Message};
use pagewatch_feeds::ReceiverSettings;
use std::io::Write;

const TIME_FORMAT: &str = "%d/%m/%Y %H:%M:%S";

pub fn local_time(ts: DateTime<Utc>) -> String {
    ts.with_timezone(&Local).format(TIME_FORMAT).to_string()
}

/// One page per line: `time  address  content`.
pub fn message_line(message: &Message) -> String {
    format!(
        "{}  {:>8}  {}",
        local_time(message.timestamp),
        message.address,
        message.content
    )
}

pub fn write_messages<W: Write>(out: &mut W, messages: &[Message], json: bool) -> std::io::Result<()> {
    if messages.is_empty() && !json {
        writeln!(out, "no messages")?;
        return Ok(());
    }
    for message in messages {
        if json {
            serde_json::to_writer(&mut *out, message)?;
            writeln!(out)?;
        } else {
            writeln!(out, "{}", message_line(message))?;
        }
    }
    Ok(())
}

pub fn write_status<W: Write>(out: &mut W, status: &ListenerStatus, json: bool) -> std::io::Result<()> {
    if json {
        serde_json::to_writer(&mut *out, status)?;
        return writeln!(out);
    }

    if status.is_active {
        let since = status
            .started_at
            .map(local_time)
            .unwrap_or_else(|| "unknown".to_string());
        writeln!(out, "listener: running (since {since})")?;
    } else {
        writeln!(out, "listener: stopped")?;
    }
    writeln!(out, "last heartbeat: {}", local_time(status.last_heartbeat))
}

/// Startup banner for `listen`.
pub fn banner(settings: &ReceiverSettings) -> String {
    let rates: Vec<String> = settings.rates.iter().map(ToString::to_string).collect();
    format!(
        "listening on {} (gain {} dB, bias tee {}, {} Hz, POCSAG {}, dedup {} min); Ctrl+C to stop",
        settings.frequency,
        settings.gain,
        if settings.bias_tee { "on" } else { "off" },
        settings.sample_rate,
        rates.join("/"),
        settings.dedupe_minutes,
    )
}
