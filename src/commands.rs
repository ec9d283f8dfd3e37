//! Subcommand implementations.
//!
//! Each command takes its input and output streams explicitly so the
//! integration tests can drive it against an in-memory buffer.

use crate::cli::{ClearArgs, MessagesArgs, StatusArgs};
use crate::render;
use anyhow::Context;
use pagewatch_core::query::query_messages;
use pagewatch_core::store::PurgeReport;
use pagewatch_core::{ListenerStatus, Liveness, MessageStore};
use pagewatch_feeds::{FeedSpawner, ReceiverSettings, Session, SessionEnd, SessionReport};
use std::io::{BufRead, Write};
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub fn open_store(path: &Path) -> anyhow::Result<Arc<MessageStore>> {
    let store = MessageStore::open(path)
        .with_context(|| format!("could not open message database {}", path.display()))?;
    Ok(Arc::new(store))
}

/// Run one decode session until the feed ends or `cancel` fires.
pub async fn listen<S, W>(
    store: Arc<MessageStore>,
    settings: ReceiverSettings,
    spawner: &S,
    cancel: CancellationToken,
    out: &mut W,
) -> anyhow::Result<SessionReport>
where
    S: FeedSpawner,
    W: Write,
{
    writeln!(out, "{}", render::banner(&settings))?;

    let session = Session::new(store, settings);
    let report = session
        .run(spawner, cancel)
        .await
        .context("decode session failed")?;

    info!(
        lines_read = report.lines_read,
        messages_stored = report.messages_stored,
        lines_skipped = report.lines_skipped,
        end = ?report.end,
        "session finished"
    );
    let reason = match report.end {
        SessionEnd::StreamClosed => "decoder exited",
        SessionEnd::Interrupted => "stopped",
    };
    writeln!(
        out,
        "{reason}: {} lines read, {} pages stored",
        report.lines_read, report.messages_stored
    )?;
    Ok(report)
}

/// Print the deduplicated message list. Returns the number of rows printed.
pub fn messages<W: Write>(store: &MessageStore, args: &MessagesArgs, out: &mut W) -> anyhow::Result<usize> {
    let rows = query_messages(store, &args.query()).context("could not read messages")?;
    render::write_messages(out, &rows, args.json)?;
    Ok(rows.len())
}

pub fn status<W: Write>(
    store: Arc<MessageStore>,
    args: &StatusArgs,
    out: &mut W,
) -> anyhow::Result<ListenerStatus> {
    let status = Liveness::new(store)
        .get_status()
        .context("could not read listener status")?;
    render::write_status(out, &status, args.json)?;
    Ok(status)
}

/// Delete pages, asking first unless `--yes` was given.
///
/// Returns `None` when the operator declined.
pub fn clear<R: BufRead, W: Write>(
    store: &MessageStore,
    args: &ClearArgs,
    input: &mut R,
    out: &mut W,
) -> anyhow::Result<Option<PurgeReport>> {
    let filter = args.filter();
    let matched = store
        .count_purgeable(&filter)
        .context("could not count messages")?;

    if matched == 0 {
        writeln!(out, "nothing to delete")?;
        return Ok(Some(PurgeReport {
            matched: 0,
            deleted: 0,
            remaining: store.len()?,
        }));
    }

    let total = store.len().context("could not count messages")?;
    writeln!(
        out,
        "{total} messages stored, {matched} to delete, {} kept",
        total.saturating_sub(matched)
    )?;

    if !args.yes {
        write!(out, "delete {matched} messages? [y/N] ")?;
        out.flush()?;
        let mut answer = String::new();
        input.read_line(&mut answer)?;
        if !confirmed(&answer) {
            writeln!(out, "aborted")?;
            return Ok(None);
        }
    }

    let report = store.purge(&filter).context("could not delete messages")?;
    info!(deleted = report.deleted, remaining = report.remaining, "messages purged");
    writeln!(
        out,
        "deleted {} messages, {} remaining",
        report.deleted, report.remaining
    )?;
    Ok(Some(report))
}

fn confirmed(answer: &str) -> bool {
    matches!(
        answer.trim().to_ascii_lowercase().as_str(),
        "y" | "yes" | "o" | "oui"
    )
}
