//! pagewatch-feeds: the receiver side of pagewatch.
//!
//! A feed is the running `rtl_fm | multimon-ng` pipe. [`command`] validates
//! receiver settings and turns them into argument vectors, [`process`] spawns
//! and wires the two programs, and [`session`] drives one decode session:
//! decoder stdout → extractor → store, with a heartbeat alongside.

pub mod command;
pub mod process;
pub mod session;

pub use command::{PocsagRate, ReceiverSettings, SettingsError};
pub use process::{DecoderProcess, DecoderSpawner, SpawnError};
pub use session::{Session, SessionEnd, SessionError, SessionReport, SessionState};

use std::future::Future;
use tokio::io::AsyncRead;

/// A running source of decoder output lines.
pub trait FeedHandle: Send {
    /// Byte stream carrying the decoder's standard output.
    type Output: AsyncRead + Unpin + Send + 'static;

    /// Take the output stream. Returns `None` once it has been taken.
    fn take_output(&mut self) -> Option<Self::Output>;

    /// Stop the underlying process(es) and reap them. Must be safe to call
    /// after the feed has already exited on its own.
    fn terminate(&mut self) -> impl Future<Output = std::io::Result<()>> + Send;
}

/// Starts feeds for a session.
pub trait FeedSpawner {
    type Feed: FeedHandle;

    fn spawn(&self, settings: &ReceiverSettings) -> Result<Self::Feed, SpawnError>;
}
