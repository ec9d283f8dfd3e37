//! FakeSpawner: a feed backed by a channel instead of `rtl_fm | multimon-ng`.
//!
//! The harness pushes decoder lines through a [`FakeFeedWriter`]; the session
//! reads them through [`StreamReader`] exactly as it would read the decoder's
//! stdout. Dropping or closing the writer is the decoder exiting.

use bytes::Bytes;
use futures::{Stream, StreamExt};
use pagewatch_feeds::{FeedHandle, FeedSpawner, ReceiverSettings, SpawnError};
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio_util::io::StreamReader;

/// A handle for pushing decoder lines into a [`FakeFeed`].
#[derive(Clone)]
pub struct FakeFeedWriter {
    tx: mpsc::UnboundedSender<Bytes>,
}

impl FakeFeedWriter {
    /// Send a decoder line. Adds a trailing newline if not already present.
    pub fn send_line(&self, line: impl Into<String>) {
        let mut s = line.into();
        if !s.ends_with('\n') {
            s.push('\n');
        }
        let _ = self.tx.send(Bytes::from(s));
    }

    /// Send raw bytes unchanged (partial lines, invalid UTF-8).
    pub fn send_bytes(&self, bytes: &'static [u8]) {
        let _ = self.tx.send(Bytes::from_static(bytes));
    }

    pub fn send_burst(&self, lines: &[&str]) {
        for line in lines {
            self.send_line(*line);
        }
    }

    /// Close the stream, causing the session to see EOF.
    pub fn close(self) {}
}

/// Decoder output as a byte stream.
pub struct FakeOutput {
    rx: mpsc::UnboundedReceiver<Bytes>,
}

impl Stream for FakeOutput {
    type Item = Bytes;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

type FakeReader = StreamReader<
    futures::stream::Map<FakeOutput, fn(Bytes) -> std::io::Result<Bytes>>,
    Bytes,
>;

/// The running fake decoder.
pub struct FakeFeed {
    output: Option<FakeReader>,
    terminated: Arc<AtomicUsize>,
}

impl FeedHandle for FakeFeed {
    type Output = FakeReader;

    fn take_output(&mut self) -> Option<FakeReader> {
        self.output.take()
    }

    async fn terminate(&mut self) -> std::io::Result<()> {
        self.terminated.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Hands out one pre-wired [`FakeFeed`]; records the settings it was given.
pub struct FakeSpawner {
    output: Mutex<Option<FakeOutput>>,
    pub seen_settings: Mutex<Vec<ReceiverSettings>>,
    pub terminated: Arc<AtomicUsize>,
}

impl FakeSpawner {
    pub fn terminations(&self) -> usize {
        self.terminated.load(Ordering::SeqCst)
    }
}

impl FeedSpawner for FakeSpawner {
    type Feed = FakeFeed;

    fn spawn(&self, settings: &ReceiverSettings) -> Result<FakeFeed, SpawnError> {
        settings.validate()?;
        self.seen_settings
            .lock()
            .unwrap()
            .push(settings.clone());
        let rx = self
            .output
            .lock()
            .unwrap()
            .take()
            .expect("FakeSpawner spawns a single feed");
        let ok: fn(Bytes) -> std::io::Result<Bytes> = Ok;
        Ok(FakeFeed {
            output: Some(StreamReader::new(rx.map(ok))),
            terminated: self.terminated.clone(),
        })
    }
}

/// Create a linked writer/spawner pair.
///
/// ```rust
/// let (writer, spawner) = fake_feed();
/// writer.send_line("POCSAG1200: Address: 1234567  Function: 0  Alpha:   HELLO");
/// writer.close();
/// ```
pub fn fake_feed() -> (FakeFeedWriter, FakeSpawner) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        FakeFeedWriter { tx },
        FakeSpawner {
            output: Mutex::new(Some(FakeOutput { rx })),
            seen_settings: Mutex::new(Vec::new()),
            terminated: Arc::new(AtomicUsize::new(0)),
        },
    )
}

/// A spawner whose programs cannot be found.
pub struct MissingBinarySpawner;

impl FeedSpawner for MissingBinarySpawner {
    type Feed = FakeFeed;

    fn spawn(&self, _settings: &ReceiverSettings) -> Result<FakeFeed, SpawnError> {
        Err(SpawnError::Spawn {
            program: "rtl_fm".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "No such file or directory"),
        })
    }
}
