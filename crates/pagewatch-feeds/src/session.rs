//! Ingestion session: one run of the decoder, from spawn to cleanup.
//!
//! ```text
//! Idle ──► Starting ──► Running ──► Stopping ──► Idle
//!              │                        ▲
//!              └──── launch failure ────┴──► Idle
//! ```
//!
//! While running, two activities proceed side by side:
//!
//! - the read loop on the session task, which blocks on each decoder line,
//!   extracts pages and appends them to the store;
//! - a heartbeat task that refreshes the liveness row every
//!   [`HEARTBEAT_INTERVAL`]. It stops when the shared `running` flag is
//!   cleared, so its shutdown latency is bounded by one interval.
//!
//! Stream end, operator cancellation, a read error or a storage error all
//! lead to the same cleanup: terminate the feed, stop and join the heartbeat,
//! mark the listener inactive. If the session future is dropped or panics
//! first, a guard performs the liveness half of that cleanup.

use crate::{FeedHandle, FeedSpawner, ReceiverSettings, SpawnError};
use pagewatch_core::{extract::extract, Liveness, MessageStore, StoreError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::watch;
use tokio::task::{AbortHandle, JoinHandle};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// How often a running session refreshes the liveness row.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(3);

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Lifecycle state of a [`Session`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Starting,
    Running,
    Stopping,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Idle => write!(f, "idle"),
            SessionState::Starting => write!(f, "starting"),
            SessionState::Running => write!(f, "running"),
            SessionState::Stopping => write!(f, "stopping"),
        }
    }
}

/// Why a session that did not fail came to an end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The decoder closed its output.
    StreamClosed,
    /// The operator asked the session to stop.
    Interrupted,
}

/// Counters for a finished session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionReport {
    pub lines_read: u64,
    pub messages_stored: u64,
    /// Lines that were not pages. Never reported individually.
    pub lines_skipped: u64,
    pub end: SessionEnd,
}

/// Which storage operation failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreStage {
    Configure,
    Activate,
    Append,
    Heartbeat,
    Deactivate,
}

impl std::fmt::Display for StoreStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreStage::Configure => write!(f, "publishing the dedup window"),
            StoreStage::Activate => write!(f, "marking the listener active"),
            StoreStage::Append => write!(f, "storing a message"),
            StoreStage::Heartbeat => write!(f, "heartbeat"),
            StoreStage::Deactivate => write!(f, "marking the listener inactive"),
        }
    }
}

/// A session that could not start or could not continue.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("failed to launch decoder: {0}")]
    Launch(#[from] SpawnError),

    #[error("storage failure while {stage}: {source}")]
    Store {
        stage: StoreStage,
        #[source]
        source: StoreError,
    },

    #[error("failed to read decoder output: {0}")]
    Read(#[source] std::io::Error),

    #[error("storage task failed while {stage}: {source}")]
    StoreTask {
        stage: StoreStage,
        #[source]
        source: tokio::task::JoinError,
    },

    #[error("heartbeat task failed: {0}")]
    HeartbeatTask(#[source] tokio::task::JoinError),
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Owns the lifecycle of one decode session at a time.
pub struct Session {
    store: Arc<MessageStore>,
    liveness: Liveness,
    settings: ReceiverSettings,
    heartbeat_interval: Duration,
    state: Arc<watch::Sender<SessionState>>,
}

impl Session {
    pub fn new(store: Arc<MessageStore>, settings: ReceiverSettings) -> Self {
        let (state, _) = watch::channel(SessionState::Idle);
        Self {
            liveness: Liveness::new(store.clone()),
            store,
            settings,
            heartbeat_interval: HEARTBEAT_INTERVAL,
            state: Arc::new(state),
        }
    }

    /// Override the heartbeat period.
    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    pub fn settings(&self) -> &ReceiverSettings {
        &self.settings
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Watch state transitions.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    fn transition(&self, to: SessionState) {
        let from = self.state.send_replace(to);
        debug!(%from, %to, "session state");
    }

    /// Run one session to completion.
    ///
    /// Returns once the decoder's output ends or `cancel` fires. Settings are
    /// validated and the feed spawned before anything is written, so a
    /// launch failure leaves the liveness row and the published dedup window
    /// untouched.
    pub async fn run<S: FeedSpawner>(
        &self,
        spawner: &S,
        cancel: CancellationToken,
    ) -> Result<SessionReport, SessionError> {
        self.transition(SessionState::Starting);

        let launched = self
            .settings
            .validate()
            .map_err(SpawnError::from)
            .and_then(|()| spawner.spawn(&self.settings));
        let mut feed = match launched {
            Ok(feed) => feed,
            Err(e) => {
                error!(error = %e, "decoder launch failed");
                self.transition(SessionState::Idle);
                return Err(e.into());
            }
        };

        let store = self.store.clone();
        let minutes = self.settings.dedupe_minutes;
        let published =
            blocking(StoreStage::Configure, move || store.set_dedupe_minutes(minutes)).await;
        if let Err(e) = published {
            stop_feed(&mut feed).await;
            self.transition(SessionState::Idle);
            return Err(e);
        }

        let Some(output) = feed.take_output() else {
            stop_feed(&mut feed).await;
            self.transition(SessionState::Idle);
            return Err(SpawnError::MissingPipe {
                program: "decoder".to_string(),
            }
            .into());
        };

        let running = Arc::new(AtomicBool::new(true));
        let mut guard = ActiveGuard {
            running: running.clone(),
            liveness: self.liveness.clone(),
            state: self.state.clone(),
            heartbeat: None,
            armed: true,
        };

        let liveness = self.liveness.clone();
        if let Err(e) = blocking(StoreStage::Activate, move || liveness.set_active(true)).await {
            self.transition(SessionState::Stopping);
            stop_feed(&mut feed).await;
            return Err(e);
        }

        let heartbeat = spawn_heartbeat(
            self.liveness.clone(),
            running.clone(),
            self.heartbeat_interval,
        );
        guard.heartbeat = Some(heartbeat.abort_handle());
        self.transition(SessionState::Running);
        info!(
            frequency = %self.settings.frequency,
            dedupe_minutes = self.settings.dedupe_minutes,
            "decode session running"
        );

        let mut counters = Counters::default();
        let outcome = self.pump(output, &cancel, &mut counters).await;

        self.transition(SessionState::Stopping);
        stop_feed(&mut feed).await;
        running.store(false, Ordering::Release);
        let beat = heartbeat.await;
        let liveness = self.liveness.clone();
        let deactivated =
            blocking(StoreStage::Deactivate, move || liveness.set_active(false)).await;
        guard.armed = false;
        self.transition(SessionState::Idle);

        info!(
            lines_read = counters.lines_read,
            messages_stored = counters.messages_stored,
            lines_skipped = counters.lines_skipped,
            "decode session stopped"
        );

        let end = outcome?;
        match beat {
            Ok(Ok(beats)) => debug!(beats, "heartbeat stopped"),
            Ok(Err(source)) => {
                return Err(SessionError::Store {
                    stage: StoreStage::Heartbeat,
                    source,
                })
            }
            Err(join) => return Err(SessionError::HeartbeatTask(join)),
        }
        deactivated?;

        Ok(SessionReport {
            lines_read: counters.lines_read,
            messages_stored: counters.messages_stored,
            lines_skipped: counters.lines_skipped,
            end,
        })
    }

    /// Read decoder output until it ends, is cancelled, or fails.
    async fn pump<R: AsyncRead + Unpin>(
        &self,
        output: R,
        cancel: &CancellationToken,
        counters: &mut Counters,
    ) -> Result<SessionEnd, SessionError> {
        let mut reader = BufReader::new(output);
        let mut buf = Vec::with_capacity(256);

        loop {
            buf.clear();
            let read = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!("decode session interrupted");
                    return Ok(SessionEnd::Interrupted);
                }
                read = reader.read_until(b'\n', &mut buf) => read,
            };

            match read {
                Ok(0) => return Ok(SessionEnd::StreamClosed),
                Ok(_) => {
                    counters.lines_read += 1;
                    let Some(decoded) = extract(&String::from_utf8_lossy(&buf)) else {
                        counters.lines_skipped += 1;
                        continue;
                    };

                    let store = self.store.clone();
                    let message = blocking(StoreStage::Append, move || store.append(&decoded))
                        .await
                        .inspect_err(|e| error!(error = %e, "failed to store message"))?;
                    counters.messages_stored += 1;
                    info!(
                        address = %message.address,
                        function = %message.function,
                        content = %message.content,
                        "message stored"
                    );
                }
                Err(e) => {
                    error!(error = %e, "decoder output read failed");
                    return Err(SessionError::Read(e));
                }
            }
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    lines_read: u64,
    messages_stored: u64,
    lines_skipped: u64,
}

/// Run a store call on the blocking pool. SQLite may wait on another
/// process's write lock for up to the busy timeout.
async fn blocking<T, F>(stage: StoreStage, call: F) -> Result<T, SessionError>
where
    F: FnOnce() -> Result<T, StoreError> + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(call).await {
        Ok(result) => result.map_err(|source| SessionError::Store { stage, source }),
        Err(source) => Err(SessionError::StoreTask { stage, source }),
    }
}

async fn stop_feed<F: FeedHandle>(feed: &mut F) {
    if let Err(e) = feed.terminate().await {
        warn!(error = %e, "failed to terminate decoder");
    }
}

// ---------------------------------------------------------------------------
// Heartbeat
// ---------------------------------------------------------------------------

fn spawn_heartbeat(
    liveness: Liveness,
    running: Arc<AtomicBool>,
    period: Duration,
) -> JoinHandle<Result<u64, StoreError>> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut beats = 0u64;

        loop {
            ticker.tick().await;
            if !running.load(Ordering::Acquire) {
                return Ok(beats);
            }

            let (beat_liveness, beat_running) = (liveness.clone(), running.clone());
            let beat =
                tokio::task::spawn_blocking(move || beat_liveness.heartbeat_while(&beat_running))
                    .await;
            match beat {
                Ok(Ok(Some(_))) => beats += 1,
                Ok(Ok(None)) => return Ok(beats),
                Ok(Err(e)) => {
                    error!(error = %e, "heartbeat failed");
                    return Err(e);
                }
                Err(join) if join.is_panic() => std::panic::resume_unwind(join.into_panic()),
                Err(_) => return Ok(beats),
            }
        }
    })
}

/// Clears the running flag and the liveness row if a session is abandoned
/// without reaching its normal cleanup.
struct ActiveGuard {
    running: Arc<AtomicBool>,
    liveness: Liveness,
    state: Arc<watch::Sender<SessionState>>,
    heartbeat: Option<AbortHandle>,
    armed: bool,
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if let Some(heartbeat) = &self.heartbeat {
            heartbeat.abort();
        }
        self.running.store(false, Ordering::Release);
        if let Err(e) = self.liveness.set_active(false) {
            warn!(error = %e, "failed to mark listener inactive during cleanup");
        }
        self.state.send_replace(SessionState::Idle);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use pagewatch_core::{Clock, ManualClock};
    use pretty_assertions::assert_eq;
    use std::io::Cursor;
    use std::sync::atomic::AtomicUsize;

    /// Feed that replays a fixed buffer.
    struct ScriptedFeed {
        output: Option<Cursor<Vec<u8>>>,
        terminations: Arc<AtomicUsize>,
    }

    impl FeedHandle for ScriptedFeed {
        type Output = Cursor<Vec<u8>>;

        fn take_output(&mut self) -> Option<Self::Output> {
            self.output.take()
        }

        async fn terminate(&mut self) -> std::io::Result<()> {
            self.terminations.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct ScriptedSpawner {
        script: Vec<u8>,
        terminations: Arc<AtomicUsize>,
    }

    impl ScriptedSpawner {
        fn new(lines: &[&str]) -> Self {
            let mut script = lines.join("\n").into_bytes();
            script.push(b'\n');
            Self {
                script,
                terminations: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    impl FeedSpawner for ScriptedSpawner {
        type Feed = ScriptedFeed;

        fn spawn(&self, settings: &ReceiverSettings) -> Result<ScriptedFeed, SpawnError> {
            settings.validate()?;
            Ok(ScriptedFeed {
                output: Some(Cursor::new(self.script.clone())),
                terminations: self.terminations.clone(),
            })
        }
    }

    /// Spawner whose programs are never found.
    struct AbsentSpawner;

    impl FeedSpawner for AbsentSpawner {
        type Feed = ScriptedFeed;

        fn spawn(&self, _settings: &ReceiverSettings) -> Result<ScriptedFeed, SpawnError> {
            Err(SpawnError::Spawn {
                program: "rtl_fm".to_string(),
                source: std::io::ErrorKind::NotFound.into(),
            })
        }
    }

    fn store() -> Arc<MessageStore> {
        Arc::new(MessageStore::open_in_memory().unwrap())
    }

    fn manual_store() -> (Arc<MessageStore>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
        ));
        let store = MessageStore::open_in_memory()
            .unwrap()
            .with_clock(clock.clone());
        (Arc::new(store), clock)
    }

    #[tokio::test]
    async fn stores_pages_and_skips_noise() {
        let store = store();
        let spawner = ScriptedSpawner::new(&[
            "multimon-ng 1.2.0",
            "Enabled demodulators: POCSAG512 POCSAG1200 POCSAG2400",
            "POCSAG1200: Address: 1234567 Function: 3 Alpha: TEST A",
            "NOISE xyz",
            "",
        ]);
        let session = Session::new(store.clone(), ReceiverSettings::default());

        let report = session.run(&spawner, CancellationToken::new()).await.unwrap();

        assert_eq!(
            report,
            SessionReport {
                lines_read: 5,
                messages_stored: 1,
                lines_skipped: 4,
                end: SessionEnd::StreamClosed,
            }
        );
        assert_eq!(store.len().unwrap(), 1);
        assert_eq!(spawner.terminations.load(Ordering::SeqCst), 1);
        assert_eq!(session.state(), SessionState::Idle);
        assert!(!Liveness::new(store).get_status().unwrap().is_active);
    }

    #[tokio::test]
    async fn publishes_dedupe_window() {
        let store = store();
        let settings = ReceiverSettings {
            dedupe_minutes: 9,
            ..Default::default()
        };
        let session = Session::new(store.clone(), settings);
        session
            .run(&ScriptedSpawner::new(&[]), CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(store.dedupe_minutes().unwrap(), 9);
    }

    #[tokio::test]
    async fn invalid_settings_fail_closed() {
        let store = store();
        let settings = ReceiverSettings {
            frequency: "loud".to_string(),
            ..Default::default()
        };
        let session = Session::new(store.clone(), settings);
        let spawner = ScriptedSpawner::new(&["POCSAG1200: Address: 1 Function: 0 Alpha: x"]);

        let err = session
            .run(&spawner, CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            SessionError::Launch(SpawnError::Settings(crate::SettingsError::Frequency(_)))
        ));
        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(store.len().unwrap(), 0);
        assert!(!Liveness::new(store).get_status().unwrap().is_active);
    }

    #[tokio::test]
    async fn launch_failure_keeps_published_window() {
        let store = store();
        store.set_dedupe_minutes(7).unwrap();

        let invalid = Session::new(
            store.clone(),
            ReceiverSettings {
                frequency: "loud".to_string(),
                dedupe_minutes: 0,
                ..Default::default()
            },
        );
        let err = invalid
            .run(&ScriptedSpawner::new(&[]), CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::Launch(SpawnError::Settings(_))));
        assert_eq!(store.dedupe_minutes().unwrap(), 7);

        let absent = Session::new(
            store.clone(),
            ReceiverSettings {
                dedupe_minutes: 0,
                ..Default::default()
            },
        );
        let err = absent
            .run(&AbsentSpawner, CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::Launch(SpawnError::Spawn { .. })));
        assert_eq!(store.dedupe_minutes().unwrap(), 7);
        assert_eq!(absent.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn pre_cancelled_session_is_interrupted() {
        let store = store();
        let session = Session::new(store.clone(), ReceiverSettings::default());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let spawner = ScriptedSpawner::new(&["POCSAG1200: Address: 1 Function: 0 Alpha: x"]);
        let report = session.run(&spawner, cancel).await.unwrap();

        assert_eq!(report.end, SessionEnd::Interrupted);
        assert_eq!(report.messages_stored, 0);
        assert_eq!(spawner.terminations.load(Ordering::SeqCst), 1);
        assert!(!Liveness::new(store).get_status().unwrap().is_active);
    }

    #[test]
    fn dropped_guard_clears_liveness() {
        let store = store();
        let liveness = Liveness::new(store);
        liveness.set_active(true).unwrap();
        let running = Arc::new(AtomicBool::new(true));
        let (state, _) = watch::channel(SessionState::Running);
        let state = Arc::new(state);

        drop(ActiveGuard {
            running: running.clone(),
            liveness: liveness.clone(),
            state: state.clone(),
            heartbeat: None,
            armed: true,
        });

        assert!(!running.load(Ordering::SeqCst));
        assert!(!liveness.get_status().unwrap().is_active);
        assert_eq!(*state.borrow(), SessionState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn heartbeat_keeps_listener_active_past_staleness() {
        let (store, clock) = manual_store();
        let started = clock.now();
        let liveness = Liveness::new(store);
        liveness.set_active(true).unwrap();
        let running = Arc::new(AtomicBool::new(true));
        let handle = spawn_heartbeat(liveness.clone(), running.clone(), HEARTBEAT_INTERVAL);

        for _ in 0..5 {
            clock.advance(chrono::Duration::seconds(3));
            tokio::time::sleep(HEARTBEAT_INTERVAL).await;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;

        let status = liveness.get_status().unwrap();
        assert!(status.is_active);
        assert!(status.last_heartbeat >= started + chrono::Duration::seconds(12));

        running.store(false, Ordering::Release);
        let beats = tokio::time::timeout(HEARTBEAT_INTERVAL + Duration::from_millis(100), handle)
            .await
            .expect("heartbeat outlived one period after stop")
            .unwrap()
            .unwrap();
        assert!(beats >= 5, "only {beats} beats");
    }

    #[tokio::test(start_paused = true)]
    async fn without_heartbeat_listener_goes_stale() {
        let (store, clock) = manual_store();
        let liveness = Liveness::new(store);
        liveness.set_active(true).unwrap();

        clock.advance(chrono::Duration::seconds(11));

        assert!(!liveness.get_status().unwrap().is_active);
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_guard_aborts_heartbeat_before_clearing() {
        let (store, clock) = manual_store();
        let liveness = Liveness::new(store);
        liveness.set_active(true).unwrap();
        let running = Arc::new(AtomicBool::new(true));
        let handle = spawn_heartbeat(liveness.clone(), running.clone(), HEARTBEAT_INTERVAL);
        tokio::time::sleep(Duration::from_millis(10)).await;
        let (state, _) = watch::channel(SessionState::Running);

        drop(ActiveGuard {
            running: running.clone(),
            liveness: liveness.clone(),
            state: Arc::new(state),
            heartbeat: Some(handle.abort_handle()),
            armed: true,
        });

        let join = handle.await.unwrap_err();
        assert!(join.is_cancelled());
        for _ in 0..3 {
            clock.advance(chrono::Duration::seconds(3));
            tokio::time::sleep(HEARTBEAT_INTERVAL).await;
        }
        let status = liveness.get_status().unwrap();
        assert!(!status.is_active);
        assert_eq!(status.started_at, None);
    }
}
