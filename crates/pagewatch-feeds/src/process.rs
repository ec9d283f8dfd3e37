//! The `rtl_fm | multimon-ng` pipe, spawned without a shell.
//!
//! `rtl_fm` writes raw audio to its stdout, which is handed directly to
//! `multimon-ng` as stdin. Both run in one process group (led by `rtl_fm`) so
//! the pair can be reasoned about as a unit, and both are killed if the
//! [`DecoderProcess`] is dropped.

use crate::{command::ReceiverSettings, FeedHandle, FeedSpawner, SettingsError};
use std::process::Stdio;
use thiserror::Error;
use tokio::process::{Child, ChildStdout, Command};
use tracing::{debug, info, warn};

/// Failure to bring the decoder pipe up.
#[derive(Error, Debug)]
pub enum SpawnError {
    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error("could not start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} did not expose a stdout pipe")]
    MissingPipe { program: String },

    #[error("could not connect {program} output to the decoder: {source}")]
    Pipe {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

// ---------------------------------------------------------------------------
// DecoderSpawner
// ---------------------------------------------------------------------------

/// Spawns the real radio + decoder programs.
#[derive(Debug, Clone)]
pub struct DecoderSpawner {
    /// Path or name of the `rtl_fm` binary.
    pub rtl_fm: String,
    /// Path or name of the `multimon-ng` binary.
    pub multimon: String,
}

impl Default for DecoderSpawner {
    fn default() -> Self {
        Self {
            rtl_fm: "rtl_fm".to_string(),
            multimon: "multimon-ng".to_string(),
        }
    }
}

impl FeedSpawner for DecoderSpawner {
    type Feed = DecoderProcess;

    fn spawn(&self, settings: &ReceiverSettings) -> Result<DecoderProcess, SpawnError> {
        settings.validate()?;

        let radio_args = settings.rtl_fm_args();
        let decoder_args = settings.multimon_args();
        info!(
            command = %format!(
                "{} {} | {} {}",
                self.rtl_fm,
                radio_args.join(" "),
                self.multimon,
                decoder_args.join(" ")
            ),
            "spawning decoder pipe"
        );

        let mut radio_cmd = Command::new(&self.rtl_fm);
        radio_cmd
            .args(&radio_args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        #[cfg(unix)]
        radio_cmd.process_group(0);

        let mut radio = radio_cmd.spawn().map_err(|source| SpawnError::Spawn {
            program: self.rtl_fm.clone(),
            source,
        })?;

        let audio: Stdio = match radio.stdout.take() {
            Some(stdout) => stdout.try_into().map_err(|source| SpawnError::Pipe {
                program: self.rtl_fm.clone(),
                source,
            })?,
            None => {
                return Err(SpawnError::MissingPipe {
                    program: self.rtl_fm.clone(),
                })
            }
        };

        let mut decoder_cmd = Command::new(&self.multimon);
        decoder_cmd
            .args(&decoder_args)
            .stdin(audio)
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        #[cfg(unix)]
        if let Some(leader) = radio.id().and_then(|pid| i32::try_from(pid).ok()) {
            decoder_cmd.process_group(leader);
        }

        // On failure `radio` is dropped here and killed by kill_on_drop.
        let mut decoder = decoder_cmd.spawn().map_err(|source| SpawnError::Spawn {
            program: self.multimon.clone(),
            source,
        })?;

        let output = decoder.stdout.take().ok_or_else(|| SpawnError::MissingPipe {
            program: self.multimon.clone(),
        })?;

        debug!(radio_pid = ?radio.id(), decoder_pid = ?decoder.id(), "decoder pipe running");
        Ok(DecoderProcess {
            radio,
            decoder,
            output: Some(output),
        })
    }
}

// ---------------------------------------------------------------------------
// DecoderProcess
// ---------------------------------------------------------------------------

/// A running `rtl_fm | multimon-ng` pair.
#[derive(Debug)]
pub struct DecoderProcess {
    radio: Child,
    decoder: Child,
    output: Option<ChildStdout>,
}

impl FeedHandle for DecoderProcess {
    type Output = ChildStdout;

    fn take_output(&mut self) -> Option<ChildStdout> {
        self.output.take()
    }

    /// Stop both children, radio first so the decoder sees EOF on its input.
    /// The decoder is stopped even if stopping the radio fails; the first
    /// error is returned.
    async fn terminate(&mut self) -> std::io::Result<()> {
        let radio = stop(&mut self.radio).await;
        if let Err(e) = &radio {
            warn!(error = %e, "failed to stop rtl_fm");
        }
        let decoder = stop(&mut self.decoder).await;
        radio.and(decoder)
    }
}

async fn stop(child: &mut Child) -> std::io::Result<()> {
    if let Some(status) = child.try_wait()? {
        debug!(pid = ?child.id(), %status, "child already exited");
        return Ok(());
    }
    child.kill().await
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
