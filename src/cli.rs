//! Command-line definition.
//!
//! Every listener option falls back to the `[receiver]` / `[dedup]` sections
//! of the config file when not given on the command line.

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use pagewatch_core::config::Config;
use pagewatch_core::query::{Limit, MessageQuery};
use pagewatch_core::store::{MessageFilter, PurgeFilter};
use pagewatch_feeds::{DecoderSpawner, PocsagRate, ReceiverSettings};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "pagewatch", about = "POCSAG pager listener and message log", version)]
pub struct Cli {
    /// Write debug logs to /tmp/pagewatch-debug.log (tail -f to inspect).
    #[arg(long, global = true)]
    pub debug: bool,

    /// Use this config file instead of ~/.config/pagewatch/config.toml.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// SQLite database path. Overrides [storage] database.
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Subcommand, Debug)]
pub enum CliCommand {
    /// Run rtl_fm | multimon-ng and store every decoded page (Ctrl+C to stop).
    Listen(ListenArgs),
    /// Print stored pages, deduplicated, most recent first.
    Messages(MessagesArgs),
    /// Print whether a listener is currently running.
    Status(StatusArgs),
    /// Delete stored pages.
    Clear(ClearArgs),
}

// ---------------------------------------------------------------------------
// listen
// ---------------------------------------------------------------------------

#[derive(Args, Debug, Default)]
pub struct ListenArgs {
    /// Frequency to tune, e.g. 173.5125M or 466.075M.
    #[arg(short = 'f', long)]
    pub frequency: Option<String>,

    /// Tuner gain in dB.
    #[arg(short = 'g', long)]
    pub gain: Option<f64>,

    /// Enable the bias tee (powers an active antenna).
    #[arg(short = 'T', long = "bias-t")]
    pub bias_t: bool,

    /// rtl_fm sample rate in Hz.
    #[arg(short = 's', long)]
    pub sample_rate: Option<u32>,

    /// Minutes within which an identical page counts as a repeat.
    #[arg(short = 'd', long)]
    pub dedupe_minutes: Option<u32>,

    /// Comma-separated POCSAG rates to decode (512, 1200, 2400).
    #[arg(long)]
    pub pocsag_rates: Option<String>,

    /// rtl_fm binary.
    #[arg(long)]
    pub rtl_fm: Option<String>,

    /// multimon-ng binary.
    #[arg(long)]
    pub multimon: Option<String>,
}

impl ListenArgs {
    /// Merge flags over the loaded configuration.
    pub fn settings(&self, config: &Config) -> ReceiverSettings {
        let receiver = &config.receiver;
        let rates = match &self.pocsag_rates {
            Some(raw) => PocsagRate::parse_list(raw),
            None => PocsagRate::from_bauds(receiver.pocsag_rates.iter().copied()),
        };

        ReceiverSettings {
            frequency: self
                .frequency
                .clone()
                .unwrap_or_else(|| receiver.frequency.clone()),
            gain: self.gain.unwrap_or(receiver.gain),
            bias_tee: self.bias_t || receiver.bias_tee,
            sample_rate: self.sample_rate.unwrap_or(receiver.sample_rate),
            dedupe_minutes: self.dedupe_minutes.unwrap_or(config.dedup.window_minutes),
            rates,
        }
    }

    pub fn spawner(&self, config: &Config) -> DecoderSpawner {
        DecoderSpawner {
            rtl_fm: self
                .rtl_fm
                .clone()
                .unwrap_or_else(|| config.receiver.rtl_fm.clone()),
            multimon: self
                .multimon
                .clone()
                .unwrap_or_else(|| config.receiver.multimon.clone()),
        }
    }
}

// ---------------------------------------------------------------------------
// messages / status / clear
// ---------------------------------------------------------------------------

#[derive(Args, Debug, Default)]
pub struct MessagesArgs {
    /// Only pages whose address contains this text.
    #[arg(long)]
    pub address: Option<String>,

    /// Only pages received on this local calendar day (YYYY-MM-DD).
    #[arg(long)]
    pub date: Option<NaiveDate>,

    /// Only pages whose address or content contains this text.
    #[arg(long)]
    pub search: Option<String>,

    /// Number of pages to show: 20, 50, 100, 150, 200, 500 or 1000.
    #[arg(long, default_value = "50")]
    pub limit: String,

    /// Print one JSON object per line.
    #[arg(long)]
    pub json: bool,
}

impl MessagesArgs {
    pub fn query(&self) -> MessageQuery {
        MessageQuery {
            filter: MessageFilter {
                address: self.address.clone(),
                date: self.date,
                search: self.search.clone(),
            },
            limit: Limit::parse_or_default(&self.limit),
        }
    }
}

#[derive(Args, Debug, Default)]
pub struct StatusArgs {
    /// Print the status as JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug, Default)]
pub struct ClearArgs {
    /// Do not ask for confirmation.
    #[arg(short = 'y', long)]
    pub yes: bool,

    /// Keep the N most recent pages.
    #[arg(long, default_value_t = 0, value_name = "N")]
    pub keep_recent: usize,

    /// Only delete pages older than this many days.
    #[arg(long, default_value_t = 0, value_name = "DAYS")]
    pub older_than: u32,
}

impl ClearArgs {
    pub fn filter(&self) -> PurgeFilter {
        PurgeFilter {
            older_than: (self.older_than > 0)
                .then(|| chrono::Duration::days(i64::from(self.older_than))),
            keep_recent: self.keep_recent,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
