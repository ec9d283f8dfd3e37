//! Receiver settings and the argument vectors built from them.
//!
//! Settings are validated before anything is spawned. Programs are started
//! with explicit argv vectors, never through a shell, so a frequency or gain
//! string can only ever be a single argument.

use regex::Regex;
use std::sync::OnceLock;
use thiserror::Error;

/// Invalid receiver settings.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SettingsError {
    #[error("invalid frequency {0:?}: expected a number with an optional k/M/G suffix, e.g. 173.5125M")]
    Frequency(String),

    #[error("invalid gain {0}: expected 0 to 100 dB")]
    Gain(f64),

    #[error("invalid sample rate {0}: must be greater than zero")]
    SampleRate(u32),

    #[error("no POCSAG rate enabled: choose from 512, 1200, 2400")]
    NoRates,
}

// ---------------------------------------------------------------------------
// PocsagRate
// ---------------------------------------------------------------------------

/// POCSAG baud rates multimon-ng can demodulate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PocsagRate {
    Baud512,
    Baud1200,
    Baud2400,
}

impl PocsagRate {
    pub const ALL: [PocsagRate; 3] = [Self::Baud512, Self::Baud1200, Self::Baud2400];

    pub fn from_baud(baud: u32) -> Option<Self> {
        match baud {
            512 => Some(Self::Baud512),
            1200 => Some(Self::Baud1200),
            2400 => Some(Self::Baud2400),
            _ => None,
        }
    }

    pub fn baud(self) -> u32 {
        match self {
            Self::Baud512 => 512,
            Self::Baud1200 => 1200,
            Self::Baud2400 => 2400,
        }
    }

    /// multimon-ng demodulator name, e.g. `POCSAG1200`.
    pub fn demodulator(self) -> String {
        format!("POCSAG{}", self.baud())
    }

    /// Parse a comma-separated list such as `"512, 1200"`.
    ///
    /// Unknown entries are ignored and duplicates collapsed; the order of
    /// first appearance is kept.
    pub fn parse_list(raw: &str) -> Vec<Self> {
        Self::from_bauds(raw.split(',').filter_map(|part| part.trim().parse().ok()))
    }

    /// Same filtering as [`parse_list`](Self::parse_list), from numbers.
    pub fn from_bauds(bauds: impl IntoIterator<Item = u32>) -> Vec<Self> {
        let mut rates = Vec::new();
        for rate in bauds.into_iter().filter_map(Self::from_baud) {
            if !rates.contains(&rate) {
                rates.push(rate);
            }
        }
        rates
    }
}

impl std::fmt::Display for PocsagRate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.baud())
    }
}

// ---------------------------------------------------------------------------
// ReceiverSettings
// ---------------------------------------------------------------------------

/// Everything needed to start a decode session.
#[derive(Debug, Clone, PartialEq)]
pub struct ReceiverSettings {
    /// Tuning frequency with optional unit suffix, e.g. `173.5125M`.
    pub frequency: String,
    /// Tuner gain in dB.
    pub gain: f64,
    /// Power an active antenna through the dongle.
    pub bias_tee: bool,
    /// rtl_fm output sample rate in Hz.
    pub sample_rate: u32,
    /// Dedup window published to readers for this session.
    pub dedupe_minutes: u32,
    pub rates: Vec<PocsagRate>,
}

impl Default for ReceiverSettings {
    fn default() -> Self {
        Self {
            frequency: "173.5125M".to_string(),
            gain: 49.6,
            bias_tee: false,
            sample_rate: 22050,
            dedupe_minutes: pagewatch_core::dedup::DEFAULT_WINDOW_MINUTES,
            rates: PocsagRate::ALL.to_vec(),
        }
    }
}

fn frequency_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d+(\.\d+)?[kKmMgG]?$").expect("frequency pattern must compile"))
}

impl ReceiverSettings {
    pub fn validate(&self) -> Result<(), SettingsError> {
        if !frequency_regex().is_match(&self.frequency) {
            return Err(SettingsError::Frequency(self.frequency.clone()));
        }
        if !self.gain.is_finite() || !(0.0..=100.0).contains(&self.gain) {
            return Err(SettingsError::Gain(self.gain));
        }
        if self.sample_rate == 0 {
            return Err(SettingsError::SampleRate(self.sample_rate));
        }
        if self.rates.is_empty() {
            return Err(SettingsError::NoRates);
        }
        Ok(())
    }

    /// `rtl_fm -g <gain> [-T] -f <freq> -s <rate> -`
    pub fn rtl_fm_args(&self) -> Vec<String> {
        let mut args = vec!["-g".to_string(), self.gain.to_string()];
        if self.bias_tee {
            args.push("-T".to_string());
        }
        args.extend([
            "-f".to_string(),
            self.frequency.clone(),
            "-s".to_string(),
            self.sample_rate.to_string(),
            "-".to_string(),
        ]);
        args
    }

    /// `multimon-ng -t raw -a POCSAG512 ... -`
    pub fn multimon_args(&self) -> Vec<String> {
        let mut args = vec!["-t".to_string(), "raw".to_string()];
        for rate in &self.rates {
            args.push("-a".to_string());
            args.push(rate.demodulator());
        }
        args.push("-".to_string());
        args
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
