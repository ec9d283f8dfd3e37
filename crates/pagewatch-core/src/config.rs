//! Configuration types for pagewatch.
//!
//! [`Config::load`] reads `~/.config/pagewatch/config.toml`, creating it with
//! hardcoded defaults if it does not yet exist. [`Config::defaults`] returns
//! the same defaults without touching the filesystem (useful in tests).
//!
//! Command-line flags override whatever is loaded here.

use serde::Deserialize;
use std::path::PathBuf;

// ---------------------------------------------------------------------------
// Embedded defaults
// ---------------------------------------------------------------------------

const DEFAULT_CONFIG: &str = r#"
[receiver]
frequency    = "173.5125M"
gain         = 49.6
bias_tee     = false
sample_rate  = 22050
pocsag_rates = [512, 1200, 2400]
rtl_fm       = "rtl_fm"
multimon     = "multimon-ng"

[dedup]
window_minutes = 3

[storage]
database = ""
"#;

// ---------------------------------------------------------------------------
// Public config types
// ---------------------------------------------------------------------------

/// Top-level application configuration, loaded from `~/.config/pagewatch/config.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub receiver: ReceiverConfig,
    #[serde(default)]
    pub dedup: DedupConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

/// `[receiver]` section: how to drive `rtl_fm` and `multimon-ng`.
#[derive(Debug, Clone, Deserialize)]
pub struct ReceiverConfig {
    #[serde(default = "default_frequency")]
    pub frequency: String,
    #[serde(default = "default_gain")]
    pub gain: f64,
    #[serde(default)]
    pub bias_tee: bool,
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    #[serde(default = "default_pocsag_rates")]
    pub pocsag_rates: Vec<u32>,
    #[serde(default = "default_rtl_fm")]
    pub rtl_fm: String,
    #[serde(default = "default_multimon")]
    pub multimon: String,
}

fn default_frequency() -> String { "173.5125M".to_string() }
fn default_gain() -> f64 { 49.6 }
fn default_sample_rate() -> u32 { 22050 }
fn default_pocsag_rates() -> Vec<u32> { vec![512, 1200, 2400] }
fn default_rtl_fm() -> String { "rtl_fm".to_string() }
fn default_multimon() -> String { "multimon-ng".to_string() }

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            frequency: default_frequency(),
            gain: default_gain(),
            bias_tee: false,
            sample_rate: default_sample_rate(),
            pocsag_rates: default_pocsag_rates(),
            rtl_fm: default_rtl_fm(),
            multimon: default_multimon(),
        }
    }
}

/// `[dedup]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct DedupConfig {
    #[serde(default = "default_window_minutes")]
    pub window_minutes: u32,
}

fn default_window_minutes() -> u32 { crate::dedup::DEFAULT_WINDOW_MINUTES }

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            window_minutes: default_window_minutes(),
        }
    }
}

/// `[storage]` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StorageConfig {
    /// SQLite database path. Empty means the XDG data directory.
    #[serde(default)]
    pub database: String,
}

impl StorageConfig {
    /// The configured database path, or `$XDG_DATA_HOME/pagewatch/messages.db`.
    pub fn database_path(&self) -> PathBuf {
        if self.database.trim().is_empty() {
            data_dir().join("messages.db")
        } else {
            PathBuf::from(self.database.trim())
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::defaults()
    }
}

impl Config {
    /// Load from `~/.config/pagewatch/config.toml`, layered on top of the
    /// built-in defaults. Creates the file with defaults if it does not exist.
    pub fn load() -> anyhow::Result<Self> {
        let path = config_path();

        if !path.exists() {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&path, DEFAULT_CONFIG.trim_start())?;
        }

        Self::load_from(&path)
    }

    /// Load an explicit file layered on top of the built-in defaults.
    pub fn load_from(path: &std::path::Path) -> anyhow::Result<Self> {
        config::Config::builder()
            .add_source(config::File::from_str(DEFAULT_CONFIG, config::FileFormat::Toml))
            .add_source(config::File::from(path).required(false))
            .build()?
            .try_deserialize()
            .map_err(Into::into)
    }

    /// Return the built-in defaults without touching the filesystem.
    pub fn defaults() -> Self {
        config::Config::builder()
            .add_source(config::File::from_str(DEFAULT_CONFIG, config::FileFormat::Toml))
            .build()
            .expect("built-in default config must be valid TOML")
            .try_deserialize()
            .expect("built-in default config must deserialize correctly")
    }
}

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

fn home() -> PathBuf {
    PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".to_string()))
}

fn config_path() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home().join(".config"))
        .join("pagewatch")
        .join("config.toml")
}

fn data_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home().join(".local").join("share"))
        .join("pagewatch")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
