//! pagewatch: a POCSAG pager listener.
//!
//! The binary wires the library crates together behind a small CLI. This
//! crate exposes the CLI definition and the command implementations so that
//! integration tests can drive them without spawning the binary.
//!
//! # Architecture
//!
//! ```text
//! rtl_fm ─► multimon-ng ─► Session ─► MessageStore ◄─ messages / status / clear
//!                             │            ▲
//!                             └─ heartbeat ┘ (Liveness)
//! ```

pub mod cli;
pub mod commands;
pub mod render;

pub use cli::{Cli, CliCommand};
