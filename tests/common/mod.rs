//! Shared test utilities for pagewatch integration harnesses.
//!
//! Import everything you need via `mod common; use common::*;` at the top of
//! each harness file. Stores run in memory against a [`ManualClock`] so every
//! timestamp is deterministic.
//!
//! [`ManualClock`]: pagewatch_core::ManualClock

#![allow(dead_code)]

pub mod assertions;
pub mod builders;
pub mod fake_process;
pub mod fixtures;

pub use assertions::*;
pub use builders::*;
pub use fake_process::*;
pub use fixtures::*;
