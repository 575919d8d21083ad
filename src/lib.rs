// Copyright 2026 the Entrant Runtime Contributors
// SPDX-License-Identifier: Apache-2.0

//! Entrant runtime — adaptive entry-strategy engine for competition pages.
//!
//! Given discovered competition targets, the runtime enumerates ranked entry
//! strategies per page, explores them with a backtracking decision engine,
//! classifies and fills entry forms from a personal profile, and appends
//! every traversal to an append-only site memory that biases future runs.

pub mod browser;
pub mod candidates;
pub mod classify;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod executor;
pub mod limiter;
pub mod memory;
pub mod model;
pub mod profile;
pub mod runner;

pub use config::EntrantConfig;
pub use model::{CompetitionTarget, EntryResult, EntryStatus};
pub use runner::EntryRunner;

/// Initialize structured logging from `RUST_LOG` (falls back to `info`).
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
