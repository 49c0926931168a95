// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # evmux - dual-channel readiness multiplexer
//!
//! Two counting notification channels (eventfd or self-pipe), one background
//! worker that signals them on a fixed schedule, and a bounded wait loop that
//! reacts to which channels are ready.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use evmux::{MuxConfig, Result, Scenario};
//!
//! fn main() -> Result<()> {
//!     let report = Scenario::standard(MuxConfig::default()).run()?;
//!     println!("both seen: {}", report.run.both_seen);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +-------------------+        increment         +------------------+
//! |  worker thread    | -----------------------> |  NotifyChannel A |
//! |  (SendSchedule)   | -----------------------> |  NotifyChannel B |
//! +-------------------+                          +------------------+
//!                                                     |  poll(2)
//!                                                     v
//!                                          +----------------------+
//!                                          |  Multiplexer::run    |
//!                                          |  latch/drain/backoff |
//!                                          +----------------------+
//! ```
//!
//! ## Modules Overview
//!
//! - [`notify`] - counting channels and their backends
//! - [`poll`] - one bounded wait over both channels
//! - [`mux`] - the attempt loop
//! - [`worker`] - send schedules and the worker thread
//! - [`scenario`] - wiring it all together with a scoped join
//! - [`config`] - defaults and environment overrides

#![cfg(unix)]

pub mod config;
mod error;
pub mod mux;
pub mod notify;
pub mod poll;
pub mod scenario;
pub mod worker;

pub use config::MuxConfig;
pub use error::{Error, Result};
pub use mux::{AttemptRecord, Drained, Multiplexer, RunReport};
pub use notify::{Backend, ChannelId, NotifyChannel};
pub use poll::{poll_pair, ReadySet, WaitOutcome};
pub use scenario::{BudgetCheck, BudgetCoverage, Scenario, ScenarioReport};
pub use worker::{SendSchedule, WorkerReport};
