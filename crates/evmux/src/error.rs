// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

use std::time::Duration;

/// Errors returned by evmux operations.
///
/// # Example
///
/// ```rust,no_run
/// use evmux::{Error, MuxConfig};
///
/// match MuxConfig::default().max_attempts(0).validate() {
///     Err(Error::InvalidConfig(msg)) => println!("Bad config: {}", msg),
///     Err(e) => println!("Other error: {}", e),
///     Ok(()) => println!("Valid"),
/// }
/// ```
#[derive(Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// A configuration value is out of range or inconsistent.
    InvalidConfig(String),
    /// The wait loop cannot outlast the worker schedule (strict mode only).
    BudgetTooShort {
        /// Worst-case wall time of the wait loop.
        loop_budget: Duration,
        /// Total span of the worker schedule.
        schedule_span: Duration,
    },

    // ========================================================================
    // Channel Errors
    // ========================================================================
    /// Creating the backing descriptor failed.
    ChannelCreate(std::io::Error),
    /// Incrementing a channel failed.
    ChannelWrite(std::io::Error),
    /// Draining a channel failed.
    ChannelRead(std::io::Error),

    // ========================================================================
    // Runtime Errors
    // ========================================================================
    /// The wait primitive failed and the run was configured to abort.
    Wait(std::io::Error),
    /// The worker thread could not be started.
    WorkerSpawn(std::io::Error),
    /// The worker thread panicked before finishing its schedule.
    WorkerPanicked,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::InvalidConfig(msg) => write!(f, "Invalid config: {}", msg),
            Error::BudgetTooShort {
                loop_budget,
                schedule_span,
            } => write!(
                f,
                "Wait budget {:?} is shorter than worker schedule {:?}",
                loop_budget, schedule_span
            ),
            Error::ChannelCreate(e) => write!(f, "Channel creation failed: {}", e),
            Error::ChannelWrite(e) => write!(f, "Channel write failed: {}", e),
            Error::ChannelRead(e) => write!(f, "Channel read failed: {}", e),
            Error::Wait(e) => write!(f, "Wait failed: {}", e),
            Error::WorkerSpawn(e) => write!(f, "Worker spawn failed: {}", e),
            Error::WorkerPanicked => write!(f, "Worker thread panicked"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::ChannelCreate(e)
            | Error::ChannelWrite(e)
            | Error::ChannelRead(e)
            | Error::Wait(e)
            | Error::WorkerSpawn(e) => Some(e),
            _ => None,
        }
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = core::result::Result<T, Error>;
