// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Multiplexer configuration.
//!
//! # Architecture
//!
//! - **Level 1 (Static)**: documented default constants
//! - **Level 2 (Dynamic)**: [`MuxConfig`], built with chained setters or
//!   read from `EVMUX_*` environment variables
//!
//! # Example
//!
//! ```
//! use evmux::config::MuxConfig;
//! use std::time::Duration;
//!
//! let config = MuxConfig::default()
//!     .max_attempts(20)
//!     .attempt_timeout(Duration::from_millis(250))
//!     .time_unit(Duration::from_millis(50));
//! assert!(config.validate().is_ok());
//! ```

use crate::error::{Error, Result};
use crate::notify::{Backend, ChannelId};
use std::time::Duration;

/// Attempt budget of one multiplexer run.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;

/// Per-attempt wait timeout in milliseconds.
pub const DEFAULT_ATTEMPT_TIMEOUT_MS: u64 = 1000;

/// Length of one time unit in milliseconds.
///
/// Backoff sleeps and worker delays are expressed in time units.
pub const DEFAULT_TIME_UNIT_MS: u64 = 1000;

/// Environment variable overriding [`MuxConfig::max_attempts`].
pub const ENV_MAX_ATTEMPTS: &str = "EVMUX_MAX_ATTEMPTS";
/// Environment variable overriding [`MuxConfig::attempt_timeout`] (ms).
pub const ENV_TIMEOUT_MS: &str = "EVMUX_TIMEOUT_MS";
/// Environment variable overriding [`MuxConfig::time_unit`] (ms).
pub const ENV_UNIT_MS: &str = "EVMUX_UNIT_MS";
/// Environment variable overriding [`MuxConfig::backend`].
pub const ENV_BACKEND: &str = "EVMUX_BACKEND";
/// Environment variable enabling [`MuxConfig::strict_budget`].
pub const ENV_STRICT: &str = "EVMUX_STRICT";

/// Runtime parameters for a multiplexer run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MuxConfig {
    pub max_attempts: u32,
    pub attempt_timeout: Duration,
    /// Backoff interval; also the unit for worker schedules.
    pub time_unit: Duration,
    pub backend: Backend,
    /// Channel drained once both-seen has latched.
    pub drain_target: ChannelId,
    /// Stop the run on the first wait failure instead of counting it.
    pub abort_on_wait_failure: bool,
    /// Reject scenarios whose wait budget is shorter than the worker schedule.
    pub strict_budget: bool,
}

impl Default for MuxConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            attempt_timeout: Duration::from_millis(DEFAULT_ATTEMPT_TIMEOUT_MS),
            time_unit: Duration::from_millis(DEFAULT_TIME_UNIT_MS),
            backend: Backend::default(),
            drain_target: ChannelId::A,
            abort_on_wait_failure: false,
            strict_budget: false,
        }
    }
}

impl MuxConfig {
    /// Defaults with `EVMUX_*` overrides applied.
    ///
    /// Unparsable values are rejected rather than silently ignored.
    pub fn from_env() -> Result<Self> {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(ENV_MAX_ATTEMPTS) {
            self.max_attempts = parse_var(ENV_MAX_ATTEMPTS, &raw)?;
        }
        if let Some(raw) = lookup(ENV_TIMEOUT_MS) {
            self.attempt_timeout = Duration::from_millis(parse_var(ENV_TIMEOUT_MS, &raw)?);
        }
        if let Some(raw) = lookup(ENV_UNIT_MS) {
            self.time_unit = Duration::from_millis(parse_var(ENV_UNIT_MS, &raw)?);
        }
        if let Some(raw) = lookup(ENV_BACKEND) {
            self.backend = raw
                .parse()
                .map_err(|e| Error::InvalidConfig(format!("{}: {}", ENV_BACKEND, e)))?;
        }
        if let Some(raw) = lookup(ENV_STRICT) {
            self.strict_budget = matches!(raw.trim(), "1" | "true" | "yes" | "on");
        }
        Ok(self)
    }

    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    pub fn attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    pub fn time_unit(mut self, unit: Duration) -> Self {
        self.time_unit = unit;
        self
    }

    pub fn backend(mut self, backend: Backend) -> Self {
        self.backend = backend;
        self
    }

    pub fn drain_target(mut self, target: ChannelId) -> Self {
        self.drain_target = target;
        self
    }

    pub fn abort_on_wait_failure(mut self, abort: bool) -> Self {
        self.abort_on_wait_failure = abort;
        self
    }

    pub fn strict_budget(mut self, strict: bool) -> Self {
        self.strict_budget = strict;
        self
    }

    /// Check ranges. A zero timeout is allowed (pure polling).
    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(Error::InvalidConfig("max_attempts must be > 0".into()));
        }
        if self.time_unit.is_zero() {
            return Err(Error::InvalidConfig("time_unit must be > 0".into()));
        }
        Ok(())
    }

    /// Worst-case wall time of a run: every attempt waits the full timeout
    /// and then backs off.
    pub fn loop_budget(&self) -> Duration {
        (self.attempt_timeout + self.time_unit).saturating_mul(self.max_attempts)
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| Error::InvalidConfig(format!("{}: cannot parse '{}'", key, raw)))
}
