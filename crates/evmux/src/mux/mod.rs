// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Readiness multiplexer.
//!
//! Waits, for a bounded number of attempts, until either or both of two
//! [`NotifyChannel`]s become readable, and reacts to the combination:
//!
//! - a timeout moves straight to the next attempt;
//! - a snapshot with both channels ready latches *both-seen* for the rest of
//!   the run;
//! - once latched, the designated channel is drained whenever it is ready;
//! - until latched, a ready snapshot is followed by a one-unit backoff.
//!
//! Used by [`crate::scenario::Scenario`] and the `evmux-probe` tool.

mod policy;

pub use policy::{inspect, Inspection};

use crate::config::MuxConfig;
use crate::error::{Error, Result};
use crate::notify::{ChannelId, NotifyChannel};
use crate::poll::{poll_pair, WaitOutcome};
use std::time::{Duration, Instant};

/// Value read from a channel during an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Drained {
    pub channel: ChannelId,
    pub value: u64,
}

/// Trace of a single attempt.
#[derive(Debug)]
pub struct AttemptRecord {
    /// Zero-based attempt index.
    pub index: u32,
    pub outcome: WaitOutcome,
    pub drained: Option<Drained>,
    pub backed_off: bool,
    /// Latch value after this attempt.
    pub both_seen: bool,
}

impl AttemptRecord {
    fn new(index: u32, outcome: WaitOutcome) -> Self {
        Self {
            index,
            outcome,
            drained: None,
            backed_off: false,
            both_seen: false,
        }
    }
}

/// Result of a multiplexer run.
#[derive(Debug, Default)]
pub struct RunReport {
    pub attempts: Vec<AttemptRecord>,
    /// Final latch value; `false` means both channels were never seen
    /// ready together within the budget.
    pub both_seen: bool,
    /// Attempt on which the latch flipped.
    pub both_seen_at: Option<u32>,
    pub elapsed: Duration,
}

impl RunReport {
    pub fn attempts_made(&self) -> usize {
        self.attempts.len()
    }

    pub fn timeouts(&self) -> usize {
        self.count(|r| matches!(r.outcome, WaitOutcome::TimedOut))
    }

    pub fn failures(&self) -> usize {
        self.count(|r| matches!(r.outcome, WaitOutcome::Failed(_)))
    }

    pub fn backoffs(&self) -> usize {
        self.count(|r| r.backed_off)
    }

    /// Drains performed, in attempt order.
    pub fn drains(&self) -> impl Iterator<Item = &Drained> + '_ {
        self.attempts.iter().filter_map(|r| r.drained.as_ref())
    }

    fn count<F: Fn(&AttemptRecord) -> bool>(&self, pred: F) -> usize {
        self.attempts.iter().filter(|r| pred(r)).count()
    }
}

/// Bounded wait loop over two notification channels.
#[derive(Debug, Clone)]
pub struct Multiplexer {
    config: MuxConfig,
}

impl Multiplexer {
    /// Validate `config` and build a multiplexer.
    pub fn new(config: MuxConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &MuxConfig {
        &self.config
    }

    /// Run the attempt loop over `a` and `b`.
    ///
    /// Always performs exactly `max_attempts` waits unless a drain fails or
    /// `abort_on_wait_failure` is set and a wait fails.
    pub fn run(&self, a: &NotifyChannel, b: &NotifyChannel) -> Result<RunReport> {
        self.run_with(a, b, poll_pair)
    }

    /// Attempt loop with the bounded wait supplied by `wait`.
    pub(crate) fn run_with<W>(
        &self,
        a: &NotifyChannel,
        b: &NotifyChannel,
        mut wait: W,
    ) -> Result<RunReport>
    where
        W: FnMut(&NotifyChannel, &NotifyChannel, Duration) -> WaitOutcome,
    {
        let cfg = &self.config;
        let start = Instant::now();
        let mut report = RunReport {
            attempts: Vec::with_capacity(cfg.max_attempts as usize),
            ..RunReport::default()
        };
        let mut both_seen = false;

        for index in 0..cfg.max_attempts {
            let outcome = wait(a, b, cfg.attempt_timeout);
            log::debug!("[mux] attempt {}: wait {}", index, outcome.label());

            if cfg.abort_on_wait_failure {
                if let WaitOutcome::Failed(err) = outcome {
                    log::warn!("[mux] attempt {}: wait failed, aborting: {}", index, err);
                    return Err(Error::Wait(err));
                }
            }

            let step = match &outcome {
                WaitOutcome::Ready(ready) => {
                    log::debug!("[mux] attempt {}: ready {}", index, ready);
                    Some(inspect(*ready, both_seen, cfg.drain_target))
                }
                WaitOutcome::TimedOut => None,
                WaitOutcome::Failed(err) => {
                    log::warn!("[mux] attempt {}: wait failed: {}", index, err);
                    None
                }
            };

            let mut record = AttemptRecord::new(index, outcome);
            if let Some(step) = step {
                if let Some(channel) = step.drain {
                    let source = match channel {
                        ChannelId::A => a,
                        ChannelId::B => b,
                    };
                    let value = source.drain()?;
                    log::debug!("[mux] attempt {}: drained {} ({})", index, channel, value);
                    record.drained = Some(Drained { channel, value });
                }

                if step.both_seen && !both_seen {
                    log::debug!("[mux] attempt {}: both channels ready", index);
                    report.both_seen_at = Some(index);
                }
                both_seen = step.both_seen;

                if step.backoff {
                    std::thread::sleep(cfg.time_unit);
                    record.backed_off = true;
                }
            }
            record.both_seen = both_seen;
            report.attempts.push(record);
        }

        report.both_seen = both_seen;
        report.elapsed = start.elapsed();
        log::debug!(
            "[mux] run finished: {} attempts, both_seen={}, {:?}",
            report.attempts_made(),
            both_seen,
            report.elapsed
        );
        Ok(report)
    }
}
