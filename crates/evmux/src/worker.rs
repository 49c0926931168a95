// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Background worker driving the notification channels.
//!
//! A [`SendSchedule`] is a list of delayed increments. The worker runs it to
//! completion on a scoped thread; there is no cancellation.

use crate::error::{Error, Result};
use crate::notify::{ChannelId, NotifyChannel, MAX_INCREMENT};
use std::thread::{Scope, ScopedJoinHandle};
use std::time::{Duration, Instant};

/// Value of the regular progress sends.
pub const PROGRESS_VALUE: u64 = 2;
/// Value of the final completion send.
pub const COMPLETION_VALUE: u64 = 5;
/// Number of progress sends to B in the standard schedule.
pub const PROGRESS_SENDS: usize = 5;

/// Sleep `delay`, then increment `target` by `value`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduledSend {
    pub delay: Duration,
    pub target: ChannelId,
    pub value: u64,
}

/// Ordered list of sends, optionally preceded by a lead-in delay.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SendSchedule {
    lead_in: Duration,
    steps: Vec<ScheduledSend>,
}

impl SendSchedule {
    pub fn new() -> Self {
        Self::default()
    }

    /// Standard schedule in units of `unit`:
    ///
    /// ```text
    /// t=0        A += 2
    /// t=1..=5    B += 2   (one send per unit)
    /// t=5        B += 5
    /// ```
    pub fn standard(unit: Duration) -> Self {
        let mut schedule = Self::new().then(Duration::ZERO, ChannelId::A, PROGRESS_VALUE);
        for _ in 0..PROGRESS_SENDS {
            schedule = schedule.then(unit, ChannelId::B, PROGRESS_VALUE);
        }
        schedule.then(Duration::ZERO, ChannelId::B, COMPLETION_VALUE)
    }

    /// Delay before the first step.
    pub fn lead_in(mut self, delay: Duration) -> Self {
        self.lead_in = delay;
        self
    }

    /// Append a step.
    pub fn then(mut self, delay: Duration, target: ChannelId, value: u64) -> Self {
        self.steps.push(ScheduledSend {
            delay,
            target,
            value,
        });
        self
    }

    pub fn steps(&self) -> &[ScheduledSend] {
        &self.steps
    }

    /// Time from start until the last send, ignoring write latency.
    pub fn span(&self) -> Duration {
        self.steps
            .iter()
            .fold(self.lead_in, |acc, step| acc.saturating_add(step.delay))
    }

    pub fn validate(&self) -> Result<()> {
        if self.steps.is_empty() {
            return Err(Error::InvalidConfig("worker schedule is empty".into()));
        }
        if let Some(pos) = self
            .steps
            .iter()
            .position(|s| s.value == 0 || s.value > MAX_INCREMENT)
        {
            return Err(Error::InvalidConfig(format!(
                "worker step {} sends {}, outside 1..={}",
                pos, self.steps[pos].value, MAX_INCREMENT
            )));
        }
        Ok(())
    }
}

/// One completed send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendRecord {
    pub target: ChannelId,
    pub value: u64,
    /// Offset from the worker start.
    pub at: Duration,
}

/// Sends performed by a worker run.
#[derive(Debug, Clone, Default)]
pub struct WorkerReport {
    pub sends: Vec<SendRecord>,
    pub elapsed: Duration,
}

impl WorkerReport {
    /// Sum of values sent to `target`.
    pub fn total_sent(&self, target: ChannelId) -> u64 {
        self.sends
            .iter()
            .filter(|s| s.target == target)
            .map(|s| s.value)
            .sum()
    }
}

/// Run `schedule` on the calling thread.
///
/// Stops at the first failed write.
pub fn run_schedule(
    schedule: &SendSchedule,
    a: &NotifyChannel,
    b: &NotifyChannel,
) -> Result<WorkerReport> {
    let start = Instant::now();
    let mut report = WorkerReport {
        sends: Vec::with_capacity(schedule.steps.len()),
        elapsed: Duration::ZERO,
    };

    if !schedule.lead_in.is_zero() {
        std::thread::sleep(schedule.lead_in);
    }

    for (i, step) in schedule.steps.iter().enumerate() {
        if !step.delay.is_zero() {
            std::thread::sleep(step.delay);
        }
        let channel = match step.target {
            ChannelId::A => a,
            ChannelId::B => b,
        };
        channel.increment(step.value)?;

        let at = start.elapsed();
        log::debug!(
            "[worker] step {}: {} += {} at {:?}",
            i,
            step.target,
            step.value,
            at
        );
        report.sends.push(SendRecord {
            target: step.target,
            value: step.value,
            at,
        });
    }

    report.elapsed = start.elapsed();
    Ok(report)
}

/// Start `schedule` on a named scoped thread.
///
/// The caller joins the handle before the scope, and therefore the channels,
/// ends.
pub fn spawn_worker<'scope, 'env>(
    scope: &'scope Scope<'scope, 'env>,
    schedule: &'env SendSchedule,
    a: &'env NotifyChannel,
    b: &'env NotifyChannel,
) -> Result<ScopedJoinHandle<'scope, Result<WorkerReport>>> {
    std::thread::Builder::new()
        .name("evmux-worker".into())
        .spawn_scoped(scope, move || run_schedule(schedule, a, b))
        .map_err(Error::WorkerSpawn)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_schedule_shape() {
        let unit = Duration::from_millis(10);
        let schedule = SendSchedule::standard(unit);
        let steps = schedule.steps();

        assert_eq!(steps.len(), 1 + PROGRESS_SENDS + 1);
        assert_eq!(steps[0].target, ChannelId::A);
        assert!(steps[1..].iter().all(|s| s.target == ChannelId::B));
        assert_eq!(steps.last().map(|s| s.value), Some(COMPLETION_VALUE));
        assert_eq!(schedule.span(), unit * PROGRESS_SENDS as u32);
        assert!(schedule.validate().is_ok());
    }

    #[test]
    fn lead_in_extends_span() {
        let schedule = SendSchedule::standard(Duration::from_millis(10))
            .lead_in(Duration::from_millis(10));
        assert_eq!(schedule.span(), Duration::from_millis(60));
    }

    #[test]
    fn empty_or_zero_schedules_invalid() {
        assert!(SendSchedule::new().validate().is_err());
        let zero = SendSchedule::new().then(Duration::ZERO, ChannelId::A, 0);
        assert!(matches!(zero.validate(), Err(Error::InvalidConfig(_))));
        let huge = SendSchedule::new().then(Duration::ZERO, ChannelId::B, u64::MAX);
        assert!(matches!(huge.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn run_schedule_accumulates_on_channels() {
        let a = NotifyChannel::new().expect("a");
        let b = NotifyChannel::new().expect("b");
        let schedule = SendSchedule::standard(Duration::from_millis(1));

        let report = run_schedule(&schedule, &a, &b).expect("run");

        assert_eq!(report.sends.len(), 7);
        assert_eq!(report.total_sent(ChannelId::A), 2);
        assert_eq!(report.total_sent(ChannelId::B), 15);
        assert_eq!(a.drain().expect("drain a"), 2);
        assert_eq!(b.drain().expect("drain b"), 15);
        assert!(report.sends.windows(2).all(|w| w[0].at <= w[1].at));
    }

    #[test]
    fn spawned_worker_joins_with_report() {
        let a = NotifyChannel::new().expect("a");
        let b = NotifyChannel::new().expect("b");
        let schedule = SendSchedule::new().then(Duration::from_millis(5), ChannelId::B, 3);

        let report = std::thread::scope(|s| {
            let handle = spawn_worker(s, &schedule, &a, &b).expect("spawn");
            handle.join().expect("join").expect("worker")
        });

        assert_eq!(report.sends.len(), 1);
        assert!(report.sends[0].at >= Duration::from_millis(5));
        assert!(b.is_ready());
        assert!(!a.is_ready());
    }
}
