// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! End-to-end run: two channels, one worker, one multiplexer.
//!
//! ```text
//! create A, B --> spawn worker (scoped) --> Multiplexer::run --> join worker --> drop A, B
//! ```
//!
//! Channel creation happens before the worker starts; a creation failure
//! aborts the run without starting anything.

use crate::config::MuxConfig;
use crate::error::{Error, Result};
use crate::mux::{Multiplexer, RunReport};
use crate::notify::{Backend, NotifyChannel};
use crate::worker::{spawn_worker, SendSchedule, WorkerReport};
use std::time::Duration;

/// Reports from both sides of a scenario.
#[derive(Debug)]
pub struct ScenarioReport {
    pub backend: Backend,
    pub run: RunReport,
    pub worker: WorkerReport,
    /// Span of the schedule the worker ran.
    pub schedule_span: Duration,
}

impl ScenarioReport {
    /// Whether the wait loop actually ran until the last scheduled send.
    pub fn coverage(&self) -> BudgetCoverage {
        if self.run.elapsed >= self.schedule_span {
            BudgetCoverage::Covered
        } else {
            BudgetCoverage::Short {
                loop_elapsed: self.run.elapsed,
                schedule_span: self.schedule_span,
            }
        }
    }
}

/// Observed verdict: did the loop outlast the worker schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BudgetCoverage {
    Covered,
    Short {
        loop_elapsed: Duration,
        schedule_span: Duration,
    },
}

/// Up-front verdict from [`Scenario::budget_check`].
///
/// `Feasible` only means the loop's worst-case duration is long enough. It
/// is not a promise of coverage: once both-seen latches, a channel that is
/// never drained stays ready and the remaining attempts return at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BudgetCheck {
    Feasible,
    Short {
        loop_budget: Duration,
        schedule_span: Duration,
    },
}

/// A multiplexer configuration paired with the schedule its worker runs.
#[derive(Debug, Clone)]
pub struct Scenario {
    config: MuxConfig,
    schedule: SendSchedule,
}

impl Scenario {
    pub fn new(config: MuxConfig, schedule: SendSchedule) -> Self {
        Self { config, schedule }
    }

    /// Scenario with [`SendSchedule::standard`] expressed in the config's time unit.
    pub fn standard(config: MuxConfig) -> Self {
        let schedule = SendSchedule::standard(config.time_unit);
        Self::new(config, schedule)
    }

    pub fn config(&self) -> &MuxConfig {
        &self.config
    }

    pub fn schedule(&self) -> &SendSchedule {
        &self.schedule
    }

    /// Compare the loop's worst-case duration against the schedule span.
    ///
    /// A `Short` result proves late sends cannot be observed. See
    /// [`ScenarioReport::coverage`] for what a run actually covered.
    pub fn budget_check(&self) -> BudgetCheck {
        let loop_budget = self.config.loop_budget();
        let schedule_span = self.schedule.span();
        if loop_budget >= schedule_span {
            BudgetCheck::Feasible
        } else {
            BudgetCheck::Short {
                loop_budget,
                schedule_span,
            }
        }
    }

    /// Validate config and schedule, then apply the budget policy:
    /// a short budget is an error in strict mode and a warning otherwise.
    pub fn check(&self) -> Result<()> {
        self.config.validate()?;
        self.schedule.validate()?;

        if let BudgetCheck::Short {
            loop_budget,
            schedule_span,
        } = self.budget_check()
        {
            if self.config.strict_budget {
                return Err(Error::BudgetTooShort {
                    loop_budget,
                    schedule_span,
                });
            }
            log::warn!(
                "[scenario] wait budget {:?} ends before worker schedule {:?}; late sends go unobserved",
                loop_budget,
                schedule_span
            );
        }
        Ok(())
    }

    /// Run the scenario to completion.
    ///
    /// The worker is always joined before this returns, even when the
    /// multiplexer fails.
    pub fn run(&self) -> Result<ScenarioReport> {
        self.check()?;
        let mux = Multiplexer::new(self.config.clone())?;

        let backend = self.config.backend;
        let a = NotifyChannel::with_backend(backend)?;
        let b = NotifyChannel::with_backend(backend)?;
        log::debug!("[scenario] channels ready: a={:?} b={:?}", a, b);

        let (run, worker) = std::thread::scope(|s| -> Result<_> {
            let handle = spawn_worker(s, &self.schedule, &a, &b)?;
            let run = mux.run(&a, &b);
            let worker = handle.join().map_err(|_| Error::WorkerPanicked)?;
            Ok((run?, worker?))
        })?;

        log::debug!(
            "[scenario] done: both_seen={} attempts={} worker_sends={}",
            run.both_seen,
            run.attempts_made(),
            worker.sends.len()
        );
        let report = ScenarioReport {
            backend,
            run,
            worker,
            schedule_span: self.schedule.span(),
        };
        if let BudgetCoverage::Short {
            loop_elapsed,
            schedule_span,
        } = report.coverage()
        {
            log::warn!(
                "[scenario] wait loop finished after {:?} of a {:?} schedule",
                loop_elapsed,
                schedule_span
            );
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::ChannelId;

    #[test]
    fn default_scenario_is_feasible() {
        let scenario = Scenario::standard(MuxConfig::default());
        assert_eq!(scenario.budget_check(), BudgetCheck::Feasible);
        assert!(scenario.check().is_ok());
    }

    #[test]
    fn strict_mode_rejects_short_budget() {
        let config = MuxConfig::default()
            .max_attempts(1)
            .attempt_timeout(Duration::from_millis(1))
            .time_unit(Duration::from_millis(10))
            .strict_budget(true);
        let scenario = Scenario::standard(config);

        assert!(matches!(
            scenario.budget_check(),
            BudgetCheck::Short { .. }
        ));
        assert!(matches!(
            scenario.run(),
            Err(Error::BudgetTooShort { .. })
        ));
    }

    #[test]
    fn backed_off_loop_covers_a_single_send() {
        // B is never drained, so every attempt backs off one unit.
        let config = MuxConfig::default()
            .max_attempts(3)
            .attempt_timeout(Duration::from_millis(50))
            .time_unit(Duration::from_millis(10));
        let schedule = SendSchedule::new().then(Duration::from_millis(20), ChannelId::B, 1);

        let report = Scenario::new(config, schedule).run().expect("run");

        assert_eq!(report.run.backoffs(), 3);
        assert!(report.run.elapsed >= report.schedule_span);
        assert_eq!(report.coverage(), BudgetCoverage::Covered);
    }

    #[test]
    fn empty_schedule_rejected_before_channels_exist() {
        let scenario = Scenario::new(MuxConfig::default(), SendSchedule::new());
        assert!(matches!(scenario.run(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn short_budget_still_runs_when_lenient() {
        let config = MuxConfig::default()
            .max_attempts(1)
            .attempt_timeout(Duration::from_millis(1))
            .time_unit(Duration::from_millis(5));
        let schedule = SendSchedule::new().then(Duration::from_millis(30), ChannelId::B, 1);

        let report = Scenario::new(config, schedule).run().expect("run");

        assert_eq!(report.run.attempts_made(), 1);
        assert!(!report.run.both_seen);
        // Joined: the late send completed even though nobody waited for it.
        assert_eq!(report.worker.sends.len(), 1);
        assert!(matches!(report.coverage(), BudgetCoverage::Short { .. }));
    }
}
