// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! evmux-probe - dual-channel readiness probe
//!
//! Runs the standard worker schedule against the readiness multiplexer and
//! prints one line per attempt.

use clap::Parser;
use colored::*;
use evmux::{
    Backend, BudgetCoverage, ChannelId, MuxConfig, Scenario, ScenarioReport, SendSchedule,
    WaitOutcome,
};
use std::time::Duration;

/// Dual-channel readiness probe
#[derive(Parser, Debug)]
#[command(name = "evmux-probe")]
#[command(version = "0.1.0")]
#[command(about = "Run the eventfd/poll readiness scenario")]
struct Args {
    /// Attempt budget (default 10, or EVMUX_MAX_ATTEMPTS)
    #[arg(short = 'n', long)]
    attempts: Option<u32>,

    /// Per-attempt wait timeout in milliseconds
    #[arg(short, long)]
    timeout_ms: Option<u64>,

    /// Time unit in milliseconds (backoff and worker delays)
    #[arg(short, long)]
    unit_ms: Option<u64>,

    /// Units the worker sleeps before its first send
    #[arg(long, default_value = "0")]
    lead_in_units: u32,

    /// Channel backend: eventfd, pipe
    #[arg(short, long)]
    backend: Option<Backend>,

    /// Channel drained after both-seen: a, b
    #[arg(long, default_value = "a")]
    drain_target: ChannelId,

    /// Fail if the wait budget cannot cover the worker schedule
    #[arg(long)]
    strict: bool,

    /// Stop on the first wait failure
    #[arg(long)]
    abort_on_wait_failure: bool,

    /// Output a one-line JSON summary
    #[arg(long)]
    json: bool,
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    if let Err(e) = run(&args) {
        eprintln!("{}: {}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

/// Apply CLI flags on top of `base` (environment-derived in `run`).
fn build_config(args: &Args, base: MuxConfig) -> MuxConfig {
    let mut config = base
        .drain_target(args.drain_target)
        .abort_on_wait_failure(args.abort_on_wait_failure);

    if let Some(attempts) = args.attempts {
        config = config.max_attempts(attempts);
    }
    if let Some(ms) = args.timeout_ms {
        config = config.attempt_timeout(Duration::from_millis(ms));
    }
    if let Some(ms) = args.unit_ms {
        config = config.time_unit(Duration::from_millis(ms));
    }
    if let Some(backend) = args.backend {
        config = config.backend(backend);
    }
    if args.strict {
        config = config.strict_budget(true);
    }
    config
}

fn build_schedule(args: &Args, config: &MuxConfig) -> evmux::Result<SendSchedule> {
    let lead_in = config
        .time_unit
        .checked_mul(args.lead_in_units)
        .ok_or_else(|| {
            evmux::Error::InvalidConfig(format!(
                "lead-in of {} units of {:?} overflows",
                args.lead_in_units, config.time_unit
            ))
        })?;
    Ok(SendSchedule::standard(config.time_unit).lead_in(lead_in))
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let config = build_config(args, MuxConfig::from_env()?);
    let schedule = build_schedule(args, &config)?;

    if !args.json {
        eprintln!(
            "{} {} attempts, timeout {:?}, unit {:?}, backend {}",
            ">>>".green().bold(),
            config.max_attempts,
            config.attempt_timeout,
            config.time_unit,
            config.backend
        );
    }

    let report = Scenario::new(config, schedule).run()?;

    if args.json {
        print_json(&report);
    } else {
        print_report(&report);
    }
    Ok(())
}

fn print_report(report: &ScenarioReport) {
    let run = &report.run;

    println!();
    println!("{}", "=== evmux Probe Results ===".bold());
    println!();
    for record in &run.attempts {
        let outcome = match &record.outcome {
            WaitOutcome::Ready(set) => format!("ready {}", set).green(),
            WaitOutcome::TimedOut => "timeout".to_string().dimmed(),
            WaitOutcome::Failed(e) => format!("failed: {}", e).red(),
        };
        let drained = record
            .drained
            .map(|d| format!(" drained {}={}", d.channel, d.value))
            .unwrap_or_default();
        let backoff = if record.backed_off { " backoff" } else { "" };
        let latch = if record.both_seen { "*" } else { " " };
        println!(
            "  {}{:>3} {}{}{}",
            latch,
            record.index,
            outcome,
            drained.yellow(),
            backoff
        );
    }

    println!();
    println!("{}", "--- Summary ---".dimmed());
    let both = if run.both_seen {
        "yes".green()
    } else {
        "no".red()
    };
    println!("  {} {}", "Both seen:".cyan(), both);
    if let Some(at) = run.both_seen_at {
        println!("  {} {}", "Latched at:".cyan(), at);
    }
    println!("  {} {}", "Attempts:".cyan(), run.attempts_made());
    println!("  {} {}", "Timeouts:".cyan(), run.timeouts());
    println!("  {} {}", "Failures:".cyan(), run.failures());
    println!("  {} {}", "Backoffs:".cyan(), run.backoffs());
    println!("  {} {}", "Drains:".cyan(), run.drains().count());
    println!("  {} {:?}", "Loop time:".cyan(), run.elapsed);
    println!(
        "  {} {} sends in {:?}",
        "Worker:".cyan(),
        report.worker.sends.len(),
        report.worker.elapsed
    );
    let coverage = match report.coverage() {
        BudgetCoverage::Covered => "covered".green(),
        BudgetCoverage::Short { schedule_span, .. } => {
            format!("short of {:?} schedule", schedule_span).yellow()
        }
    };
    println!("  {} {}", "Coverage:".cyan(), coverage);
    println!();
}

fn print_json(report: &ScenarioReport) {
    let run = &report.run;
    let latched = run
        .both_seen_at
        .map_or_else(|| "null".to_string(), |at| at.to_string());
    println!(
        r#"{{"backend":"{}","both_seen":{},"both_seen_at":{},"attempts":{},"timeouts":{},"failures":{},"backoffs":{},"drains":{},"loop_secs":{:.3},"worker_sends":{},"worker_secs":{:.3},"covered":{}}}"#,
        report.backend,
        run.both_seen,
        latched,
        run.attempts_made(),
        run.timeouts(),
        run.failures(),
        run.backoffs(),
        run.drains().count(),
        run.elapsed.as_secs_f64(),
        report.worker.sends.len(),
        report.worker.elapsed.as_secs_f64(),
        report.coverage() == BudgetCoverage::Covered
    );
}
