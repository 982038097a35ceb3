mod bench;
mod cli;
mod config;
mod report;
mod runner;

use std::time::Instant;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use serde::Serialize;
use tracing::info;

use quadra_core::{Config, Function, Interval};

use crate::cli::{BenchArgs, BenchKernelArgs, CliArgs, Command, IntegrateArgs};
use crate::config::BenchConfig;
use crate::report::{BenchReport, IntegrateReport, KernelReport};
use crate::runner::Runner;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    quadra_core::config::load_dotenv();
    let config = Config::from_env();
    config.log_summary();

    let args = CliArgs::parse();
    match args.command {
        Command::Integrate(args) => cmd_integrate(args, &config),
        Command::Bench(args) => cmd_bench(args, &config),
        Command::BenchKernel(args) => cmd_bench_kernel(args),
    }
}

fn cmd_integrate(args: IntegrateArgs, config: &Config) -> Result<()> {
    let function: Function = args
        .function
        .parse()
        .with_context(|| format!("invalid function '{}'", args.function))?;
    let interval = Interval::new(args.low, args.high);
    let n_jobs = args.jobs.unwrap_or(config.executor.jobs);
    let n_iter = args.iterations.unwrap_or(config.executor.iterations);
    let runner = Runner::build(args.strategy, config)?;

    let start = Instant::now();
    let value = runner
        .integrate(&function, interval, n_jobs, n_iter)
        .with_context(|| format!("integration of {function} over {interval} failed"))?;

    let report = IntegrateReport {
        computed_at: Utc::now(),
        function: function.to_string(),
        interval,
        strategy: runner.name().to_string(),
        n_jobs,
        n_iter,
        dropped_iterations: dropped_iterations(n_jobs, n_iter),
        value,
        elapsed_secs: start.elapsed().as_secs_f64(),
    };
    emit(&report, args.json, IntegrateReport::render)
}

/// Steps lost to the floor-division split. Only meaningful once the
/// integration has accepted `n_jobs`.
fn dropped_iterations(n_jobs: usize, n_iter: u64) -> u64 {
    n_iter.checked_rem(n_jobs as u64).unwrap_or(0)
}

fn cmd_bench(args: BenchArgs, config: &Config) -> Result<()> {
    let mut profile = BenchConfig::load(args.config.as_deref())?;
    if let Some(jobs) = args.jobs {
        profile.jobs = jobs;
    }
    if let Some(n_iter) = args.iterations {
        profile.n_iter = n_iter;
    }
    if let Some(repeats) = args.repeats {
        profile.repeats = repeats;
    }

    let runners = args
        .strategies
        .iter()
        .map(|&s| Runner::build(Some(s), config))
        .collect::<Result<Vec<_>>>()?;
    info!(
        strategies = runners.len(),
        points = profile.jobs.len(),
        n_iter = profile.n_iter,
        "starting bench"
    );

    let report = bench::run_bench(&profile, &runners)?;
    emit(&report, args.json, BenchReport::render_table)
}

fn cmd_bench_kernel(args: BenchKernelArgs) -> Result<()> {
    let mut profile = BenchConfig::load(args.config.as_deref())?;
    if let Some(iterations) = args.iterations {
        profile.kernel_iterations = iterations;
    }
    if let Some(repeats) = args.repeats {
        profile.kernel_repeats = repeats;
    }

    let report = bench::run_kernel_bench(&profile)?;
    emit(&report, args.json, KernelReport::render_table)
}

fn emit<T: Serialize>(report: &T, json: bool, render: impl Fn(&T) -> String) -> Result<()> {
    if json {
        let out = serde_json::to_string_pretty(report).context("failed to serialize report")?;
        println!("{out}");
    } else {
        println!("{}", render(report).trim_end());
    }
    Ok(())
}
