use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{debug, info};

use quadra_core::{integrate_interval, Interval, QuadResult};

use crate::config::BenchConfig;
use crate::report::{BenchReport, BenchRow, KernelReport, KernelRow, Timing};
use crate::runner::Runner;

/// Run `op` `repeats` times, returning the timings and the last value.
fn time_repeats<F>(repeats: usize, mut op: F) -> QuadResult<(Timing, f64)>
where
    F: FnMut() -> QuadResult<f64>,
{
    let mut runs: Vec<Duration> = Vec::with_capacity(repeats);
    let mut value = 0.0;
    for _ in 0..repeats {
        let start = Instant::now();
        value = op()?;
        runs.push(start.elapsed());
    }
    Ok((Timing::from_runs(&runs), value))
}

/// Time every runner at every job count in `config`.
pub fn run_bench(config: &BenchConfig, runners: &[Runner]) -> Result<BenchReport> {
    config.validate()?;
    let function = config.parsed_function()?;
    let interval = Interval::new(config.low, config.high);

    let mut rows = Vec::with_capacity(runners.len() * config.jobs.len());
    for runner in runners {
        for &n_jobs in &config.jobs {
            let (timing, value) = time_repeats(config.repeats, || {
                runner.integrate(&function, interval, n_jobs, config.n_iter)
            })
            .with_context(|| format!("{} run with {n_jobs} jobs failed", runner.name()))?;
            debug!(
                strategy = runner.name(),
                n_jobs,
                mean_secs = timing.mean_secs,
                "bench point done"
            );
            rows.push(BenchRow {
                strategy: runner.name().to_string(),
                n_jobs,
                timing,
                value,
            });
        }
    }

    info!(points = rows.len(), "bench complete");
    Ok(BenchReport {
        generated_at: Utc::now(),
        function: function.to_string(),
        interval,
        n_iter: config.n_iter,
        rows,
    })
}

/// Time the single-threaded kernel at each iteration count in `config`.
pub fn run_kernel_bench(config: &BenchConfig) -> Result<KernelReport> {
    config.validate()?;
    let function = config.parsed_function()?;
    let interval = Interval::new(config.low, config.high);

    let mut rows = Vec::with_capacity(config.kernel_iterations.len());
    for &n_iter in &config.kernel_iterations {
        let (timing, value) = time_repeats(config.kernel_repeats, || {
            integrate_interval(&function, interval, n_iter)
        })
        .with_context(|| format!("kernel run with {n_iter} iterations failed"))?;
        rows.push(KernelRow { n_iter, timing, value });
    }

    info!(points = rows.len(), "kernel bench complete");
    Ok(KernelReport {
        generated_at: Utc::now(),
        function: function.to_string(),
        interval,
        rows,
    })
}
