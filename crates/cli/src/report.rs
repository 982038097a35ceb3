//! Result and benchmark reports, rendered as text tables or JSON.

use std::fmt::Write as _;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use quadra_core::Interval;

/// Wall-clock totals over a set of repeated runs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Timing {
    pub repeats: usize,
    pub total_secs: f64,
    pub mean_secs: f64,
}

impl Timing {
    pub fn from_runs(runs: &[Duration]) -> Self {
        let total: Duration = runs.iter().sum();
        let total_secs = total.as_secs_f64();
        let mean_secs = if runs.is_empty() { 0.0 } else { total_secs / runs.len() as f64 };
        Self {
            repeats: runs.len(),
            total_secs,
            mean_secs,
        }
    }
}

// ── Single integration ────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct IntegrateReport {
    pub computed_at: DateTime<Utc>,
    pub function: String,
    pub interval: Interval,
    pub strategy: String,
    pub n_jobs: usize,
    pub n_iter: u64,
    pub dropped_iterations: u64,
    pub value: f64,
    pub elapsed_secs: f64,
}

impl IntegrateReport {
    pub fn render(&self) -> String {
        let mut out = format!(
            "integral of {} over {} = {:.12}\n  strategy={} jobs={} iterations={} elapsed={:.6}s",
            self.function,
            self.interval,
            self.value,
            self.strategy,
            self.n_jobs,
            self.n_iter,
            self.elapsed_secs
        );
        if self.dropped_iterations > 0 {
            let _ = write!(out, " (dropped {} remainder steps)", self.dropped_iterations);
        }
        out
    }
}

// ── Strategy benchmark ────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct BenchRow {
    pub strategy: String,
    pub n_jobs: usize,
    #[serde(flatten)]
    pub timing: Timing,
    pub value: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct BenchReport {
    pub generated_at: DateTime<Utc>,
    pub function: String,
    pub interval: Interval,
    pub n_iter: u64,
    pub rows: Vec<BenchRow>,
}

impl BenchReport {
    pub fn render_table(&self) -> String {
        let mut out = format!(
            "bench {} over {}, n_iter={} ({})\n",
            self.function,
            self.interval,
            self.n_iter,
            self.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
        );
        let _ = writeln!(
            out,
            "{:<18} {:>5} {:>7} {:>12} {:>12} {:>18}",
            "strategy", "jobs", "repeats", "total_s", "mean_s", "value"
        );
        for row in &self.rows {
            let _ = writeln!(
                out,
                "{:<18} {:>5} {:>7} {:>12.6} {:>12.6} {:>18.12}",
                row.strategy,
                row.n_jobs,
                row.timing.repeats,
                row.timing.total_secs,
                row.timing.mean_secs,
                row.value
            );
        }
        out
    }
}

// ── Kernel benchmark ──────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct KernelRow {
    pub n_iter: u64,
    #[serde(flatten)]
    pub timing: Timing,
    pub value: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct KernelReport {
    pub generated_at: DateTime<Utc>,
    pub function: String,
    pub interval: Interval,
    pub rows: Vec<KernelRow>,
}

impl KernelReport {
    pub fn render_table(&self) -> String {
        let mut out = format!(
            "kernel {} over {} ({})\n",
            self.function,
            self.interval,
            self.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
        );
        let _ = writeln!(
            out,
            "{:>12} {:>7} {:>12} {:>12} {:>18}",
            "n_iter", "repeats", "total_s", "mean_s", "value"
        );
        for row in &self.rows {
            let _ = writeln!(
                out,
                "{:>12} {:>7} {:>12.6} {:>12.6} {:>18.12}",
                row.n_iter, row.timing.repeats, row.timing.total_secs, row.timing.mean_secs, row.value
            );
        }
        out
    }
}
