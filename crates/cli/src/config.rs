use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use quadra_core::Function;

/// Benchmark profile loaded from TOML. Every field is optional in the file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchConfig {
    /// Integrand, same syntax as `integrate --function`
    #[serde(default = "default_function")]
    pub function: String,

    #[serde(default)]
    pub low: f64,

    #[serde(default = "default_high")]
    pub high: f64,

    /// Job counts swept by `bench`
    #[serde(default = "default_jobs")]
    pub jobs: Vec<usize>,

    /// Total steps per `bench` run
    #[serde(default = "default_n_iter")]
    pub n_iter: u64,

    #[serde(default = "default_repeats")]
    pub repeats: usize,

    /// Iteration counts timed by `bench-kernel`
    #[serde(default = "default_kernel_iterations")]
    pub kernel_iterations: Vec<u64>,

    #[serde(default = "default_kernel_repeats")]
    pub kernel_repeats: usize,
}

fn default_function() -> String {
    "sin".to_string()
}

fn default_high() -> f64 {
    std::f64::consts::PI
}

fn default_jobs() -> Vec<usize> {
    vec![2, 4, 6, 8]
}

fn default_n_iter() -> u64 {
    400_000
}

fn default_repeats() -> usize {
    3
}

fn default_kernel_iterations() -> Vec<u64> {
    vec![10_000, 50_000, 100_000, 500_000]
}

fn default_kernel_repeats() -> usize {
    5
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            function: default_function(),
            low: 0.0,
            high: default_high(),
            jobs: default_jobs(),
            n_iter: default_n_iter(),
            repeats: default_repeats(),
            kernel_iterations: default_kernel_iterations(),
            kernel_repeats: default_kernel_repeats(),
        }
    }
}

impl BenchConfig {
    /// Load the profile at `path`, or the built-in defaults when `None`.
    /// An explicit path that does not exist is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            debug!("No bench profile given, using defaults");
            return Ok(Self::default());
        };
        debug!(path = %path.display(), "Loading bench profile");
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read bench profile: {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("failed to parse bench profile: {}", path.display()))?;
        Ok(config)
    }

    pub fn parsed_function(&self) -> Result<Function> {
        self.function
            .parse()
            .with_context(|| format!("invalid function '{}'", self.function))
    }

    /// Reject profiles that could not produce a single timed run.
    pub fn validate(&self) -> Result<()> {
        if self.repeats == 0 || self.kernel_repeats == 0 {
            bail!("repeats must be at least 1");
        }
        if self.jobs.is_empty() {
            bail!("at least one job count is required");
        }
        if self.kernel_iterations.is_empty() {
            bail!("at least one kernel iteration count is required");
        }
        if let Some(&n_jobs) = self.jobs.iter().find(|&&j| j == 0 || j as u64 > self.n_iter) {
            bail!("job count {n_jobs} must be between 1 and n_iter ({})", self.n_iter);
        }
        if self.kernel_iterations.contains(&0) {
            bail!("kernel iteration counts must be positive");
        }
        Ok(())
    }
}
