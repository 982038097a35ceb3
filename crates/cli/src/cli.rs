use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// Concurrent numerical integration and its benchmarking harness.
///
/// Defaults for jobs, iterations and strategy come from the `QUADRA_*`
/// environment (or a `.env` file); flags override them.
#[derive(Parser, Debug)]
#[command(name = "quadra", version, about = "Concurrent numerical integration")]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Integrate a single function over an interval.
    Integrate(IntegrateArgs),
    /// Time every strategy across a range of job counts.
    Bench(BenchArgs),
    /// Time the bare kernel at increasing iteration counts.
    BenchKernel(BenchKernelArgs),
}

/// How the partitions are executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StrategyArg {
    /// Rayon worker threads sharing memory.
    Threads,
    /// One `quad-worker` child process per partition.
    Processes,
    /// Partitions run one after another on the calling thread.
    Sequential,
}

#[derive(clap::Args, Debug)]
pub struct IntegrateArgs {
    /// Integrand: sin, cos, exp, ln, sqrt, x, x^N, const:V, poly:a,b,c or JSON
    #[arg(long, short = 'f', default_value = "sin")]
    pub function: String,

    /// Lower bound
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    pub low: f64,

    /// Upper bound
    #[arg(long, default_value_t = std::f64::consts::PI, allow_negative_numbers = true)]
    pub high: f64,

    /// Number of partitions (default: QUADRA_JOBS)
    #[arg(long, short = 'j')]
    pub jobs: Option<usize>,

    /// Total left-rectangle steps (default: QUADRA_ITERATIONS)
    #[arg(long, short = 'n')]
    pub iterations: Option<u64>,

    /// Execution strategy (default: QUADRA_STRATEGY)
    #[arg(long, short = 's', value_enum)]
    pub strategy: Option<StrategyArg>,

    /// Print the result as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(clap::Args, Debug)]
pub struct BenchArgs {
    /// Bench profile (TOML); built-in defaults when omitted
    #[arg(long, short = 'c')]
    pub config: Option<PathBuf>,

    /// Job counts to sweep, comma separated
    #[arg(long, value_delimiter = ',')]
    pub jobs: Option<Vec<usize>>,

    /// Total steps per run
    #[arg(long)]
    pub iterations: Option<u64>,

    /// Runs per (strategy, jobs) pair
    #[arg(long)]
    pub repeats: Option<usize>,

    /// Strategies to time, comma separated
    #[arg(long, value_enum, value_delimiter = ',', default_value = "threads,processes")]
    pub strategies: Vec<StrategyArg>,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(clap::Args, Debug)]
pub struct BenchKernelArgs {
    /// Bench profile (TOML); built-in defaults when omitted
    #[arg(long, short = 'c')]
    pub config: Option<PathBuf>,

    /// Iteration counts to time, comma separated
    #[arg(long, value_delimiter = ',')]
    pub iterations: Option<Vec<u64>>,

    /// Runs per iteration count
    #[arg(long)]
    pub repeats: Option<usize>,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}
