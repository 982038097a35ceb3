use anyhow::{Context, Result};

use quadra_compute::{integrate_concurrent, integrate_partitioned, SequentialExecutor, Strategy};
use quadra_core::{Config, Function, Interval, QuadResult, StrategyKind};

use crate::cli::StrategyArg;

/// A resolved execution strategy the CLI can drive.
#[derive(Debug, Clone)]
pub enum Runner {
    Sequential(SequentialExecutor),
    Concurrent(Strategy),
}

impl Runner {
    /// Resolve `arg`, or the configured default strategy when `None`.
    pub fn build(arg: Option<StrategyArg>, config: &Config) -> Result<Self> {
        let kind = match arg {
            Some(StrategyArg::Sequential) => return Ok(Self::Sequential(SequentialExecutor)),
            Some(StrategyArg::Threads) => StrategyKind::SharedMemory,
            Some(StrategyArg::Processes) => StrategyKind::IsolatedProcess,
            None => config.executor.strategy,
        };
        let strategy = Strategy::from_kind(kind, config)
            .with_context(|| format!("failed to set up {kind} strategy"))?;
        Ok(Self::Concurrent(strategy))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Sequential(_) => "sequential",
            Self::Concurrent(strategy) => strategy.kind().as_str(),
        }
    }

    pub fn integrate(
        &self,
        f: &Function,
        interval: Interval,
        n_jobs: usize,
        n_iter: u64,
    ) -> QuadResult<f64> {
        match self {
            Self::Sequential(executor) => {
                integrate_partitioned(executor, f, interval.low, interval.high, n_jobs, n_iter)
            }
            Self::Concurrent(strategy) => {
                integrate_concurrent(f, interval.low, interval.high, n_jobs, n_iter, strategy)
            }
        }
    }
}
