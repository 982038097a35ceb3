use quadra_core::{Config, Function, PartitionPlan, QuadResult, StrategyKind};

use crate::executor::{
    integrate_partitioned, Executor, PartialResult, ProcessPoolExecutor, ThreadPoolExecutor,
};

/// Interchangeable execution strategies for [`integrate_concurrent`].
#[derive(Debug, Clone)]
pub enum Strategy {
    SharedMemory(ThreadPoolExecutor),
    IsolatedProcess(ProcessPoolExecutor),
}

impl Strategy {
    pub fn shared_memory() -> Self {
        Self::SharedMemory(ThreadPoolExecutor::new())
    }

    pub fn isolated_process(executor: ProcessPoolExecutor) -> Self {
        Self::IsolatedProcess(executor)
    }

    /// Build the strategy named by `kind`, resolving the worker binary from
    /// config when processes are requested.
    pub fn from_kind(kind: StrategyKind, config: &Config) -> QuadResult<Self> {
        match kind {
            StrategyKind::SharedMemory => Ok(Self::shared_memory()),
            StrategyKind::IsolatedProcess => Ok(Self::IsolatedProcess(
                ProcessPoolExecutor::from_config(&config.worker)?,
            )),
        }
    }

    pub fn from_config(config: &Config) -> QuadResult<Self> {
        Self::from_kind(config.executor.strategy, config)
    }

    pub fn kind(&self) -> StrategyKind {
        match self {
            Self::SharedMemory(_) => StrategyKind::SharedMemory,
            Self::IsolatedProcess(_) => StrategyKind::IsolatedProcess,
        }
    }
}

impl Executor<Function> for Strategy {
    fn name(&self) -> &'static str {
        match self {
            Self::SharedMemory(e) => Executor::<Function>::name(e),
            Self::IsolatedProcess(e) => e.name(),
        }
    }

    fn execute(&self, integrand: &Function, plan: &PartitionPlan) -> QuadResult<Vec<PartialResult>> {
        match self {
            Self::SharedMemory(e) => e.execute(integrand, plan),
            Self::IsolatedProcess(e) => e.execute(integrand, plan),
        }
    }
}

/// Integrate `f` over `[a, b]` across `n_jobs` workers using `strategy`.
///
/// Every strategy partitions identically, so results agree up to
/// floating-point summation order.
pub fn integrate_concurrent(
    f: &Function,
    a: f64,
    b: f64,
    n_jobs: usize,
    n_iter: u64,
    strategy: &Strategy,
) -> QuadResult<f64> {
    integrate_partitioned(strategy, f, a, b, n_jobs, n_iter)
}
