use quadra_core::{Integrand, PartitionPlan, QuadResult};

use super::{log_dispatch, run_task, Executor, PartialResult};

/// Runs every task on the calling thread, in job order.
///
/// Baseline for the parallel strategies: same partitioning, no pool.
#[derive(Debug, Clone, Copy, Default)]
pub struct SequentialExecutor;

impl<I: Integrand + ?Sized> Executor<I> for SequentialExecutor {
    fn name(&self) -> &'static str {
        "sequential"
    }

    fn execute(&self, integrand: &I, plan: &PartitionPlan) -> QuadResult<Vec<PartialResult>> {
        plan.tasks()
            .iter()
            .map(|task| {
                log_dispatch("sequential", task);
                run_task(integrand, task)
            })
            .collect()
    }
}
