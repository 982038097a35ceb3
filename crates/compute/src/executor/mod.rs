//! Partitioned execution: split an interval, run one kernel per piece, sum.

pub mod process;
pub mod sequential;
pub mod threads;

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;

use quadra_core::{
    integrate_interval, Integrand, Interval, PartitionPlan, PartitionTask, QuadError, QuadResult,
    WorkerCause,
};
use serde::Serialize;
use tracing::{debug, info, warn};

pub use process::{ProcessPoolExecutor, WorkerCommand};
pub use sequential::SequentialExecutor;
pub use threads::ThreadPoolExecutor;

/// Kernel estimate for one sub-interval.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PartialResult {
    pub job: usize,
    pub interval: Interval,
    pub value: f64,
}

impl PartialResult {
    pub fn for_task(task: &PartitionTask, value: f64) -> Self {
        Self {
            job: task.job,
            interval: task.interval,
            value,
        }
    }
}

/// Runs every task of a plan and hands back one partial result per task.
///
/// Results come back in completion order. Any failed task fails the whole
/// batch; implementations never substitute a missing partial with zero.
pub trait Executor<I: ?Sized> {
    /// Short label for logs and bench reports.
    fn name(&self) -> &'static str;

    fn execute(&self, integrand: &I, plan: &PartitionPlan) -> QuadResult<Vec<PartialResult>>;
}

/// Integrate `f` over `[a, b]` by splitting it into `n_jobs` pieces, each
/// given `n_iter / n_jobs` iterations, and summing the partial results.
pub fn integrate_partitioned<I, E>(
    executor: &E,
    f: &I,
    a: f64,
    b: f64,
    n_jobs: usize,
    n_iter: u64,
) -> QuadResult<f64>
where
    I: ?Sized,
    E: Executor<I> + ?Sized,
{
    let plan = PartitionPlan::new(Interval::new(a, b), n_jobs, n_iter)?;
    if plan.dropped_iterations() > 0 {
        debug!(
            dropped = plan.dropped_iterations(),
            local_n_iter = plan.local_n_iter(),
            "iteration budget not divisible by job count"
        );
    }

    let start = Instant::now();
    let partials = match executor.execute(f, &plan) {
        Ok(partials) => partials,
        Err(e) => {
            warn!(executor = executor.name(), error = %e, "partitioned integration failed");
            return Err(e);
        }
    };
    let total = reduce(&plan, &partials)?;

    info!(
        executor = executor.name(),
        n_jobs,
        n_iter,
        total,
        "integration complete in {:.3}s",
        start.elapsed().as_secs_f64()
    );
    Ok(total)
}

/// Sum partial results after checking every job reported exactly once.
pub fn reduce(plan: &PartitionPlan, partials: &[PartialResult]) -> QuadResult<f64> {
    let mut seen = vec![false; plan.len()];
    for partial in partials {
        let Some(slot) = seen.get_mut(partial.job) else {
            return Err(QuadError::Pool(format!(
                "job {} is outside the plan of {} tasks",
                partial.job,
                plan.len()
            )));
        };
        if *slot {
            return Err(QuadError::Pool(format!(
                "job {} reported more than once",
                partial.job
            )));
        }
        *slot = true;
    }
    if let Some(missing) = seen.iter().position(|s| !s) {
        return Err(QuadError::Pool(format!("job {missing} produced no result")));
    }

    Ok(partials.iter().map(|p| p.value).sum())
}

/// Run the kernel for one task, turning integrand errors and panics into a
/// [`QuadError::WorkerFailure`] that names the task.
pub fn run_task<I: Integrand + ?Sized>(f: &I, task: &PartitionTask) -> QuadResult<PartialResult> {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        integrate_interval(f, task.interval, task.n_iter)
    }));
    let cause = match outcome {
        Ok(Ok(value)) => return Ok(PartialResult::for_task(task, value)),
        Ok(Err(QuadError::Integrand(e))) => WorkerCause::Integrand(e),
        Ok(Err(other)) => return Err(other),
        Err(payload) => WorkerCause::Panicked(panic_message(payload.as_ref())),
    };
    Err(QuadError::WorkerFailure {
        job: task.job,
        interval: task.interval,
        cause,
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Log the bounds of a task about to be dispatched.
pub(crate) fn log_dispatch(executor: &str, task: &PartitionTask) {
    debug!(
        executor,
        job = task.job,
        low = task.interval.low,
        high = task.interval.high,
        n_iter = task.n_iter,
        "dispatching job"
    );
}
