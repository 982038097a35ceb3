use std::sync::mpsc;

use quadra_core::{Integrand, PartitionPlan, QuadError, QuadResult};

use super::{log_dispatch, run_task, Executor, PartialResult};

/// Shared-memory strategy: one rayon worker thread per job.
///
/// The pool is built for each call and dropped when the call returns, so
/// independent calls never contend for a global pool. The integrand is shared
/// by reference; each worker only sends its own partial result over the
/// completion channel.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadPoolExecutor {
    max_threads: Option<usize>,
}

impl ThreadPoolExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cap the pool size. Jobs beyond the cap queue inside the pool.
    pub fn with_max_threads(max_threads: usize) -> Self {
        Self {
            max_threads: Some(max_threads.max(1)),
        }
    }

    fn pool_size(&self, n_jobs: usize) -> usize {
        let n_jobs = n_jobs.max(1);
        self.max_threads.map_or(n_jobs, |cap| cap.min(n_jobs))
    }
}

impl<I: Integrand + ?Sized> Executor<I> for ThreadPoolExecutor {
    fn name(&self) -> &'static str {
        "shared_memory"
    }

    fn execute(&self, integrand: &I, plan: &PartitionPlan) -> QuadResult<Vec<PartialResult>> {
        let threads = self.pool_size(plan.len());
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("quadra-worker-{i}"))
            .build()
            .map_err(|e| QuadError::Pool(format!("failed to build thread pool: {e}")))?;

        let (tx, rx) = mpsc::channel::<QuadResult<PartialResult>>();
        pool.scope(|scope| {
            for task in plan.tasks() {
                log_dispatch("shared_memory", task);
                let tx = tx.clone();
                scope.spawn(move |_| {
                    // The receiver outlives the scope, so send cannot fail.
                    let _ = tx.send(run_task(integrand, task));
                });
            }
        });
        drop(tx);

        // Every task has finished here; drain in completion order and keep
        // the first failure.
        let mut partials = Vec::with_capacity(plan.len());
        let mut first_error = None;
        for outcome in rx {
            match outcome {
                Ok(partial) => partials.push(partial),
                Err(e) if first_error.is_none() => first_error = Some(e),
                Err(_) => {}
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(partials),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::f64::consts::PI;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    use quadra_core::{integrate, Fallible, Function, IntegrandError, Interval, WorkerCause};

    use super::*;
    use crate::executor::integrate_partitioned;

    #[test]
    fn agrees_with_kernel_for_dividing_job_counts() {
        let n_iter = 80_000;
        let sequential = integrate(&f64::sin, 0.0, PI, n_iter).unwrap();
        for n_jobs in [1, 2, 4, 8] {
            let parallel =
                integrate_partitioned(&ThreadPoolExecutor::new(), &f64::sin, 0.0, PI, n_jobs, n_iter)
                    .unwrap();
            assert!(
                (parallel - sequential).abs() < 1e-8,
                "n_jobs={n_jobs}: {parallel} vs {sequential}"
            );
        }
    }

    #[test]
    fn tolerates_dropped_remainder_iterations() {
        let n_iter = 100_003;
        let sequential = integrate(&f64::exp, 0.0, 1.0, n_iter).unwrap();
        let parallel =
            integrate_partitioned(&ThreadPoolExecutor::new(), &f64::exp, 0.0, 1.0, 7, n_iter)
                .unwrap();
        // at most n_jobs - 1 dropped steps worth of error, plus rule error
        let max_f = 1f64.exp();
        let step = 1.0 / n_iter as f64;
        assert!((parallel - sequential).abs() < 6.0 * max_f * step + 1e-4);
    }

    #[test]
    fn every_job_runs_exactly_once() {
        let calls = AtomicUsize::new(0);
        let counting = Fallible(|x: f64| {
            calls.fetch_add(1, Ordering::Relaxed);
            Ok(x)
        });
        let plan = PartitionPlan::new(Interval::new(0.0, 1.0), 5, 500).unwrap();
        let partials = ThreadPoolExecutor::new().execute(&counting, &plan).unwrap();
        assert_eq!(partials.len(), 5);
        assert_eq!(calls.load(Ordering::Relaxed), 500);

        let mut jobs: Vec<_> = partials.iter().map(|p| p.job).collect();
        jobs.sort_unstable();
        assert_eq!(jobs, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn failure_in_one_subinterval_fails_the_call() {
        let err = integrate_partitioned(
            &ThreadPoolExecutor::new(),
            &Function::Sqrt,
            -1.0,
            1.0,
            2,
            1_000,
        )
        .unwrap_err();
        match err {
            QuadError::WorkerFailure { job, interval, cause } => {
                assert_eq!(job, 0);
                assert_eq!(interval, Interval::new(-1.0, 0.0));
                assert!(matches!(
                    cause,
                    WorkerCause::Integrand(IntegrandError::Domain { .. })
                ));
            }
            other => panic!("expected worker failure, got {other}"),
        }
    }

    #[test]
    fn panicking_integrand_is_reported_not_swallowed() {
        let picky = |x: f64| -> f64 {
            if x >= 0.75 {
                panic!("refusing x = {x}");
            }
            x
        };
        let err = integrate_partitioned(&ThreadPoolExecutor::new(), &picky, 0.0, 1.0, 4, 400)
            .unwrap_err();
        assert_eq!(err.failed_job(), Some(3));
        assert!(matches!(
            err,
            QuadError::WorkerFailure {
                cause: WorkerCause::Panicked(_),
                ..
            }
        ));
    }

    #[test]
    fn capped_pool_still_runs_all_jobs() {
        let executor = ThreadPoolExecutor::with_max_threads(2);
        assert_eq!(executor.pool_size(8), 2);
        assert_eq!(ThreadPoolExecutor::new().pool_size(8), 8);

        let capped = integrate_partitioned(&executor, &f64::cos, 0.0, 1.0, 8, 8_000).unwrap();
        let direct = integrate(&f64::cos, 0.0, 1.0, 8_000).unwrap();
        assert!((capped - direct).abs() < 1e-8);
    }

    #[test]
    fn closures_capture_state_by_reference() {
        let coefficients = vec![1.0, 2.0, 3.0];
        let poly = |x: f64| coefficients.iter().rev().fold(0.0, |acc, c| acc * x + c);
        let threaded =
            integrate_partitioned(&ThreadPoolExecutor::new(), &poly, 0.0, 1.0, 4, 40_000).unwrap();
        // 1 + 1 + 1 = 3
        assert!((threaded - 3.0).abs() < 1e-3);
    }

    #[test]
    fn independent_calls_run_concurrently() {
        let handles: Vec<_> = (1..=4)
            .map(|n_jobs| {
                thread::spawn(move || {
                    integrate_partitioned(
                        &ThreadPoolExecutor::new(),
                        &f64::sin,
                        0.0,
                        PI,
                        n_jobs,
                        40_000,
                    )
                })
            })
            .collect();
        for handle in handles {
            let value = handle.join().unwrap().unwrap();
            assert!((value - 2.0).abs() < 1e-3);
        }
    }

    #[test]
    fn degenerate_interval_is_zero() {
        let value =
            integrate_partitioned(&ThreadPoolExecutor::new(), &f64::sin, 1.0, 1.0, 4, 400).unwrap();
        assert_eq!(value, 0.0);
    }

    #[test]
    fn rejects_invalid_job_and_iteration_counts() {
        let exec = ThreadPoolExecutor::new();
        assert!(integrate_partitioned(&exec, &f64::sin, 0.0, 1.0, 0, 100)
            .unwrap_err()
            .is_invalid_argument());
        assert!(integrate_partitioned(&exec, &f64::sin, 0.0, 1.0, 2, 0)
            .unwrap_err()
            .is_invalid_argument());
        assert!(integrate_partitioned(&exec, &f64::sin, 0.0, 1.0, 4, 3)
            .unwrap_err()
            .is_invalid_argument());
    }
}
