//! Integration tests for the isolated-process strategy.
//!
//! These spawn the real `quad-worker` binary built alongside the tests.

use std::f64::consts::PI;
use std::thread;
use std::time::Duration;

use quadra_compute::{
    integrate_concurrent, integrate_partitioned, ProcessPoolExecutor, Strategy, WorkerCommand,
};
use quadra_core::{integrate, Function, IntegrandError, Interval, QuadError, WorkerCause};

fn worker() -> WorkerCommand {
    WorkerCommand::new(env!("CARGO_BIN_EXE_quad-worker"))
}

fn processes() -> Strategy {
    Strategy::isolated_process(ProcessPoolExecutor::new(worker()))
}

#[test]
fn sin_over_zero_to_pi_is_two() {
    let value = integrate_concurrent(&Function::Sin, 0.0, PI, 4, 200_000, &processes()).unwrap();
    assert!((value - 2.0).abs() < 1e-3, "got {value}");
}

#[test]
fn matches_kernel_for_dividing_job_counts() {
    let f = Function::compose(Function::Exp, Function::scale(-1.0, Function::powi(2)));
    let n_iter = 40_000;
    let sequential = integrate(&f, -1.0, 2.0, n_iter).unwrap();
    for n_jobs in [1, 2, 4, 8] {
        let value = integrate_concurrent(&f, -1.0, 2.0, n_jobs, n_iter, &processes()).unwrap();
        assert!(
            (value - sequential).abs() < 1e-8,
            "n_jobs={n_jobs}: {value} vs {sequential}"
        );
    }
}

#[test]
fn threads_and_processes_agree() {
    let f = Function::Sum {
        terms: vec![Function::Sin, Function::polynomial(vec![1.0, 0.0, 0.5])],
    };
    let threads = Strategy::shared_memory();
    for n_jobs in [1, 2, 4, 8] {
        let shared = integrate_concurrent(&f, -0.5, 2.5, n_jobs, 80_000, &threads).unwrap();
        let isolated = integrate_concurrent(&f, -0.5, 2.5, n_jobs, 80_000, &processes()).unwrap();
        assert!(
            (shared - isolated).abs() < 1e-10,
            "n_jobs={n_jobs}: threads {shared} vs processes {isolated}"
        );
    }
}

#[test]
fn degenerate_interval_is_zero() {
    let value = integrate_concurrent(&Function::Sin, 2.0, 2.0, 3, 300, &processes()).unwrap();
    assert_eq!(value, 0.0);
}

#[test]
fn integrand_failure_names_the_subinterval() {
    let err = integrate_concurrent(&Function::Sqrt, -1.0, 1.0, 2, 1_000, &processes()).unwrap_err();
    match err {
        QuadError::WorkerFailure { job, interval, cause } => {
            assert_eq!(job, 0);
            assert_eq!(interval, Interval::new(-1.0, 0.0));
            match cause {
                WorkerCause::Integrand(IntegrandError::Domain { x, .. }) => assert_eq!(x, -1.0),
                other => panic!("unexpected cause: {other}"),
            }
        }
        other => panic!("expected worker failure, got {other}"),
    }
}

#[test]
fn invalid_arguments_are_rejected_before_spawning() {
    let strategy = processes();
    for (n_jobs, n_iter) in [(0, 100), (2, 0), (8, 4)] {
        let err = integrate_concurrent(&Function::Sin, 0.0, 1.0, n_jobs, n_iter, &strategy)
            .unwrap_err();
        assert!(err.is_invalid_argument(), "({n_jobs}, {n_iter}) gave {err}");
    }
}

#[test]
fn slow_worker_times_out() {
    let executor = ProcessPoolExecutor::new(worker()).with_timeout(Duration::from_millis(50));
    let err = integrate_partitioned(&executor, &Function::Sin, 0.0, 1.0, 2, 20_000_000_000)
        .unwrap_err();
    match err {
        QuadError::TimedOut { after, .. } => assert_eq!(after, Duration::from_millis(50)),
        other => panic!("expected timeout, got {other}"),
    }
}

#[test]
fn independent_callers_do_not_share_pools() {
    let handles: Vec<_> = (1..=3)
        .map(|n_jobs| {
            thread::spawn(move || {
                integrate_concurrent(&Function::Cos, 0.0, PI / 2.0, n_jobs, 30_000, &processes())
            })
        })
        .collect();
    for handle in handles {
        let value = handle.join().unwrap().unwrap();
        assert!((value - 1.0).abs() < 1e-3);
    }
}

#[cfg(unix)]
#[test]
fn garbage_reply_is_a_serialization_failure() {
    let command = WorkerCommand::new("sh").arg("-c").arg("cat >/dev/null; printf garbage-reply");
    let executor = ProcessPoolExecutor::new(command);
    let err = integrate_partitioned(&executor, &Function::Sin, 0.0, 1.0, 1, 10).unwrap_err();
    match err {
        QuadError::Serialization { job, .. } => assert_eq!(job, Some(0)),
        other => panic!("expected serialization failure, got {other}"),
    }
}

#[cfg(unix)]
#[test]
fn silent_worker_exit_is_a_worker_failure() {
    let command = WorkerCommand::new("sh").arg("-c").arg("echo dying >&2; exit 3");
    let executor = ProcessPoolExecutor::new(command);
    let err = integrate_partitioned(&executor, &Function::Sin, 0.0, 1.0, 2, 10).unwrap_err();
    match err {
        QuadError::WorkerFailure {
            cause: WorkerCause::Exited { status, stderr },
            ..
        } => {
            assert!(status.contains('3'), "status was {status}");
            assert!(stderr.contains("dying"));
        }
        other => panic!("expected worker failure, got {other}"),
    }
}

#[cfg(unix)]
#[test]
fn flooding_worker_is_cut_off_at_the_frame_limit() {
    let command = WorkerCommand::new("sh").arg("-c").arg("cat >/dev/null; yes");
    let executor = ProcessPoolExecutor::new(command).with_max_payload(1024);
    let err = integrate_partitioned(&executor, &Function::Sin, 0.0, 1.0, 2, 10).unwrap_err();
    match err {
        QuadError::Serialization { job, reason } => {
            assert!(job.is_some());
            assert!(reason.contains("more than 1028 bytes"), "{reason}");
        }
        other => panic!("expected serialization failure, got {other}"),
    }
}
