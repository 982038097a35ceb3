use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{QuadError, QuadResult};

/// Integration bounds. `low > high` is allowed and flips the sign of the result.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Interval {
    pub low: f64,
    pub high: f64,
}

impl Interval {
    pub const fn new(low: f64, high: f64) -> Self {
        Self { low, high }
    }

    /// Signed width, `high - low`.
    pub fn width(&self) -> f64 {
        self.high - self.low
    }

    pub fn is_degenerate(&self) -> bool {
        self.low == self.high
    }

    pub fn validate(&self) -> QuadResult<()> {
        if !self.low.is_finite() || !self.high.is_finite() {
            return Err(QuadError::invalid(format!(
                "interval bounds must be finite, got {self}"
            )));
        }
        Ok(())
    }

    /// Whether `x` lies within the closed interval, regardless of orientation.
    pub fn contains(&self, x: f64) -> bool {
        let (lo, hi) = if self.low <= self.high {
            (self.low, self.high)
        } else {
            (self.high, self.low)
        };
        lo <= x && x <= hi
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.low, self.high)
    }
}

/// One unit of work: a sub-interval and the iteration budget assigned to it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PartitionTask {
    pub job: usize,
    pub interval: Interval,
    pub n_iter: u64,
}

/// Contiguous split of an interval into `n_jobs` equal-width tasks.
///
/// Each task receives `n_iter / n_jobs` iterations. The remainder is dropped,
/// so up to `n_jobs - 1` iterations of the total budget go unused.
#[derive(Debug, Clone, PartialEq)]
pub struct PartitionPlan {
    interval: Interval,
    n_iter: u64,
    tasks: Vec<PartitionTask>,
}

impl PartitionPlan {
    pub fn new(interval: Interval, n_jobs: usize, n_iter: u64) -> QuadResult<Self> {
        interval.validate()?;
        if n_jobs == 0 {
            return Err(QuadError::invalid("n_jobs must be at least 1"));
        }
        if n_iter == 0 {
            return Err(QuadError::invalid("n_iter must be at least 1"));
        }
        let local_n_iter = n_iter / n_jobs as u64;
        if local_n_iter == 0 {
            return Err(QuadError::invalid(format!(
                "n_iter ({n_iter}) must be at least n_jobs ({n_jobs})"
            )));
        }

        let step = interval.width() / n_jobs as f64;
        let tasks = (0..n_jobs)
            .map(|i| PartitionTask {
                job: i,
                interval: Interval::new(
                    interval.low + i as f64 * step,
                    interval.low + (i + 1) as f64 * step,
                ),
                n_iter: local_n_iter,
            })
            .collect();

        Ok(Self {
            interval,
            n_iter,
            tasks,
        })
    }

    pub fn interval(&self) -> Interval {
        self.interval
    }

    pub fn tasks(&self) -> &[PartitionTask] {
        &self.tasks
    }

    pub fn task(&self, job: usize) -> Option<&PartitionTask> {
        self.tasks.get(job)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Iterations per task after floor division.
    pub fn local_n_iter(&self) -> u64 {
        self.tasks.first().map_or(0, |t| t.n_iter)
    }

    /// Iterations actually spent across all tasks.
    pub fn used_iterations(&self) -> u64 {
        self.local_n_iter() * self.tasks.len() as u64
    }

    /// Requested iterations lost to the floor-division split.
    pub fn dropped_iterations(&self) -> u64 {
        self.n_iter - self.used_iterations()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_tiles_interval_without_gaps() {
        let plan = PartitionPlan::new(Interval::new(0.0, 1.0), 4, 1000).unwrap();
        let tasks = plan.tasks();
        assert_eq!(tasks.len(), 4);
        assert_eq!(tasks[0].interval.low, 0.0);
        assert_eq!(tasks[3].interval.high, 1.0);
        for pair in tasks.windows(2) {
            assert_eq!(pair[0].interval.high, pair[1].interval.low);
        }
        assert!(tasks.iter().all(|t| t.n_iter == 250));
        assert_eq!(plan.dropped_iterations(), 0);
    }

    #[test]
    fn remainder_iterations_are_dropped() {
        let plan = PartitionPlan::new(Interval::new(0.0, 3.0), 3, 100).unwrap();
        assert_eq!(plan.local_n_iter(), 33);
        assert_eq!(plan.used_iterations(), 99);
        assert_eq!(plan.dropped_iterations(), 1);
    }

    #[test]
    fn inverted_interval_yields_descending_tasks() {
        let plan = PartitionPlan::new(Interval::new(2.0, 0.0), 2, 10).unwrap();
        assert_eq!(plan.tasks()[0].interval, Interval::new(2.0, 1.0));
        assert_eq!(plan.tasks()[1].interval, Interval::new(1.0, 0.0));
    }

    #[test]
    fn rejects_zero_jobs_and_iterations() {
        let interval = Interval::new(0.0, 1.0);
        assert!(PartitionPlan::new(interval, 0, 10).unwrap_err().is_invalid_argument());
        assert!(PartitionPlan::new(interval, 2, 0).unwrap_err().is_invalid_argument());
    }

    #[test]
    fn rejects_fewer_iterations_than_jobs() {
        let err = PartitionPlan::new(Interval::new(0.0, 1.0), 8, 7).unwrap_err();
        assert!(err.is_invalid_argument());
        assert!(err.to_string().contains("n_iter (7)"));
    }

    #[test]
    fn rejects_non_finite_bounds() {
        let err = PartitionPlan::new(Interval::new(0.0, f64::INFINITY), 1, 1).unwrap_err();
        assert!(err.is_invalid_argument());
    }

    #[test]
    fn contains_handles_both_orientations() {
        assert!(Interval::new(0.0, 1.0).contains(0.5));
        assert!(Interval::new(1.0, 0.0).contains(0.5));
        assert!(!Interval::new(0.0, 1.0).contains(1.5));
    }
}
