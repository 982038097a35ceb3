use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::interval::Interval;

/// Failure raised while evaluating an integrand at a single point.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum IntegrandError {
    #[error("{reason} (x = {x})")]
    Domain { x: f64, reason: String },

    #[error("integrand returned non-finite value {value} at x = {x}")]
    NonFinite { x: f64, value: f64 },

    #[error("{0}")]
    Custom(String),
}

/// Why a single partition task did not produce a partial result.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WorkerCause {
    #[error("{0}")]
    Integrand(IntegrandError),

    #[error("worker panicked: {0}")]
    Panicked(String),

    #[error("failed to spawn worker: {0}")]
    Spawn(String),

    #[error("worker exited ({status}) without a result{}", stderr_suffix(.stderr))]
    Exited { status: String, stderr: String },

    #[error("worker pipe failed: {0}")]
    Pipe(String),
}

fn stderr_suffix(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!(": {trimmed}")
    }
}

fn job_suffix(job: &Option<usize>) -> String {
    job.map(|j| format!(" (job {j})")).unwrap_or_default()
}

#[derive(Error, Debug)]
pub enum QuadError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("integrand failed: {0}")]
    Integrand(#[from] IntegrandError),

    #[error("worker {job} failed on {interval}: {cause}")]
    WorkerFailure {
        job: usize,
        interval: Interval,
        cause: WorkerCause,
    },

    #[error("serialization failure{}: {reason}", job_suffix(.job))]
    Serialization { job: Option<usize>, reason: String },

    #[error("worker {job} timed out after {after:?}")]
    TimedOut { job: usize, after: Duration },

    #[error("worker pool error: {0}")]
    Pool(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type QuadResult<T> = Result<T, QuadError>;

impl QuadError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, Self::InvalidArgument(_))
    }

    /// Job index of the failed worker, when the failure came from one.
    pub fn failed_job(&self) -> Option<usize> {
        match self {
            Self::WorkerFailure { job, .. } | Self::TimedOut { job, .. } => Some(*job),
            Self::Serialization { job, .. } => *job,
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worker_failure_names_job_and_interval() {
        let err = QuadError::WorkerFailure {
            job: 1,
            interval: Interval::new(0.0, 0.5),
            cause: WorkerCause::Integrand(IntegrandError::Domain {
                x: -0.25,
                reason: "sqrt undefined for negative input".into(),
            }),
        };
        let text = err.to_string();
        assert!(text.contains("worker 1"));
        assert!(text.contains("[0, 0.5]"));
        assert!(text.contains("sqrt undefined"));
        assert_eq!(err.failed_job(), Some(1));
    }

    #[test]
    fn serialization_message_mentions_job_only_when_known() {
        let with_job = QuadError::Serialization {
            job: Some(3),
            reason: "truncated frame".into(),
        };
        let without_job = QuadError::Serialization {
            job: None,
            reason: "truncated frame".into(),
        };
        assert_eq!(with_job.to_string(), "serialization failure (job 3): truncated frame");
        assert_eq!(without_job.to_string(), "serialization failure: truncated frame");
    }

    #[test]
    fn exited_cause_includes_stderr_tail() {
        let cause = WorkerCause::Exited {
            status: "exit status: 101".into(),
            stderr: "boom\n".into(),
        };
        assert_eq!(cause.to_string(), "worker exited (exit status: 101) without a result: boom");
    }
}
