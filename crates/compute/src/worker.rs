//! The worker side of the isolated-process strategy.

use std::io::{Read, Write};

use quadra_core::{QuadError, QuadResult};
use tracing::{debug, warn};

use crate::executor::run_task;
use crate::wire::{self, WorkOutcome, WorkReply, WorkRequest, WIRE_VERSION};

/// Handle exactly one request: read it, integrate, write the reply.
///
/// Problems with the request itself are answered with a `Rejected` reply so
/// the parent never waits on a silent worker. An `Err` is returned only when
/// no reply could be written at all.
pub fn serve<R: Read, W: Write>(input: &mut R, output: &mut W, max_payload: usize) -> QuadResult<()> {
    let request: WorkRequest = match wire::read_frame(input, max_payload) {
        Ok(request) => request,
        Err(e) => {
            warn!(error = %e, "rejecting unreadable request");
            return wire::write_frame(output, &WorkReply::rejected(e.to_string()), max_payload);
        }
    };

    if request.version != WIRE_VERSION {
        let reason = format!(
            "unsupported wire version {} (worker speaks {WIRE_VERSION})",
            request.version
        );
        warn!(job = request.job, "{reason}");
        let reply = WorkReply::for_request(&request, WorkOutcome::Rejected { reason });
        return wire::write_frame(output, &reply, max_payload);
    }

    let reply = WorkReply::for_request(&request, compute(&request));
    wire::write_frame(output, &reply, max_payload)
}

fn compute(request: &WorkRequest) -> WorkOutcome {
    let task = request.task();
    debug!(
        job = task.job,
        low = task.interval.low,
        high = task.interval.high,
        n_iter = task.n_iter,
        integrand = %request.integrand,
        "worker integrating"
    );
    match run_task(&request.integrand, &task) {
        Ok(partial) => WorkOutcome::Partial {
            value: partial.value,
        },
        Err(QuadError::WorkerFailure { cause, .. }) => WorkOutcome::Failed { cause },
        Err(other) => WorkOutcome::Rejected {
            reason: other.to_string(),
        },
    }
}
