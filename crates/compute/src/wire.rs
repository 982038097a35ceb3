//! Frames exchanged with `quad-worker` processes.
//!
//! A frame is a 4-byte big-endian payload length followed by a MessagePack
//! payload. Each worker reads exactly one [`WorkRequest`] from stdin and
//! writes exactly one [`WorkReply`] to stdout.

use std::io::{self, Read, Write};

use quadra_core::{Function, Interval, PartitionTask, QuadError, QuadResult, WorkerCause};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Bumped whenever the request or reply layout changes.
pub const WIRE_VERSION: u16 = 1;

/// Bytes in the big-endian length prefix of every frame.
pub const LEN_PREFIX: usize = 4;

/// One partition task shipped to a worker process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkRequest {
    pub version: u16,
    /// Identifies the integration call; echoed back in the reply.
    pub batch_id: Uuid,
    pub job: usize,
    pub interval: Interval,
    pub n_iter: u64,
    pub integrand: Function,
}

impl WorkRequest {
    pub fn new(batch_id: Uuid, task: &PartitionTask, integrand: &Function) -> Self {
        Self {
            version: WIRE_VERSION,
            batch_id,
            job: task.job,
            interval: task.interval,
            n_iter: task.n_iter,
            integrand: integrand.clone(),
        }
    }

    pub fn task(&self) -> PartitionTask {
        PartitionTask {
            job: self.job,
            interval: self.interval,
            n_iter: self.n_iter,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkOutcome {
    Partial { value: f64 },
    Failed { cause: WorkerCause },
    /// The worker could not accept the request (undecodable, wrong version).
    Rejected { reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkReply {
    pub version: u16,
    pub batch_id: Uuid,
    pub job: usize,
    pub outcome: WorkOutcome,
}

impl WorkReply {
    pub fn for_request(request: &WorkRequest, outcome: WorkOutcome) -> Self {
        Self {
            version: WIRE_VERSION,
            batch_id: request.batch_id,
            job: request.job,
            outcome,
        }
    }

    /// Reply sent when the request itself could not be understood.
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self {
            version: WIRE_VERSION,
            batch_id: Uuid::nil(),
            job: 0,
            outcome: WorkOutcome::Rejected {
                reason: reason.into(),
            },
        }
    }
}

fn serialization(reason: impl Into<String>) -> QuadError {
    QuadError::Serialization {
        job: None,
        reason: reason.into(),
    }
}

/// Attach a job index to a serialization error that lacks one.
pub fn with_job(err: QuadError, job: usize) -> QuadError {
    match err {
        QuadError::Serialization { job: None, reason } => QuadError::Serialization {
            job: Some(job),
            reason,
        },
        other => other,
    }
}

fn check_len(len: usize, max_payload: usize) -> QuadResult<()> {
    if len > max_payload {
        return Err(serialization(format!(
            "payload of {len} bytes exceeds limit of {max_payload} bytes"
        )));
    }
    Ok(())
}

/// Serialize `message` into a length-prefixed frame.
pub fn encode_frame<T: Serialize>(message: &T, max_payload: usize) -> QuadResult<Vec<u8>> {
    let payload = rmp_serde::to_vec_named(message)
        .map_err(|e| serialization(format!("encode failed: {e}")))?;
    check_len(payload.len(), max_payload)?;
    let len = u32::try_from(payload.len())
        .map_err(|_| serialization("payload length does not fit in a u32 prefix"))?;

    let mut frame = Vec::with_capacity(LEN_PREFIX + payload.len());
    frame.extend_from_slice(&len.to_be_bytes());
    frame.extend_from_slice(&payload);
    Ok(frame)
}

/// Decode a buffer holding exactly one frame.
pub fn decode_frame<T: DeserializeOwned>(bytes: &[u8], max_payload: usize) -> QuadResult<T> {
    if bytes.len() < LEN_PREFIX {
        return Err(serialization(format!(
            "frame truncated: {} bytes, need at least {LEN_PREFIX}",
            bytes.len()
        )));
    }
    let (prefix, payload) = bytes.split_at(LEN_PREFIX);
    let len = u32::from_be_bytes([prefix[0], prefix[1], prefix[2], prefix[3]]) as usize;
    check_len(len, max_payload)?;
    if payload.len() != len {
        return Err(serialization(format!(
            "frame declares {len} payload bytes but {} were received",
            payload.len()
        )));
    }
    decode_payload(payload)
}

fn decode_payload<T: DeserializeOwned>(payload: &[u8]) -> QuadResult<T> {
    rmp_serde::from_slice(payload).map_err(|e| serialization(format!("decode failed: {e}")))
}

/// Read one frame from a stream.
pub fn read_frame<R: Read, T: DeserializeOwned>(reader: &mut R, max_payload: usize) -> QuadResult<T> {
    let mut prefix = [0u8; LEN_PREFIX];
    reader.read_exact(&mut prefix).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => serialization("stream closed before a frame arrived"),
        _ => QuadError::Io(e),
    })?;
    let len = u32::from_be_bytes(prefix) as usize;
    check_len(len, max_payload)?;

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => {
            serialization(format!("stream closed inside a {len}-byte frame"))
        }
        _ => QuadError::Io(e),
    })?;
    decode_payload(&payload)
}

/// Write one frame to a stream and flush it.
pub fn write_frame<W: Write, T: Serialize>(
    writer: &mut W,
    message: &T,
    max_payload: usize,
) -> QuadResult<()> {
    let frame = encode_frame(message, max_payload)?;
    writer.write_all(&frame)?;
    writer.flush()?;
    Ok(())
}
