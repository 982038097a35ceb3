use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use futures::stream::{FuturesUnordered, StreamExt};
use quadra_core::config::{WorkerConfig, DEFAULT_MAX_PAYLOAD_BYTES};
use quadra_core::{Function, PartitionPlan, PartitionTask, QuadError, QuadResult, WorkerCause};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tracing::{debug, info_span, warn, Instrument};
use uuid::Uuid;

use super::{log_dispatch, Executor, PartialResult};
use crate::wire::{self, WorkOutcome, WorkReply, WorkRequest};

/// File name of the worker binary built by this crate.
pub const WORKER_BIN: &str = "quad-worker";

const STDERR_TAIL_BYTES: usize = 512;

/// How to launch a worker process.
///
/// The executor appends `--max-payload-bytes <N>` so both ends agree on the
/// frame limit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerCommand {
    program: PathBuf,
    args: Vec<String>,
}

impl WorkerCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Locate `quad-worker` next to the running executable, or one directory
    /// up (test binaries live in `target/<profile>/deps`).
    pub fn sibling_of_current_exe() -> QuadResult<Self> {
        let exe = std::env::current_exe()?;
        let file_name = format!("{WORKER_BIN}{}", std::env::consts::EXE_SUFFIX);
        let dir = exe
            .parent()
            .ok_or_else(|| QuadError::Config(format!("{} has no parent directory", exe.display())))?;

        let candidates = [Some(dir.join(&file_name)), dir.parent().map(|p| p.join(&file_name))];
        candidates
            .into_iter()
            .flatten()
            .find(|candidate| candidate.is_file())
            .map(Self::new)
            .ok_or_else(|| {
                QuadError::Config(format!(
                    "could not find {file_name} near {}; set QUADRA_WORKER_BIN",
                    dir.display()
                ))
            })
    }

    pub fn from_config(config: &WorkerConfig) -> QuadResult<Self> {
        match &config.binary {
            Some(path) => Ok(Self::new(path.clone())),
            None => Self::sibling_of_current_exe(),
        }
    }
}

/// Isolated-process strategy: one short-lived worker process per job.
///
/// Each call starts its own single-threaded tokio runtime to drive the
/// children, ships every task as a serialized [`WorkRequest`] and collects
/// the replies as they complete. The first failure aborts the call and the
/// remaining children are killed. Must not be called from inside an async
/// runtime.
#[derive(Debug, Clone)]
pub struct ProcessPoolExecutor {
    command: WorkerCommand,
    timeout: Option<Duration>,
    max_payload: usize,
}

impl ProcessPoolExecutor {
    pub fn new(command: WorkerCommand) -> Self {
        Self {
            command,
            timeout: None,
            max_payload: DEFAULT_MAX_PAYLOAD_BYTES,
        }
    }

    pub fn from_config(config: &WorkerConfig) -> QuadResult<Self> {
        let mut executor = Self::new(WorkerCommand::from_config(config)?)
            .with_max_payload(config.max_payload_bytes);
        executor.timeout = config.timeout()?;
        Ok(executor)
    }

    /// Fail the whole call if any single worker runs longer than `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_max_payload(mut self, max_payload: usize) -> Self {
        self.max_payload = max_payload;
        self
    }

    pub fn command(&self) -> &WorkerCommand {
        &self.command
    }

    async fn run_batch(
        &self,
        batch_id: Uuid,
        requests: Vec<(PartitionTask, Vec<u8>)>,
    ) -> QuadResult<Vec<PartialResult>> {
        let mut pending: FuturesUnordered<_> = requests
            .into_iter()
            .map(|(task, frame)| self.run_worker(batch_id, task, frame))
            .collect();

        let mut partials = Vec::with_capacity(pending.len());
        while let Some(outcome) = pending.next().await {
            match outcome {
                Ok(partial) => partials.push(partial),
                Err(e) => {
                    debug!(in_flight = pending.len(), "aborting batch, killing remaining workers");
                    return Err(e);
                }
            }
        }
        Ok(partials)
    }

    async fn run_worker(
        &self,
        batch_id: Uuid,
        task: PartitionTask,
        frame: Vec<u8>,
    ) -> QuadResult<PartialResult> {
        log_dispatch("isolated_process", &task);

        let mut child = Command::new(&self.command.program)
            .args(&self.command.args)
            .arg("--max-payload-bytes")
            .arg(self.max_payload.to_string())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| QuadError::WorkerFailure {
                job: task.job,
                interval: task.interval,
                cause: WorkerCause::Spawn(format!("{}: {e}", self.command.program.display())),
            })?;

        let stdin = child.stdin.take();
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let max_payload = self.max_payload;

        // Returning early drops `child`, which kills it.
        let exchange = async move {
            let feed = async move {
                if let Some(mut stdin) = stdin {
                    // A worker that dies before reading still gets reported below.
                    if let Err(e) = stdin.write_all(&frame).await {
                        debug!(job = task.job, error = %e, "worker closed stdin early");
                    }
                }
                Ok::<_, QuadError>(())
            };
            let reply = async move {
                match stdout {
                    Some(out) => read_reply(out, max_payload)
                        .await
                        .map_err(|e| wire::with_job(e, task.job)),
                    None => Ok(Vec::new()),
                }
            };
            let tail = async move {
                Ok::<_, QuadError>(match stderr {
                    Some(err) => read_tail(err).await,
                    None => Vec::new(),
                })
            };
            let ((), stdout, stderr) = tokio::try_join!(feed, reply, tail)?;
            let status = child.wait().await?;
            Ok::<_, QuadError>((status, stdout, stderr))
        };

        let outcome = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, exchange)
                .await
                .map_err(|_| QuadError::TimedOut {
                    job: task.job,
                    after: limit,
                })?,
            None => exchange.await,
        };
        let (status, stdout, stderr) = outcome.map_err(|e| pipe_failure(&task, e))?;

        self.interpret(batch_id, &task, status, &stdout, &stderr)
    }

    fn interpret(
        &self,
        batch_id: Uuid,
        task: &PartitionTask,
        status: ExitStatus,
        stdout: &[u8],
        stderr: &[u8],
    ) -> QuadResult<PartialResult> {
        let failure = |cause| QuadError::WorkerFailure {
            job: task.job,
            interval: task.interval,
            cause,
        };

        if stdout.is_empty() {
            return Err(failure(WorkerCause::Exited {
                status: status.to_string(),
                stderr: stderr_tail(stderr),
            }));
        }

        let reply: WorkReply = wire::decode_frame(stdout, self.max_payload)
            .map_err(|e| wire::with_job(e, task.job))?;

        match reply.outcome {
            WorkOutcome::Rejected { reason } => Err(QuadError::Serialization {
                job: Some(task.job),
                reason: format!("worker rejected request: {reason}"),
            }),
            _ if reply.version != wire::WIRE_VERSION
                || reply.batch_id != batch_id
                || reply.job != task.job =>
            {
                Err(QuadError::Serialization {
                    job: Some(task.job),
                    reason: format!(
                        "reply v{} for batch {} job {} does not match request",
                        reply.version, reply.batch_id, reply.job
                    ),
                })
            }
            WorkOutcome::Partial { value } => {
                if !status.success() {
                    warn!(job = task.job, status = %status, "worker replied but exited abnormally");
                }
                Ok(PartialResult::for_task(task, value))
            }
            WorkOutcome::Failed { cause } => Err(failure(cause)),
        }
    }
}

/// Read a worker's stdout, giving up once it exceeds one full frame.
async fn read_reply<R: AsyncRead + Unpin>(stdout: R, max_payload: usize) -> QuadResult<Vec<u8>> {
    let limit = wire::LEN_PREFIX + max_payload;
    let mut buf = Vec::new();
    stdout.take(limit as u64 + 1).read_to_end(&mut buf).await?;
    if buf.len() > limit {
        return Err(QuadError::Serialization {
            job: None,
            reason: format!("worker wrote more than {limit} bytes to stdout"),
        });
    }
    Ok(buf)
}

/// Drain a worker's stderr, keeping only the last `STDERR_TAIL_BYTES`.
async fn read_tail<R: AsyncRead + Unpin>(mut stderr: R) -> Vec<u8> {
    let mut tail = Vec::with_capacity(STDERR_TAIL_BYTES);
    let mut chunk = [0u8; 4096];
    loop {
        match stderr.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                tail.extend_from_slice(&chunk[..n]);
                if tail.len() > STDERR_TAIL_BYTES {
                    tail.drain(..tail.len() - STDERR_TAIL_BYTES);
                }
            }
        }
    }
    tail
}

/// Attach the task to errors raised while talking to its worker.
fn pipe_failure(task: &PartitionTask, err: QuadError) -> QuadError {
    match err {
        QuadError::Io(e) => QuadError::WorkerFailure {
            job: task.job,
            interval: task.interval,
            cause: WorkerCause::Pipe(e.to_string()),
        },
        other => wire::with_job(other, task.job),
    }
}

fn stderr_tail(stderr: &[u8]) -> String {
    let start = stderr.len().saturating_sub(STDERR_TAIL_BYTES);
    String::from_utf8_lossy(&stderr[start..]).into_owned()
}

impl Executor<Function> for ProcessPoolExecutor {
    fn name(&self) -> &'static str {
        "isolated_process"
    }

    fn execute(&self, integrand: &Function, plan: &PartitionPlan) -> QuadResult<Vec<PartialResult>> {
        let batch_id = Uuid::new_v4();

        // Serialize everything first so an oversized request fails before any
        // process is started.
        let requests = plan
            .tasks()
            .iter()
            .map(|task| {
                let request = WorkRequest::new(batch_id, task, integrand);
                wire::encode_frame(&request, self.max_payload)
                    .map(|frame| (*task, frame))
                    .map_err(|e| wire::with_job(e, task.job))
            })
            .collect::<QuadResult<Vec<_>>>()?;

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| QuadError::Pool(format!("failed to start process runtime: {e}")))?;

        let span = info_span!("process_batch", batch = %batch_id, n_jobs = plan.len());
        runtime.block_on(self.run_batch(batch_id, requests).instrument(span))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stderr_tail_keeps_the_end() {
        let long = "a".repeat(1000) + "the end";
        let tail = stderr_tail(long.as_bytes());
        assert_eq!(tail.len(), STDERR_TAIL_BYTES);
        assert!(tail.ends_with("the end"));
        assert_eq!(stderr_tail(b"short"), "short");
    }

    #[test]
    fn from_config_prefers_explicit_binary() {
        let config = WorkerConfig {
            binary: Some(PathBuf::from("/opt/quadra/quad-worker")),
            timeout_secs: Some(2.0),
            max_payload_bytes: 4096,
        };
        let executor = ProcessPoolExecutor::from_config(&config).unwrap();
        assert_eq!(executor.command().program(), Path::new("/opt/quadra/quad-worker"));
        assert_eq!(executor.timeout, Some(Duration::from_secs(2)));
        assert_eq!(executor.max_payload, 4096);
    }

    #[test]
    fn oversized_request_fails_before_spawning() {
        let executor = ProcessPoolExecutor::new(WorkerCommand::new("/nonexistent/quad-worker"))
            .with_max_payload(64);
        let plan = PartitionPlan::new(quadra_core::Interval::new(0.0, 1.0), 2, 10).unwrap();
        let big = Function::polynomial(vec![0.5; 100]);
        let err = executor.execute(&big, &plan).unwrap_err();
        assert!(matches!(err, QuadError::Serialization { job: Some(0), .. }));
    }

    #[test]
    fn missing_binary_is_a_spawn_failure() {
        let executor = ProcessPoolExecutor::new(WorkerCommand::new("/nonexistent/quad-worker"));
        let plan = PartitionPlan::new(quadra_core::Interval::new(0.0, 1.0), 1, 10).unwrap();
        match executor.execute(&Function::Sin, &plan).unwrap_err() {
            QuadError::WorkerFailure {
                job: 0,
                cause: WorkerCause::Spawn(msg),
                ..
            } => assert!(msg.contains("/nonexistent/quad-worker")),
            other => panic!("unexpected error: {other}"),
        }
    }

    fn block_on<F: std::future::Future>(future: F) -> F::Output {
        tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap()
            .block_on(future)
    }

    #[test]
    fn reply_reader_stops_past_one_frame() {
        let exact = vec![7u8; wire::LEN_PREFIX + 16];
        assert_eq!(block_on(read_reply(&exact[..], 16)).unwrap(), exact);

        let endless = vec![0u8; 1 << 20];
        let err = block_on(read_reply(&endless[..], 16)).unwrap_err();
        match err {
            QuadError::Serialization { job: None, reason } => {
                assert!(reason.contains("more than 20 bytes"), "{reason}")
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn tail_reader_keeps_only_the_end() {
        let noisy = "x".repeat(10 * STDERR_TAIL_BYTES) + "last words";
        let tail = block_on(read_tail(noisy.as_bytes()));
        assert_eq!(tail.len(), STDERR_TAIL_BYTES);
        assert!(tail.ends_with(b"last words"));
    }

    #[test]
    fn pipe_errors_name_the_task() {
        let task = PartitionTask {
            job: 3,
            interval: quadra_core::Interval::new(0.75, 1.0),
            n_iter: 10,
        };
        let err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "gone");
        match pipe_failure(&task, QuadError::Io(err)) {
            QuadError::WorkerFailure {
                job: 3,
                interval,
                cause: WorkerCause::Pipe(msg),
            } => {
                assert_eq!(interval, task.interval);
                assert!(msg.contains("gone"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn from_config_rejects_unrepresentable_timeout() {
        let config = WorkerConfig {
            binary: Some(PathBuf::from("/opt/quadra/quad-worker")),
            timeout_secs: Some(1e30),
            ..WorkerConfig::default()
        };
        let err = ProcessPoolExecutor::from_config(&config).unwrap_err();
        assert!(matches!(err, QuadError::Config(_)), "{err}");
    }
}
