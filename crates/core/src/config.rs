use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::QuadError;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_parse<T: FromStr>(profile: &str, key: &str, default: T) -> T {
    profiled_env_opt(profile, key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

pub const DEFAULT_JOBS: usize = 4;
pub const DEFAULT_ITERATIONS: u64 = 100_000;
pub const DEFAULT_MAX_PAYLOAD_BYTES: usize = 1024 * 1024;

/// Which executor backs a partitioned integration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// Worker threads sharing the caller's memory.
    #[default]
    SharedMemory,
    /// One child process per task, inputs and results serialized.
    IsolatedProcess,
}

impl StrategyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SharedMemory => "shared_memory",
            Self::IsolatedProcess => "isolated_process",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyKind {
    type Err = QuadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "shared_memory" | "threads" | "thread" => Ok(Self::SharedMemory),
            "isolated_process" | "processes" | "process" => Ok(Self::IsolatedProcess),
            other => Err(QuadError::Config(format!(
                "unknown strategy '{other}', expected 'shared_memory' or 'isolated_process'"
            ))),
        }
    }
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub executor: ExecutorConfig,
    pub worker: WorkerConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `QUADRA_PROFILE`. When set (e.g. `BENCH`), every
    /// key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_or("QUADRA_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            executor: ExecutorConfig::from_env_profiled(p),
            worker: WorkerConfig::from_env_profiled(p),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Print a summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!(
            "  executor:  jobs={}, iterations={}, strategy={}",
            self.executor.jobs,
            self.executor.iterations,
            self.executor.strategy
        );
        tracing::info!(
            "  worker:    binary={}, timeout={}, max_payload={}B",
            self.worker
                .binary
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "(sibling quad-worker)".to_string()),
            self.worker
                .timeout_secs
                .map(|t| format!("{t}s"))
                .unwrap_or_else(|| "none".to_string()),
            self.worker.max_payload_bytes
        );
    }
}

// ── Executor ──────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    pub jobs: usize,
    pub iterations: u64,
    pub strategy: StrategyKind,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            jobs: DEFAULT_JOBS,
            iterations: DEFAULT_ITERATIONS,
            strategy: StrategyKind::default(),
        }
    }
}

impl ExecutorConfig {
    fn from_env_profiled(p: &str) -> Self {
        let strategy = match profiled_env_opt(p, "QUADRA_STRATEGY") {
            Some(raw) => raw.parse().unwrap_or_else(|e| {
                tracing::warn!(error = %e, "ignoring QUADRA_STRATEGY");
                StrategyKind::default()
            }),
            None => StrategyKind::default(),
        };
        Self {
            jobs: profiled_env_parse(p, "QUADRA_JOBS", DEFAULT_JOBS),
            iterations: profiled_env_parse(p, "QUADRA_ITERATIONS", DEFAULT_ITERATIONS),
            strategy,
        }
    }
}

// ── Worker processes ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Path to the `quad-worker` executable. `None` = next to the current binary.
    pub binary: Option<PathBuf>,
    /// Per-worker wall-clock limit in seconds. `None` = wait indefinitely.
    pub timeout_secs: Option<f64>,
    /// Upper bound on a single request or reply frame.
    pub max_payload_bytes: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            binary: None,
            timeout_secs: None,
            max_payload_bytes: DEFAULT_MAX_PAYLOAD_BYTES,
        }
    }
}

impl WorkerConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            binary: profiled_env_opt(p, "QUADRA_WORKER_BIN").map(PathBuf::from),
            timeout_secs: profiled_env_opt(p, "QUADRA_WORKER_TIMEOUT_SECS").and_then(|raw| {
                let secs = raw.trim().parse::<f64>().ok();
                if secs.is_some_and(|s| Duration::try_from_secs_f64(s).is_ok_and(|d| !d.is_zero())) {
                    secs
                } else {
                    tracing::warn!(value = %raw, "ignoring QUADRA_WORKER_TIMEOUT_SECS");
                    None
                }
            }),
            max_payload_bytes: profiled_env_parse(
                p,
                "QUADRA_MAX_PAYLOAD_BYTES",
                DEFAULT_MAX_PAYLOAD_BYTES,
            ),
        }
    }

    /// Per-worker limit as a `Duration`. Values that are not positive or do
    /// not fit a `Duration` are a config error.
    pub fn timeout(&self) -> Result<Option<Duration>, QuadError> {
        let Some(secs) = self.timeout_secs else {
            return Ok(None);
        };
        match Duration::try_from_secs_f64(secs) {
            Ok(limit) if !limit.is_zero() => Ok(Some(limit)),
            Ok(_) => Err(QuadError::Config(format!(
                "worker timeout must be positive, got {secs}s"
            ))),
            Err(e) => Err(QuadError::Config(format!("invalid worker timeout {secs}s: {e}"))),
        }
    }
}
