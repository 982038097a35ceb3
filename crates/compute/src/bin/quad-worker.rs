//! One-shot integration worker for the isolated-process strategy.
//!
//! Reads a single length-prefixed MessagePack `WorkRequest` from stdin,
//! integrates the requested sub-interval and writes one `WorkReply` to
//! stdout, then exits. Logs go to stderr; stdout carries only the reply.

use std::io;

use anyhow::Context;
use clap::Parser;
use tracing::debug;

use quadra_core::config::DEFAULT_MAX_PAYLOAD_BYTES;

// ── CLI ─────────────────────────────────────────────────────────────

/// Integration worker spawned by the process-pool executor.
#[derive(Parser, Debug)]
#[command(name = "quad-worker", version, about)]
struct Cli {
    /// Largest request or reply frame accepted, in bytes.
    #[arg(long, env = "QUADRA_MAX_PAYLOAD_BYTES", default_value_t = DEFAULT_MAX_PAYLOAD_BYTES)]
    max_payload_bytes: usize,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();
    debug!(pid = std::process::id(), "worker started");

    let stdin = io::stdin();
    let stdout = io::stdout();
    quadra_compute::worker::serve(&mut stdin.lock(), &mut stdout.lock(), cli.max_payload_bytes)
        .context("failed to deliver reply to parent")?;
    Ok(())
}
