//! Transfer process supervision
//!
//! Spawns the built transfer command, feeds its output through the stats
//! parser into the status tracker, enforces the stall window, and
//! classifies the exit into a [`CycleOutcome`].
//!
//! Classification contract:
//! - the tool's quota sentinel exit code always means the quota is spent
//! - a clean exit close to the quota also counts as quota spent, since
//!   the tool stops on its own once the limit interrupts the payload
//! - a clean exit in detached mode is treated as quota spent too; with
//!   no observable output there is no way to tell a finished payload
//!   from an interrupted one, and rotating again is the safe reading
//! - anything else is an error

use std::process::Stdio;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::time::Instant;
use tracing::{info, warn};

use rotor_core::config::TunnelConfig;
use rotor_core::domain::cycle::{CycleOutcome, CycleResult};
use rotor_core::size::round2;

use crate::command::{build_probe_command, CaptureMode, CommandSpec, PROBE_TOKEN};
use crate::progress::parse_stats_line;
use crate::status::StatusTracker;

/// Exit code the transfer tool reserves for a hit upload limit.
pub const QUOTA_SENTINEL_EXIT: i32 = 8;

/// Fraction of the quota past which a clean exit is read as quota spent.
pub const QUOTA_COMPLETION_FRACTION: f64 = 0.9;

/// Everything the supervisor needs for one cycle.
#[derive(Debug, Clone)]
pub struct TransferRequest {
    pub command: CommandSpec,
    /// Identity driving this cycle, for logging and status.
    pub identity: String,
    /// Per-identity quota in gigabytes.
    pub quota_gb: f64,
    /// Silence window after which the run is declared stalled.
    pub stall_timeout: Duration,
}

/// Runs one supervised transfer cycle.
#[async_trait]
pub trait TransferRunner: Send + Sync {
    async fn run(&self, request: TransferRequest, tracker: &StatusTracker) -> Result<CycleResult>;
}

/// Standard runner: a real child process under stall supervision.
pub struct TransferSupervisor {
    tunnel: TunnelConfig,
}

impl TransferSupervisor {
    pub fn new(tunnel: TunnelConfig) -> Self {
        Self { tunnel }
    }

    /// Checks the tunnel endpoint answers before a transfer is attempted.
    async fn probe_tunnel(&self) -> Result<()> {
        let argv = build_probe_command(&self.tunnel);
        let wait = Duration::from_secs(self.tunnel.connect_timeout_secs + 5);

        let output = tokio::time::timeout(
            wait,
            Command::new(&argv[0])
                .args(&argv[1..])
                .stdin(Stdio::null())
                .output(),
        )
        .await
        .context("tunnel probe timed out")?
        .context("failed to run tunnel probe")?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        if !output.status.success() || !stdout.contains(PROBE_TOKEN) {
            anyhow::bail!(
                "tunnel endpoint {} did not answer the probe (exit {:?})",
                self.tunnel.host,
                output.status.code()
            );
        }
        Ok(())
    }

    async fn run_piped(
        &self,
        request: &TransferRequest,
        tracker: &StatusTracker,
    ) -> Result<CycleResult> {
        let argv = &request.command.argv;
        let mut child = Command::new(&argv[0])
            .args(&argv[1..])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("failed to spawn transfer tool {:?}", argv[0]))?;

        let stdout = child.stdout.take().context("transfer stdout not piped")?;
        let stderr = child.stderr.take().context("transfer stderr not piped")?;
        let mut out_lines = BufReader::new(stdout).lines();
        let mut err_lines = BufReader::new(stderr).lines();

        // Stats lines add to whatever earlier cycles already moved.
        let base_gb = tracker.snapshot().total_transferred_gb;
        let mut cycle_gb: f64 = 0.0;
        let mut out_open = true;
        let mut err_open = true;

        let deadline = tokio::time::sleep(request.stall_timeout);
        tokio::pin!(deadline);

        // The tool writes stats to stderr and payload listings to stdout;
        // both feed the parser, both count as signs of life.
        while out_open || err_open {
            tokio::select! {
                line = out_lines.next_line(), if out_open => match line {
                    Ok(Some(line)) => {
                        if !line.trim().is_empty() {
                            deadline.as_mut().reset(Instant::now() + request.stall_timeout);
                        }
                        ingest_line(&line, base_gb, &mut cycle_gb, tracker).await;
                    }
                    Ok(None) => out_open = false,
                    Err(e) => {
                        warn!("error reading transfer stdout: {e}");
                        out_open = false;
                    }
                },
                line = err_lines.next_line(), if err_open => match line {
                    Ok(Some(line)) => {
                        if !line.trim().is_empty() {
                            deadline.as_mut().reset(Instant::now() + request.stall_timeout);
                        }
                        ingest_line(&line, base_gb, &mut cycle_gb, tracker).await;
                    }
                    Ok(None) => err_open = false,
                    Err(e) => {
                        warn!("error reading transfer stderr: {e}");
                        err_open = false;
                    }
                },
                _ = &mut deadline => {
                    warn!(
                        identity = %request.identity,
                        "transfer silent past the stall window, killing it"
                    );
                    if let Err(e) = child.kill().await {
                        warn!("failed to kill stalled transfer: {e}");
                    }
                    return Ok(CycleResult::new(CycleOutcome::Stalled, cycle_gb, None));
                }
            }
        }

        // Both pipes hit EOF; the final stats line is already accounted.
        let status = child.wait().await.context("failed to wait for transfer tool")?;
        let outcome = classify(status.code(), cycle_gb, request.quota_gb, CaptureMode::Piped);
        info!(
            identity = %request.identity,
            exit = ?status.code(),
            moved_gb = cycle_gb,
            "transfer cycle finished"
        );
        Ok(CycleResult::new(outcome, cycle_gb, status.code()))
    }

    async fn run_detached(
        &self,
        request: &TransferRequest,
        tracker: &StatusTracker,
    ) -> Result<CycleResult> {
        let argv = &request.command.argv;
        let mut child = Command::new(&argv[0])
            .args(&argv[1..])
            .stdin(Stdio::null())
            .spawn()
            .with_context(|| format!("failed to spawn transfer tool {:?}", argv[0]))?;

        if let Some(session) = &request.command.session {
            info!(session, "transfer running in a remote session");
        }

        // No output to watch, so no stall detection; just heartbeat the
        // status until the remote session ends.
        let started = Instant::now();
        let mut ticker = tokio::time::interval(Duration::from_secs(1));
        loop {
            tokio::select! {
                status = child.wait() => {
                    let status = status.context("failed to wait for transfer tool")?;
                    let outcome =
                        classify(status.code(), 0.0, request.quota_gb, CaptureMode::Detached);
                    info!(
                        identity = %request.identity,
                        exit = ?status.code(),
                        "detached transfer cycle finished"
                    );
                    return Ok(CycleResult::new(outcome, 0.0, status.code()));
                }
                _ = ticker.tick() => {
                    let elapsed = started.elapsed().as_secs();
                    tracker
                        .update(move |s| {
                            s.status_msg = format!("Running in remote session ({elapsed}s)");
                        })
                        .await;
                }
            }
        }
    }
}

#[async_trait]
impl TransferRunner for TransferSupervisor {
    async fn run(&self, request: TransferRequest, tracker: &StatusTracker) -> Result<CycleResult> {
        if self.tunnel.enabled && self.tunnel.preflight_check {
            if let Err(e) = self.probe_tunnel().await {
                warn!("tunnel preflight failed: {e:#}");
                return Ok(CycleResult::new(CycleOutcome::Error, 0.0, None));
            }
        }

        match request.command.capture {
            CaptureMode::Piped => self.run_piped(&request, tracker).await,
            CaptureMode::Detached => self.run_detached(&request, tracker).await,
        }
    }
}

/// Feeds one output line into the cycle total and the status tracker.
async fn ingest_line(line: &str, base_gb: f64, cycle_gb: &mut f64, tracker: &StatusTracker) {
    let Some(reading) = parse_stats_line(line) else {
        return;
    };
    if let Some(gb) = reading.transferred_gb {
        *cycle_gb = gb;
    }
    let total = round2(base_gb + *cycle_gb);
    tracker
        .update(move |s| {
            if let Some(speed) = reading.speed {
                s.speed = speed;
            }
            if let Some(progress) = reading.progress {
                s.progress = progress;
            }
            s.status_msg = "Transferring".to_string();
            s.total_transferred_gb = total;
        })
        .await;
}

/// Maps an exit into a cycle outcome.
fn classify(exit_code: Option<i32>, cycle_gb: f64, quota_gb: f64, capture: CaptureMode) -> CycleOutcome {
    match exit_code {
        Some(QUOTA_SENTINEL_EXIT) => CycleOutcome::QuotaReached,
        Some(0) => match capture {
            CaptureMode::Detached => CycleOutcome::QuotaReached,
            CaptureMode::Piped => {
                if quota_gb > 0.0 && cycle_gb >= QUOTA_COMPLETION_FRACTION * quota_gb {
                    CycleOutcome::QuotaReached
                } else {
                    CycleOutcome::Done
                }
            }
        },
        _ => CycleOutcome::Error,
    }
}
