//! Run command handler
//!
//! Wires the rotation engine to its live collaborators (REST directory,
//! process supervisor, file status sink, webhook notifier, optional step
//! channel) and drives jobs from the job list.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Args;
use colored::*;
use tracing::warn;

use rotor_core::config::Config;
use rotor_core::domain::cycle::{CycleOutcome, CycleResult};
use rotor_core::domain::job::{JobOutcome, JobReport, JobSpec, RunMode};
use rotor_core::domain::status::JobStatus;
use rotor_directory::RestDirectoryFactory;
use rotor_engine::CancellationToken;
use rotor_engine::command::build_transfer_command;
use rotor_engine::config::{JOBS_FILE, STATUS_FILE, STEP_ACTION_FILE, STEP_STATUS_FILE, load_jobs};
use rotor_engine::engine::RotationEngine;
use rotor_engine::notify::WebhookNotifier;
use rotor_engine::status::{FileStatusSink, StatusTracker};
use rotor_engine::step::FileStepChannel;
use rotor_engine::supervise::{TransferRequest, TransferRunner, TransferSupervisor};

use crate::context::CliContext;

/// Arguments for `rotor run`
#[derive(Args)]
pub struct RunArgs {
    /// Run every job in the job list
    #[arg(long)]
    pub all: bool,

    /// Run one job by its list position (1-based)
    #[arg(long, conflicts_with = "all")]
    pub job: Option<usize>,

    /// Run a single supervised transfer under an explicit identity,
    /// without rotation
    #[arg(long, requires = "identity", conflicts_with = "all")]
    pub once: bool,

    /// Identity email for --once
    #[arg(long)]
    pub identity: Option<String>,

    /// Build and supervise the transfer without writing anything
    #[arg(long)]
    pub dry_run: bool,
}

/// Handle the run command
///
/// Selects jobs from the job list and drives them to a terminal state.
///
/// # Arguments
/// * `args` - Job selection and mode flags
/// * `context` - The CLI context
pub async fn handle_run(args: RunArgs, context: &CliContext) -> Result<()> {
    let config = context.load_config()?;
    let jobs = load_jobs(&context.data_dir().join(JOBS_FILE))?.jobs;

    if jobs.is_empty() {
        println!(
            "{}",
            "No jobs configured. Add one with `rotor jobs add`.".yellow()
        );
        return Ok(());
    }

    let mode = if args.dry_run {
        RunMode::DryRun
    } else {
        RunMode::Normal
    };

    let selected: Vec<JobSpec> = if args.all {
        jobs
    } else if let Some(position) = args.job {
        if position == 0 || position > jobs.len() {
            bail!(
                "job {} does not exist, the list has {} entries",
                position,
                jobs.len()
            );
        }
        vec![jobs[position - 1].clone()]
    } else if jobs.len() == 1 {
        jobs
    } else {
        bail!(
            "the list has {} jobs, pick one with --job <n> or run them all with --all",
            jobs.len()
        );
    };

    if args.once {
        let identity = args.identity.as_deref().context("--once needs --identity")?;
        return run_once(&config, &selected[0], identity, mode, context).await;
    }

    run_jobs(&config, &selected, mode, context).await
}

/// Run jobs through the rotation engine, one after another
async fn run_jobs(
    config: &Config,
    jobs: &[JobSpec],
    mode: RunMode,
    context: &CliContext,
) -> Result<()> {
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received, stopping after the current cycle");
                cancel.cancel();
            }
        });
    }

    let data_dir = context.data_dir();
    let mut engine = RotationEngine::new(
        config.clone(),
        Arc::new(RestDirectoryFactory),
        Arc::new(TransferSupervisor::new(config.tunnel.clone())),
        Arc::new(FileStatusSink::new(data_dir.join(STATUS_FILE))),
        WebhookNotifier::from_config(config),
    );
    if config.step_check {
        println!(
            "{}",
            "Step-check is on: answer each gate via the step action file.".yellow()
        );
        engine = engine.with_step_channel(Arc::new(FileStepChannel::new(
            data_dir.join(STEP_STATUS_FILE),
            data_dir.join(STEP_ACTION_FILE),
        )));
    }

    for job in jobs {
        println!("{} {}", "▸".cyan(), format!("Running {}", job.label()).bold());
        let report = engine.execute_job(job, mode, &cancel).await?;
        print_report(&report);

        if report.outcome == JobOutcome::Cancelled {
            break;
        }
    }

    Ok(())
}

/// Run a single supervised transfer under an explicit identity. Nothing
/// is provisioned or deleted.
async fn run_once(
    config: &Config,
    job: &JobSpec,
    identity: &str,
    mode: RunMode,
    context: &CliContext,
) -> Result<()> {
    let domain = config
        .domain(&job.domain_reference)
        .with_context(|| format!("job references unknown domain {:?}", job.domain_reference))?;

    let command = build_transfer_command(config, domain, job, identity, mode);
    let request = TransferRequest {
        command,
        identity: identity.to_string(),
        quota_gb: config.upload_limit_gb(),
        stall_timeout: Duration::from_secs(config.stall_timeout_minutes * 60),
    };

    let mode_label = if mode.is_dry_run() {
        format!("{} (dry-run)", config.transfer.command)
    } else {
        config.transfer.command.clone()
    };
    let sink = Arc::new(FileStatusSink::new(context.data_dir().join(STATUS_FILE)));
    let tracker = StatusTracker::new(sink, JobStatus::starting(&job.label(), &mode_label));
    tracker
        .update(|status| status.current_identity = identity.to_string())
        .await;

    println!(
        "{} {}",
        "▸".cyan(),
        format!("Running {} as {}", job.label(), identity).bold()
    );

    let supervisor = TransferSupervisor::new(config.tunnel.clone());
    let result = supervisor.run(request, &tracker).await?;

    let outcome = result.outcome;
    tracker
        .update(|status| {
            status.is_running = false;
            status.status_msg = format!("{:?}", outcome);
        })
        .await;

    print_cycle(&result);
    Ok(())
}

/// Print a finished job report
fn print_report(report: &JobReport) {
    println!("  Outcome:  {}", colorize_outcome(&report.outcome));
    println!("  Cycles:   {}", report.cycles_run);
    println!("  Moved:    {:.2} GB", report.total_transferred_gb);
    println!();
}

/// Print a single supervised cycle result
fn print_cycle(result: &CycleResult) {
    println!("  Outcome:  {}", colorize_cycle(&result.outcome));
    println!("  Moved:    {:.2} GB", result.transferred_gb);
    if let Some(code) = result.exit_code {
        println!("  Exit:     {}", code);
    }
    println!();
}

/// Colorize a job outcome for display
fn colorize_outcome(outcome: &JobOutcome) -> colored::ColoredString {
    let outcome_str = format!("{:?}", outcome);
    match outcome {
        JobOutcome::Succeeded => outcome_str.green(),
        JobOutcome::Exhausted => outcome_str.yellow(),
        JobOutcome::Aborted => outcome_str.red(),
        JobOutcome::Cancelled => outcome_str.dimmed(),
    }
}

/// Colorize a cycle outcome for display
fn colorize_cycle(outcome: &CycleOutcome) -> colored::ColoredString {
    let outcome_str = format!("{:?}", outcome);
    match outcome {
        CycleOutcome::Done => outcome_str.green(),
        CycleOutcome::QuotaReached => outcome_str.yellow(),
        CycleOutcome::Stalled => outcome_str.yellow(),
        CycleOutcome::Error => outcome_str.red(),
    }
}
