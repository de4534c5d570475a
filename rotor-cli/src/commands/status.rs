//! Status command handler
//!
//! Reads the published status snapshot and renders it.

use std::io::ErrorKind;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use colored::*;

use rotor_core::domain::status::JobStatus;
use rotor_engine::config::STATUS_FILE;

use crate::context::CliContext;

/// Handle the status command
///
/// Prints the last published snapshot, or keeps refreshing it when
/// `--watch` is given.
///
/// # Arguments
/// * `watch` - Refresh every two seconds instead of printing once
/// * `context` - The CLI context
pub async fn handle_status(watch: bool, context: &CliContext) -> Result<()> {
    let path = context.data_dir().join(STATUS_FILE);

    loop {
        match read_status(&path)? {
            Some(status) => print_status(&status),
            None => println!("{}", "No status published yet.".yellow()),
        }

        if !watch {
            return Ok(());
        }

        tokio::time::sleep(Duration::from_secs(2)).await;
        println!();
    }
}

/// Read the snapshot file, `None` when it has not been written yet
fn read_status(path: &Path) -> Result<Option<JobStatus>> {
    let body = match std::fs::read_to_string(path) {
        Ok(body) => body,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(e).with_context(|| format!("failed to read {}", path.display()));
        }
    };

    let status = serde_json::from_str(&body)
        .with_context(|| format!("failed to parse {}", path.display()))?;
    Ok(Some(status))
}

/// Print a status snapshot
fn print_status(status: &JobStatus) {
    println!("{}", "Job Status:".bold());
    println!("  Job:       {}", status.job_label.cyan());
    println!("  Mode:      {}", status.mode);
    println!("  State:     {}", colorize_state(status));

    if !status.current_identity.is_empty() {
        println!("  Identity:  {}", status.current_identity);
    }
    if !status.speed.is_empty() {
        println!("  Speed:     {}", status.speed);
    }
    if !status.progress.is_empty() {
        println!("  Progress:  {}", status.progress);
    }

    println!("  Moved:     {:.2} GB", status.total_transferred_gb);
    println!(
        "  Updated:   {}",
        status
            .last_updated
            .format("%Y-%m-%d %H:%M:%S")
            .to_string()
            .dimmed()
    );
}

/// Colorize the state line for display
fn colorize_state(status: &JobStatus) -> colored::ColoredString {
    if status.is_running {
        status.status_msg.cyan()
    } else if status.status_msg.starts_with("Completed") {
        status.status_msg.green()
    } else if status.status_msg.starts_with("Failed") || status.status_msg.starts_with("Aborted") {
        status.status_msg.red()
    } else {
        status.status_msg.yellow()
    }
}
