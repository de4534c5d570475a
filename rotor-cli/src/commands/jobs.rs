//! Job list command handlers
//!
//! Manages the job list file consumed by `rotor run`.

use anyhow::{Result, bail};
use clap::Subcommand;
use colored::*;

use rotor_core::domain::job::JobSpec;
use rotor_engine::config::{JOBS_FILE, load_jobs, save_jobs};

use crate::context::CliContext;

/// Job list subcommands
#[derive(Subcommand)]
pub enum JobCommands {
    /// Add a job to the list
    Add {
        /// Transfer source, e.g. `local:/archive`
        source: String,

        /// Transfer destination, e.g. `target:backup`
        dest: String,

        /// Directory domain the job rotates identities in
        domain: String,
    },
    /// List configured jobs
    List,
    /// Remove a job by its list position (1-based)
    Rm {
        /// List position shown by `rotor jobs list`
        index: usize,
    },
}

/// Handle job list commands
///
/// Routes job subcommands to their respective handlers.
///
/// # Arguments
/// * `command` - The job command to execute
/// * `context` - The CLI context
pub async fn handle_job_command(command: JobCommands, context: &CliContext) -> Result<()> {
    let path = context.data_dir().join(JOBS_FILE);

    match command {
        JobCommands::Add {
            source,
            dest,
            domain,
        } => {
            let config = context.load_config()?;
            if config.domain(&domain).is_none() {
                bail!("domain {domain:?} is not configured");
            }

            let mut jobs = load_jobs(&path)?;
            jobs.jobs.push(JobSpec {
                source,
                dest,
                domain_reference: domain,
            });
            save_jobs(&path, &jobs)?;

            let added = &jobs.jobs[jobs.jobs.len() - 1];
            println!(
                "{} Added job [{}] {}",
                "✓".green(),
                jobs.jobs.len(),
                added.label()
            );
            Ok(())
        }
        JobCommands::List => {
            let jobs = load_jobs(&path)?.jobs;

            if jobs.is_empty() {
                println!("{}", "No jobs configured.".yellow());
            } else {
                println!("{}", format!("Found {} job(s):", jobs.len()).bold());
                println!();
                for (position, job) in jobs.iter().enumerate() {
                    println!(
                        "  {} {} {}",
                        "▸".cyan(),
                        format!("[{}]", position + 1).dimmed(),
                        job.label()
                    );
                    println!("      Domain: {}", job.domain_reference.dimmed());
                }
            }

            Ok(())
        }
        JobCommands::Rm { index } => {
            let mut jobs = load_jobs(&path)?;

            if index == 0 || index > jobs.jobs.len() {
                bail!(
                    "job {} does not exist, the list has {} entries",
                    index,
                    jobs.jobs.len()
                );
            }

            let removed = jobs.jobs.remove(index - 1);
            save_jobs(&path, &jobs)?;

            println!("{} Removed {}", "✓".green(), removed.label());
            Ok(())
        }
    }
}
