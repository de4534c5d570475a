//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod check;
mod config;
mod identities;
mod jobs;
mod run;
mod status;

pub use config::ConfigCommands;
pub use identities::IdentityCommands;
pub use jobs::JobCommands;
pub use run::RunArgs;

use anyhow::Result;
use clap::Subcommand;

use crate::context::CliContext;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Run transfer jobs
    Run(RunArgs),
    /// Job list management
    Jobs {
        #[command(subcommand)]
        command: JobCommands,
    },
    /// Show the published job status
    Status {
        /// Keep refreshing until interrupted
        #[arg(long)]
        watch: bool,
    },
    /// Manual identity operations
    Identities {
        #[command(subcommand)]
        command: IdentityCommands,
    },
    /// Validate the configured domains against the directory
    Check,
    /// Configuration file management
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

/// Handle a CLI command
///
/// Routes the command to the appropriate handler module.
///
/// # Arguments
/// * `command` - The command to execute
/// * `context` - The CLI context
///
/// # Returns
/// Result indicating success or failure
pub async fn handle_command(command: Commands, context: &CliContext) -> Result<()> {
    match command {
        Commands::Run(args) => run::handle_run(args, context).await,
        Commands::Jobs { command } => jobs::handle_job_command(command, context).await,
        Commands::Status { watch } => status::handle_status(watch, context).await,
        Commands::Identities { command } => {
            identities::handle_identity_command(command, context).await
        }
        Commands::Check => check::handle_check(context).await,
        Commands::Config { command } => config::handle_config_command(command, context).await,
    }
}
