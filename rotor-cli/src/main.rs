//! Rotor CLI
//!
//! Terminal entry point for the quota-rotation transfer engine. Parses the
//! command line, initializes logging, and dispatches to the command handlers.

mod commands;
mod context;

use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use commands::{Commands, handle_command};
use context::CliContext;

#[derive(Parser)]
#[command(name = "rotor")]
#[command(about = "Quota-rotation bulk transfer engine", long_about = None)]
struct Cli {
    /// Path to the configuration file
    #[arg(long, env = "ROTOR_CONFIG", default_value = "config.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rotor_cli=info,rotor_engine=info,rotor_directory=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let context = CliContext {
        config_path: cli.config,
    };
    handle_command(cli.command, &context).await
}
