//! Identity command handlers
//!
//! Manual directory operations outside a transfer run: minting,
//! inspecting, and retiring identities by hand.

use std::sync::Arc;

use anyhow::Result;
use clap::Subcommand;
use colored::*;

use rotor_directory::{DirectoryFactory, DirectoryProvider, RestDirectoryFactory};
use rotor_engine::lifecycle::IdentityManager;

use crate::context::{CliContext, resolve_domain};

/// Identity subcommands
#[derive(Subcommand)]
pub enum IdentityCommands {
    /// Create fresh identities and grant them upload rights
    Create {
        /// Directory domain to act on
        #[arg(long)]
        domain: Option<String>,

        /// How many identities to create
        #[arg(long, default_value_t = 1)]
        count: u32,

        /// Delete each identity right after creating it, as a
        /// lifecycle smoke test
        #[arg(long)]
        cycle: bool,
    },
    /// List identities in the domain
    List {
        /// Directory domain to act on
        #[arg(long)]
        domain: Option<String>,
    },
    /// Delete an identity; protected identities are refused
    Delete {
        /// Identity email
        email: String,

        /// Directory domain to act on
        #[arg(long)]
        domain: Option<String>,
    },
    /// Check whether an identity exists
    Exists {
        /// Identity email
        email: String,

        /// Directory domain to act on
        #[arg(long)]
        domain: Option<String>,
    },
    /// Suspend an identity
    Suspend {
        /// Identity email
        email: String,

        /// Directory domain to act on
        #[arg(long)]
        domain: Option<String>,
    },
    /// Reinstate a suspended identity
    Unsuspend {
        /// Identity email
        email: String,

        /// Directory domain to act on
        #[arg(long)]
        domain: Option<String>,
    },
}

/// Handle identity commands
///
/// Routes identity subcommands to their respective handlers.
///
/// # Arguments
/// * `command` - The identity command to execute
/// * `context` - The CLI context
pub async fn handle_identity_command(command: IdentityCommands, context: &CliContext) -> Result<()> {
    let config = context.load_config()?;

    match command {
        IdentityCommands::Create {
            domain,
            count,
            cycle,
        } => {
            let domain = resolve_domain(&config, domain.as_deref())?;
            let provider = RestDirectoryFactory.open(domain).await?;
            let manager = IdentityManager::new(provider, &config, domain);

            for _ in 0..count {
                let identity = manager.provision().await?;
                println!("{} {}", "✓".green(), identity.email.bold());
                println!("    Password: {}", identity.password.dimmed());

                if cycle {
                    manager.release(&identity.email).await?;
                    println!("    {}", "Deleted again, lifecycle check passed".dimmed());
                }
            }

            Ok(())
        }
        IdentityCommands::List { domain } => {
            let domain = resolve_domain(&config, domain.as_deref())?;
            let provider = RestDirectoryFactory.open(domain).await?;
            let manager = IdentityManager::new(Arc::clone(&provider), &config, domain);

            let identities = provider.list_identities().await?;
            if identities.is_empty() {
                println!("{}", "No identities found.".yellow());
            } else {
                println!(
                    "{}",
                    format!(
                        "Found {} identit{} in {}:",
                        identities.len(),
                        if identities.len() == 1 { "y" } else { "ies" },
                        domain.domain_name
                    )
                    .bold()
                );
                println!();
                for email in identities {
                    if manager.is_protected(&email) {
                        println!("  {} {} {}", "▸".cyan(), email, "(protected)".yellow());
                    } else {
                        println!("  {} {}", "▸".cyan(), email);
                    }
                }
            }

            Ok(())
        }
        IdentityCommands::Delete { email, domain } => {
            let domain = resolve_domain(&config, domain.as_deref())?;
            let provider = RestDirectoryFactory.open(domain).await?;
            let manager = IdentityManager::new(provider, &config, domain);

            if manager.release(&email).await? {
                println!("{} Deleted {}", "✓".green(), email);
            } else {
                println!("{} {} is protected, not deleted", "⚠".yellow(), email);
            }

            Ok(())
        }
        IdentityCommands::Exists { email, domain } => {
            let domain = resolve_domain(&config, domain.as_deref())?;
            let provider = RestDirectoryFactory.open(domain).await?;

            if provider.identity_exists(&email).await? {
                println!("{} {} exists", "✓".green(), email);
            } else {
                println!("{} {} does not exist", "✗".red(), email);
            }

            Ok(())
        }
        IdentityCommands::Suspend { email, domain } => {
            let domain = resolve_domain(&config, domain.as_deref())?;
            let provider = RestDirectoryFactory.open(domain).await?;

            provider.set_suspended(&email, true).await?;
            println!("{} Suspended {}", "✓".green(), email);

            Ok(())
        }
        IdentityCommands::Unsuspend { email, domain } => {
            let domain = resolve_domain(&config, domain.as_deref())?;
            let provider = RestDirectoryFactory.open(domain).await?;

            provider.set_suspended(&email, false).await?;
            println!("{} Reinstated {}", "✓".green(), email);

            Ok(())
        }
    }
}
