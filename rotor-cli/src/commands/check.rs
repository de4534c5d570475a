//! Check command handler
//!
//! Validates the setup end to end: the configuration parses, and each
//! domain has a readable credential file and a directory API that
//! answers.

use std::path::Path;

use anyhow::{Result, bail};
use colored::*;

use rotor_directory::{
    DirectoryCredentials, DirectoryFactory, DirectoryProvider, RestDirectoryFactory,
};

use crate::context::CliContext;

/// Handle the check command
///
/// Walks every configured domain and reports one line per probe.
/// Fails when any probe fails, so the exit code is scriptable.
///
/// # Arguments
/// * `context` - The CLI context
pub async fn handle_check(context: &CliContext) -> Result<()> {
    let config = context.load_config()?;
    println!(
        "{} configuration {} is valid",
        "✓".green(),
        context.config_path.display()
    );

    if config.domains.is_empty() {
        println!("{}", "No domains configured.".yellow());
        return Ok(());
    }

    let mut failures = 0;
    for domain in &config.domains {
        println!();
        println!("{}", format!("Domain {}:", domain.domain_name).bold());

        let credential_path = domain.effective_credential_path();
        if !Path::new(credential_path).exists() {
            println!(
                "  {} credential file {} is missing",
                "✗".red(),
                credential_path
            );
            failures += 1;
            continue;
        }
        println!("  {} credential file {}", "✓".green(), credential_path);

        if let Err(e) = DirectoryCredentials::load(credential_path).await {
            println!("  {} credentials do not parse: {}", "✗".red(), e);
            failures += 1;
            continue;
        }
        println!("  {} credentials parse", "✓".green());

        match RestDirectoryFactory.open(domain).await {
            Ok(provider) => match provider.list_identities().await {
                Ok(identities) => {
                    println!(
                        "  {} directory answers, {} identities visible",
                        "✓".green(),
                        identities.len()
                    );
                }
                Err(e) => {
                    println!("  {} directory listing failed: {}", "✗".red(), e);
                    failures += 1;
                }
            },
            Err(e) => {
                println!("  {} directory client failed: {}", "✗".red(), e);
                failures += 1;
            }
        }

        println!("  {} upload group {}", "✓".green(), domain.group_email);
    }

    println!();
    if failures > 0 {
        bail!("{failures} check(s) failed");
    }

    println!("{}", "All checks passed.".green().bold());
    Ok(())
}
