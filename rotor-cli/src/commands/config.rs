//! Config command handlers
//!
//! Writes a starter configuration file and shows the effective
//! configuration after defaults are applied.

use std::fs;

use anyhow::{Context, Result, bail};
use clap::Subcommand;
use colored::*;

use crate::context::CliContext;

/// Starter configuration written by `rotor config init`. Parses to the
/// built-in defaults, with every knob documented in place.
const DEFAULT_CONFIG: &str = r#"# Rotor configuration.

# Per-identity upload quota. The engine rotates to a fresh identity once
# a cycle has moved this much.
upload_limit: "700G"

# Hard cap on rotation cycles per job run.
max_identities_per_cycle: 10

# ephemeral: mint an identity per cycle and delete it once spent.
# fixed-list: walk an existing roster, never create or delete.
rotation_strategy: ephemeral

# Roster file for fixed-list rotation, one email per line. Lines starting
# with # are ignored. Leave unset to use the directory listing instead.
# identity_file: identities.txt

# Let fixed-list rotation use protected identities too.
include_protected: false

# Minutes of transfer silence before a cycle is declared stalled and the
# tool process is killed.
stall_timeout_minutes: 10

# Identities that must never be deleted. Domain admin accounts are
# protected implicitly.
protected_identities: []

# Webhook endpoint for job notifications (Slack or Discord style).
# Empty disables them.
webhook_url: ""

# Pause before every provision, transfer, and delete action and wait for
# an operator decision in the step action file.
step_check: false

transfer:
  binary: rclone
  command: copy
  transfers: 8
  chunk_size: "128M"
  stats_interval: "1s"
  verbose: true
  extra_flags: ""

tunnel:
  # Run the transfer tool on a remote host over ssh.
  enabled: false
  # explicit: user@host with an optional key. alias: ssh config alias.
  mode: explicit
  host: ""
  user: ""
  key_path: ""
  connect_timeout_secs: 10
  # Probe the tunnel with a no-op command before each transfer.
  preflight_check: true
  # Run the remote tool inside a named tmux session an operator can
  # attach to. Output becomes unobservable.
  visible_session: false
  hold_session_open: false

# Directory domains jobs can reference.
domains: []
#  - domain_name: example.org
#    admin_email: admin@example.org
#    credential_path: keys/master.json
#    # Path to the same credential file as seen from the tunnel host.
#    # remote_credential_path: /srv/keys/master.json
#    group_email: uploaders@example.org
"#;

/// Config subcommands
#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Write a commented starter configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Print the effective configuration
    Show,
}

/// Handle config commands
///
/// Routes config subcommands to their respective handlers.
///
/// # Arguments
/// * `command` - The config command to execute
/// * `context` - The CLI context
pub async fn handle_config_command(command: ConfigCommands, context: &CliContext) -> Result<()> {
    match command {
        ConfigCommands::Init { force } => {
            let path = &context.config_path;
            if path.exists() && !force {
                bail!(
                    "{} already exists, pass --force to overwrite it",
                    path.display()
                );
            }

            fs::write(path, DEFAULT_CONFIG)
                .with_context(|| format!("failed to write {}", path.display()))?;

            println!("{} Wrote {}", "✓".green(), path.display());
            println!(
                "  Add your domains, then verify the setup with {}",
                "rotor check".cyan()
            );
            Ok(())
        }
        ConfigCommands::Show => {
            let config = context.load_config()?;
            let rendered =
                serde_yaml::to_string(&config).context("failed to render the configuration")?;
            print!("{rendered}");
            Ok(())
        }
    }
}
