//! Transfer command construction
//!
//! Builds the full tool invocation for one cycle: the transfer argv in the
//! tool's contract order, optional extra flags, and the ssh wrap when the
//! run happens on a remote endpoint. Building is pure; the same inputs
//! always produce the same argv.

use std::borrow::Cow;

use shell_escape::escape;

use rotor_core::config::{Config, DomainConfig, TunnelConfig, TunnelMode};
use rotor_core::domain::job::{JobSpec, RunMode};

/// Token the tunnel liveness probe expects back from the endpoint.
pub const PROBE_TOKEN: &str = "ROTOR_TUNNEL_OK";

/// How the supervisor can observe the spawned command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureMode {
    /// Stdout and stderr are piped and parseable.
    Piped,
    /// Output goes to a remote session; only the exit code comes back.
    Detached,
}

/// A fully built tool invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandSpec {
    pub argv: Vec<String>,
    pub capture: CaptureMode,
    /// Multiplexer session name, set in visible-session mode.
    pub session: Option<String>,
}

/// Builds the complete invocation for one transfer cycle.
///
/// # Arguments
/// * `config` - Transfer flags, quota, and tunnel settings
/// * `domain` - Domain supplying the credential file
/// * `job` - Source and destination
/// * `identity` - Email the tool impersonates for this cycle
/// * `mode` - Normal or dry-run
pub fn build_transfer_command(
    config: &Config,
    domain: &DomainConfig,
    job: &JobSpec,
    identity: &str,
    mode: RunMode,
) -> CommandSpec {
    let transfer = &config.transfer;
    let credential = domain.transfer_credential_path(config.tunnel.enabled);

    let mut argv = vec![
        transfer.binary.clone(),
        transfer.command.clone(),
        job.source.clone(),
        job.dest.clone(),
        format!("--drive-service-account-file={credential}"),
        format!("--drive-impersonate={identity}"),
        format!("--drive-stop-on-upload-limit={}", config.upload_limit),
        format!("--transfers={}", transfer.transfers),
        format!("--drive-chunk-size={}", transfer.chunk_size),
        format!("--stats={}", transfer.stats_interval),
    ];
    if transfer.verbose {
        argv.push("--verbose".to_string());
    }
    argv.extend(transfer.extra_flags.split_whitespace().map(String::from));
    if mode.is_dry_run() {
        argv.push("--dry-run".to_string());
    }

    if !config.tunnel.enabled {
        return CommandSpec {
            argv,
            capture: CaptureMode::Piped,
            session: None,
        };
    }

    wrap_in_tunnel(&config.tunnel, argv, job, identity)
}

/// Wraps a built tool argv in the ssh invocation for the tunnel endpoint.
fn wrap_in_tunnel(
    tunnel: &TunnelConfig,
    inner: Vec<String>,
    job: &JobSpec,
    identity: &str,
) -> CommandSpec {
    let remote = join_quoted(&inner);

    let mut argv = vec!["ssh".to_string()];
    if tunnel.visible_session {
        // An interactive tty so the multiplexer session stays attached to
        // this ssh call; the command returns when the session ends.
        argv.push("-t".to_string());
    }
    argv.extend(ssh_base_args(tunnel));

    if tunnel.visible_session {
        let session = session_name(&job.source, &job.dest, identity);
        let mut window = remote;
        if tunnel.hold_session_open {
            window.push_str("; printf 'transfer finished, press enter to close'; read _");
        }
        let tmux = vec![
            "tmux".to_string(),
            "new-session".to_string(),
            "-s".to_string(),
            session.clone(),
            window,
        ];
        argv.push(join_quoted(&tmux));
        CommandSpec {
            argv,
            capture: CaptureMode::Detached,
            session: Some(session),
        }
    } else {
        argv.push(remote);
        CommandSpec {
            argv,
            capture: CaptureMode::Piped,
            session: None,
        }
    }
}

/// The ssh argument prefix shared by the transfer wrap and the liveness
/// probe: connection options followed by the endpoint address.
pub fn ssh_base_args(tunnel: &TunnelConfig) -> Vec<String> {
    let mut args = vec![
        "-o".to_string(),
        format!("ConnectTimeout={}", tunnel.connect_timeout_secs),
    ];
    match tunnel.mode {
        TunnelMode::Alias => args.push(tunnel.host.clone()),
        TunnelMode::Explicit => {
            if !tunnel.key_path.is_empty() {
                args.push("-i".to_string());
                args.push(tunnel.key_path.clone());
            }
            args.push(format!("{}@{}", tunnel.user, tunnel.host));
        }
    }
    args
}

/// Builds the tunnel liveness probe invocation.
pub fn build_probe_command(tunnel: &TunnelConfig) -> Vec<String> {
    let mut argv = vec!["ssh".to_string()];
    argv.extend(ssh_base_args(tunnel));
    argv.push(format!("echo {PROBE_TOKEN}"));
    argv
}

/// Joins an argv into a single shell-safe command string.
fn join_quoted(argv: &[String]) -> String {
    argv.iter()
        .map(|arg| escape(Cow::Borrowed(arg.as_str())).into_owned())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Generates the multiplexer session name for a cycle.
///
/// Hash-derived so rebuilding the same cycle yields the same argv while
/// distinct identities get distinct sessions.
fn session_name(source: &str, dest: &str, identity: &str) -> String {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    let mut hasher = DefaultHasher::new();
    source.hash(&mut hasher);
    dest.hash(&mut hasher);
    identity.hash(&mut hasher);

    format!("rotor-{:x}", hasher.finish())
}
