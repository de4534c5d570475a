//! Typed configuration model
//!
//! Deserialized from the operator-edited config file. Every field carries a
//! default so a partial file still loads; `validate` rejects combinations
//! the engine cannot run with.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::size;

/// Well-known credential location used when a domain entry leaves
/// `credential_path` empty.
pub const DEFAULT_CREDENTIAL_PATH: &str = "keys/master.json";

/// How identities are sourced for rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum RotationStrategy {
    /// Create a fresh identity per cycle and delete it once spent.
    #[default]
    Ephemeral,
    /// Walk a pre-existing roster of identities; never create or delete.
    FixedList,
}

/// How the tunnel endpoint is addressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum TunnelMode {
    /// Full `user@host` target with an optional private key.
    #[default]
    Explicit,
    /// A host alias resolved by the local ssh config.
    Alias,
}

/// One directory domain the engine can provision identities in.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DomainConfig {
    /// Domain identities are created under, e.g. `example.org`.
    #[serde(default)]
    pub domain_name: String,

    /// Administrator account for the domain. Implicitly protected from
    /// deletion.
    #[serde(default)]
    pub admin_email: String,

    /// Path to the credential file for this domain's directory API.
    /// Empty means the well-known default location.
    #[serde(default)]
    pub credential_path: String,

    /// Credential path as seen from the tunnel endpoint, when transfers
    /// run remotely.
    #[serde(default)]
    pub remote_credential_path: Option<String>,

    /// Group whose membership grants upload rights on the target.
    #[serde(default)]
    pub group_email: String,
}

impl DomainConfig {
    /// The local credential file path, falling back to the well-known
    /// default when unset.
    pub fn effective_credential_path(&self) -> &str {
        if self.credential_path.trim().is_empty() {
            DEFAULT_CREDENTIAL_PATH
        } else {
            &self.credential_path
        }
    }

    /// The credential path to hand the transfer tool: the remote path when
    /// the run goes through the tunnel and one is configured, the local
    /// path otherwise.
    pub fn transfer_credential_path(&self, tunneled: bool) -> &str {
        match (&self.remote_credential_path, tunneled) {
            (Some(remote), true) if !remote.trim().is_empty() => remote,
            _ => self.effective_credential_path(),
        }
    }
}

/// Flags handed to the external transfer tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferOptions {
    /// Tool binary name or path.
    #[serde(default = "default_binary")]
    pub binary: String,

    /// Tool verb: `copy` leaves extra files on the target, `sync` mirrors.
    #[serde(default = "default_command")]
    pub command: String,

    /// Parallel transfer streams.
    #[serde(default = "default_transfers")]
    pub transfers: u32,

    /// Upload chunk size passed through to the tool.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: String,

    /// Interval between stats lines on the tool's output.
    #[serde(default = "default_stats_interval")]
    pub stats_interval: String,

    /// Whether to pass the tool's verbose flag.
    #[serde(default = "default_true")]
    pub verbose: bool,

    /// Extra whitespace-separated flags appended verbatim.
    #[serde(default)]
    pub extra_flags: String,
}

impl Default for TransferOptions {
    fn default() -> Self {
        Self {
            binary: default_binary(),
            command: default_command(),
            transfers: default_transfers(),
            chunk_size: default_chunk_size(),
            stats_interval: default_stats_interval(),
            verbose: true,
            extra_flags: String::new(),
        }
    }
}

/// Remote execution tunnel settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TunnelConfig {
    /// Run the transfer tool on a remote host over ssh.
    #[serde(default)]
    pub enabled: bool,

    /// Addressing mode for the remote host.
    #[serde(default)]
    pub mode: TunnelMode,

    /// Hostname, address, or (in alias mode) ssh config alias.
    #[serde(default)]
    pub host: String,

    /// Login user for explicit mode.
    #[serde(default)]
    pub user: String,

    /// Private key path for explicit mode. Empty uses the ssh defaults.
    #[serde(default)]
    pub key_path: String,

    /// Connection timeout for the preflight probe and the wrapped run.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Probe the tunnel with a no-op command before each transfer.
    #[serde(default = "default_true")]
    pub preflight_check: bool,

    /// Run the remote tool inside a named multiplexer session so an
    /// operator can attach to it. Output becomes unobservable.
    #[serde(default)]
    pub visible_session: bool,

    /// Keep the multiplexer window open after the tool exits.
    #[serde(default)]
    pub hold_session_open: bool,
}

impl Default for TunnelConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            mode: TunnelMode::default(),
            host: String::new(),
            user: String::new(),
            key_path: String::new(),
            connect_timeout_secs: default_connect_timeout(),
            preflight_check: true,
            visible_session: false,
            hold_session_open: false,
        }
    }
}

/// Top-level rotor configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Per-identity upload quota as a size string, e.g. `"700G"`.
    #[serde(default = "default_upload_limit")]
    pub upload_limit: String,

    /// Hard cap on rotation cycles per job.
    #[serde(default = "default_max_identities")]
    pub max_identities_per_cycle: u32,

    /// Identity sourcing strategy.
    #[serde(default)]
    pub rotation_strategy: RotationStrategy,

    /// Roster file for the fixed-list strategy, one identity per line.
    /// When absent the directory listing is used instead.
    #[serde(default)]
    pub identity_file: Option<PathBuf>,

    /// Let the fixed-list strategy use protected identities too.
    #[serde(default)]
    pub include_protected: bool,

    /// Minutes of transfer silence before the run is declared stalled.
    #[serde(default = "default_stall_timeout")]
    pub stall_timeout_minutes: u64,

    /// Identities that must never be deleted. Matched case-insensitively
    /// with surrounding whitespace ignored.
    #[serde(default)]
    pub protected_identities: Vec<String>,

    /// Webhook endpoint for job notifications. Empty disables them.
    #[serde(default)]
    pub webhook_url: String,

    /// Pause before every provision/run/delete action and wait for an
    /// operator decision on the step channel.
    #[serde(default)]
    pub step_check: bool,

    /// Transfer tool flags.
    #[serde(default)]
    pub transfer: TransferOptions,

    /// Remote execution tunnel.
    #[serde(default)]
    pub tunnel: TunnelConfig,

    /// Directory domains available to jobs.
    #[serde(default)]
    pub domains: Vec<DomainConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            upload_limit: default_upload_limit(),
            max_identities_per_cycle: default_max_identities(),
            rotation_strategy: RotationStrategy::default(),
            identity_file: None,
            include_protected: false,
            stall_timeout_minutes: default_stall_timeout(),
            protected_identities: Vec::new(),
            webhook_url: String::new(),
            step_check: false,
            transfer: TransferOptions::default(),
            tunnel: TunnelConfig::default(),
            domains: Vec::new(),
        }
    }
}

impl Config {
    /// The per-identity quota in gigabytes.
    pub fn upload_limit_gb(&self) -> f64 {
        size::parse_gb(&self.upload_limit)
    }

    /// Looks up a domain by name, case-insensitively.
    pub fn domain(&self, reference: &str) -> Option<&DomainConfig> {
        self.domains
            .iter()
            .find(|d| d.domain_name.eq_ignore_ascii_case(reference.trim()))
    }

    /// Validates the configuration.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.upload_limit_gb() <= 0.0 {
            anyhow::bail!(
                "upload_limit {:?} does not parse to a positive size",
                self.upload_limit
            );
        }

        if self.max_identities_per_cycle == 0 {
            anyhow::bail!("max_identities_per_cycle must be greater than 0");
        }

        if self.stall_timeout_minutes == 0 {
            anyhow::bail!("stall_timeout_minutes must be greater than 0");
        }

        if self.transfer.binary.is_empty() {
            anyhow::bail!("transfer.binary cannot be empty");
        }

        if self.transfer.command.is_empty() {
            anyhow::bail!("transfer.command cannot be empty");
        }

        if self.transfer.transfers == 0 {
            anyhow::bail!("transfer.transfers must be greater than 0");
        }

        if self.tunnel.enabled {
            if self.tunnel.host.is_empty() {
                anyhow::bail!("tunnel.host cannot be empty when the tunnel is enabled");
            }
            if self.tunnel.mode == TunnelMode::Explicit && self.tunnel.user.is_empty() {
                anyhow::bail!("tunnel.user cannot be empty in explicit mode");
            }
        }

        for domain in &self.domains {
            if domain.domain_name.is_empty() {
                anyhow::bail!("every domain entry needs a domain_name");
            }
            if domain.admin_email.is_empty() {
                anyhow::bail!("domain {} is missing admin_email", domain.domain_name);
            }
            if domain.group_email.is_empty() {
                anyhow::bail!("domain {} is missing group_email", domain.domain_name);
            }
        }

        Ok(())
    }
}

fn default_binary() -> String {
    "rclone".to_string()
}

fn default_command() -> String {
    "copy".to_string()
}

fn default_transfers() -> u32 {
    8
}

fn default_chunk_size() -> String {
    "128M".to_string()
}

fn default_stats_interval() -> String {
    "1s".to_string()
}

fn default_upload_limit() -> String {
    "700G".to_string()
}

fn default_max_identities() -> u32 {
    10
}

fn default_stall_timeout() -> u64 {
    10
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn domain() -> DomainConfig {
        DomainConfig {
            domain_name: "example.org".to_string(),
            admin_email: "admin@example.org".to_string(),
            credential_path: "keys/example.json".to_string(),
            remote_credential_path: None,
            group_email: "uploaders@example.org".to_string(),
        }
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.upload_limit, "700G");
        assert_eq!(config.max_identities_per_cycle, 10);
        assert_eq!(config.rotation_strategy, RotationStrategy::Ephemeral);
        assert_eq!(config.stall_timeout_minutes, 10);
        assert_eq!(config.transfer.transfers, 8);
        assert_eq!(config.transfer.chunk_size, "128M");
        assert!(config.transfer.verbose);
        assert!(config.tunnel.preflight_check);
        assert_eq!(config.tunnel.connect_timeout_secs, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let config: Config = serde_json::from_str(r#"{"upload_limit": "10G"}"#).unwrap();
        assert_eq!(config.upload_limit_gb(), 10.0);
        assert_eq!(config.max_identities_per_cycle, 10);
        assert_eq!(config.transfer.binary, "rclone");
    }

    #[test]
    fn test_strategy_spelling() {
        let config: Config =
            serde_json::from_str(r#"{"rotation_strategy": "fixed-list"}"#).unwrap();
        assert_eq!(config.rotation_strategy, RotationStrategy::FixedList);
    }

    #[test]
    fn test_validation() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());

        config.upload_limit = "banana".to_string();
        assert!(config.validate().is_err());
        config.upload_limit = "700G".to_string();

        config.max_identities_per_cycle = 0;
        assert!(config.validate().is_err());
        config.max_identities_per_cycle = 10;

        config.tunnel.enabled = true;
        assert!(config.validate().is_err());
        config.tunnel.host = "transfer-box".to_string();
        assert!(config.validate().is_err());
        config.tunnel.user = "worker".to_string();
        assert!(config.validate().is_ok());

        config.tunnel.mode = TunnelMode::Alias;
        config.tunnel.user = String::new();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_domain_lookup_ignores_case() {
        let config = Config {
            domains: vec![domain()],
            ..Config::default()
        };
        assert!(config.domain("Example.ORG").is_some());
        assert!(config.domain(" example.org ").is_some());
        assert!(config.domain("other.org").is_none());
    }

    #[test]
    fn test_credential_path_resolution() {
        let mut entry = domain();
        assert_eq!(entry.effective_credential_path(), "keys/example.json");
        assert_eq!(entry.transfer_credential_path(false), "keys/example.json");
        assert_eq!(entry.transfer_credential_path(true), "keys/example.json");

        entry.remote_credential_path = Some("/srv/keys/example.json".to_string());
        assert_eq!(entry.transfer_credential_path(false), "keys/example.json");
        assert_eq!(entry.transfer_credential_path(true), "/srv/keys/example.json");

        entry.credential_path = String::new();
        assert_eq!(entry.effective_credential_path(), DEFAULT_CREDENTIAL_PATH);
    }

    #[test]
    fn test_domain_entries_validated() {
        let mut config = Config {
            domains: vec![domain()],
            ..Config::default()
        };
        assert!(config.validate().is_ok());

        config.domains[0].group_email = String::new();
        assert!(config.validate().is_err());
    }
}
