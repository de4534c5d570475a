//! Shared state for command handlers

use std::path::{Path, PathBuf};

use anyhow::Result;

use rotor_core::config::{Config, DomainConfig};
use rotor_engine::config::load_config;

/// Everything a command handler needs besides its own arguments.
pub struct CliContext {
    /// Path to the main configuration file.
    pub config_path: PathBuf,
}

impl CliContext {
    /// Loads and validates the configuration file.
    pub fn load_config(&self) -> Result<Config> {
        load_config(&self.config_path)
    }

    /// Directory the data files (job list, status, step files) live in.
    /// They sit next to the configuration file.
    pub fn data_dir(&self) -> &Path {
        self.config_path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or(Path::new("."))
    }
}

/// Picks the domain a command acts on: the named one, or the only one
/// configured.
pub fn resolve_domain<'a>(config: &'a Config, name: Option<&str>) -> Result<&'a DomainConfig> {
    match name {
        Some(name) => config
            .domain(name)
            .ok_or_else(|| anyhow::anyhow!("domain {name:?} is not configured")),
        None => match config.domains.as_slice() {
            [only] => Ok(only),
            [] => anyhow::bail!("no domains configured, run `rotor config init` first"),
            _ => anyhow::bail!("several domains are configured, pick one with --domain"),
        },
    }
}
