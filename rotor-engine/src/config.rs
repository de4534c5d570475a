//! Config and job files on disk
//!
//! The operator edits two YAML files in the working directory: the main
//! config and the job list. Both are read whole and written back whole;
//! the status and step files live alongside them.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use rotor_core::config::Config;
use rotor_core::domain::job::JobSpec;

use crate::files::replace_file;

/// Main configuration file name.
pub const CONFIG_FILE: &str = "config.yaml";
/// Job list file name.
pub const JOBS_FILE: &str = "jobs.yaml";
/// Published job status snapshot.
pub const STATUS_FILE: &str = "status.json";
/// Step gate the engine publishes in step-check mode.
pub const STEP_STATUS_FILE: &str = "step_status.json";
/// Operator answer file for step-check mode.
pub const STEP_ACTION_FILE: &str = "step_action.json";

/// On-disk job list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobsFile {
    #[serde(default)]
    pub jobs: Vec<JobSpec>,
}

/// Reads and validates the main config file.
pub fn load_config(path: &Path) -> Result<Config> {
    let body = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    let config: Config = serde_yaml::from_str(&body)
        .with_context(|| format!("failed to parse config file {}", path.display()))?;
    config.validate()?;
    Ok(config)
}

/// Writes the config file, replacing it atomically.
pub fn save_config(path: &Path, config: &Config) -> Result<()> {
    let body = serde_yaml::to_string(config).context("failed to serialize config")?;
    replace_file(path, body.as_bytes())
}

/// Reads the job list. A missing file is an empty list.
pub fn load_jobs(path: &Path) -> Result<JobsFile> {
    let body = match std::fs::read_to_string(path) {
        Ok(body) => body,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(JobsFile::default()),
        Err(e) => {
            return Err(e)
                .with_context(|| format!("failed to read job file {}", path.display()));
        }
    };
    serde_yaml::from_str(&body)
        .with_context(|| format!("failed to parse job file {}", path.display()))
}

/// Writes the job list, replacing it atomically.
pub fn save_jobs(path: &Path, jobs: &JobsFile) -> Result<()> {
    let body = serde_yaml::to_string(jobs).context("failed to serialize job list")?;
    replace_file(path, body.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);

        let mut config = Config::default();
        config.upload_limit = "500G".to_string();
        config.protected_identities = vec!["keep@example.org".to_string()];
        save_config(&path, &config).unwrap();

        let loaded = load_config(&path).unwrap();
        assert_eq!(loaded.upload_limit, "500G");
        assert_eq!(loaded.protected_identities, config.protected_identities);
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "upload_limit: \"10G\"\n").unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.upload_limit_gb(), 10.0);
        assert_eq!(config.transfer.binary, "rclone");
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "upload_limit: \"banana\"\n").unwrap();

        assert!(load_config(&path).is_err());
    }

    #[test]
    fn test_missing_job_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let jobs = load_jobs(&dir.path().join(JOBS_FILE)).unwrap();
        assert!(jobs.jobs.is_empty());
    }

    #[test]
    fn test_jobs_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(JOBS_FILE);

        let jobs = JobsFile {
            jobs: vec![JobSpec {
                source: "local:/archive".to_string(),
                dest: "target:backup".to_string(),
                domain_reference: "example.org".to_string(),
            }],
        };
        save_jobs(&path, &jobs).unwrap();

        let loaded = load_jobs(&path).unwrap();
        assert_eq!(loaded.jobs.len(), 1);
        assert_eq!(loaded.jobs[0].source, "local:/archive");
    }
}
