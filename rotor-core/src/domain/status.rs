//! Externally published job status snapshot

use serde::{Deserialize, Serialize};

/// Point-in-time view of a running job.
///
/// Published for external observers (the `status` CLI command, dashboards).
/// Each publish fully replaces the previous snapshot; there is no history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStatus {
    /// Human label for the job, `source -> dest`.
    pub job_label: String,
    /// Run mode label, e.g. `copy` or `copy (dry-run)`.
    pub mode: String,
    /// Free-form progress message.
    pub status_msg: String,
    /// Identity currently driving the transfer, empty between cycles.
    pub current_identity: String,
    /// Last speed reading from the tool, verbatim.
    pub speed: String,
    /// Last percentage reading from the tool, verbatim.
    pub progress: String,
    /// Running total across all cycles, rounded to two decimals.
    pub total_transferred_gb: f64,
    pub is_running: bool,
    pub last_updated: chrono::DateTime<chrono::Utc>,
}

impl JobStatus {
    /// A fresh snapshot for a job that has not produced output yet.
    pub fn starting(job_label: &str, mode: &str) -> Self {
        Self {
            job_label: job_label.to_string(),
            mode: mode.to_string(),
            status_msg: "Starting".to_string(),
            current_identity: String::new(),
            speed: String::new(),
            progress: String::new(),
            total_transferred_gb: 0.0,
            is_running: true,
            last_updated: chrono::Utc::now(),
        }
    }
}
