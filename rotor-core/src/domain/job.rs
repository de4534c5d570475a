//! Transfer job domain types

use serde::{Deserialize, Serialize};

/// One bulk transfer request: move `source` into `dest` using identities
/// from the referenced directory domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSpec {
    pub source: String,
    pub dest: String,
    pub domain_reference: String,
}

impl JobSpec {
    /// Short human label used in status snapshots and notifications.
    pub fn label(&self) -> String {
        format!("{} -> {}", self.source, self.dest)
    }
}

/// How a job run should behave.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Normal,
    /// Single rehearsal cycle; the tool is told not to write anything.
    DryRun,
}

impl RunMode {
    pub fn is_dry_run(&self) -> bool {
        matches!(self, RunMode::DryRun)
    }
}

/// Terminal state of a rotation job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobOutcome {
    /// The payload finished transferring.
    Succeeded,
    /// The cycle budget ran out before the payload finished.
    Exhausted,
    /// A cycle failed outright, or an operator answered a step gate
    /// with abort.
    Aborted,
    /// The cancellation token fired between cycles.
    Cancelled,
}

impl JobOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, JobOutcome::Succeeded)
    }
}

/// Summary returned once a job reaches a terminal state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobReport {
    pub outcome: JobOutcome,
    pub cycles_run: u32,
    pub total_transferred_gb: f64,
}
