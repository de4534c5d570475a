//! Per-cycle transfer outcome types

use serde::{Deserialize, Serialize};

/// Why a supervised transfer run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CycleOutcome {
    /// The tool exited cleanly with the payload finished.
    Done,
    /// The identity's upload quota was used up; rotate and continue.
    QuotaReached,
    /// Output went silent past the stall window and the process was killed.
    Stalled,
    /// The tool failed outright.
    Error,
}

impl CycleOutcome {
    /// Whether the rotation should continue with a fresh identity.
    pub fn should_rotate(&self) -> bool {
        matches!(self, CycleOutcome::QuotaReached | CycleOutcome::Stalled)
    }
}

/// Result of one supervised transfer cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleResult {
    pub outcome: CycleOutcome,
    /// Gigabytes the tool reported moving during this cycle.
    pub transferred_gb: f64,
    /// Exit code of the tool process, when it exited on its own.
    pub exit_code: Option<i32>,
}

impl CycleResult {
    pub fn new(outcome: CycleOutcome, transferred_gb: f64, exit_code: Option<i32>) -> Self {
        Self {
            outcome,
            transferred_gb,
            exit_code,
        }
    }
}
