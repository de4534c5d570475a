//! Step-confirmation channel types
//!
//! In step-check mode the engine pauses before each discrete action,
//! publishes where it stands, and waits for an operator decision.

use serde::{Deserialize, Serialize};

/// Lifecycle of one gated step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepState {
    WaitingUser,
    Running,
    Success,
    Failed,
}

/// Operator decision for a pending step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepAction {
    Continue,
    Abort,
}

/// Snapshot of the step the engine is currently at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepReport {
    /// Short step name, e.g. `provision` or `transfer`.
    pub step: String,
    /// Human detail, e.g. the identity being acted on.
    pub detail: String,
    pub status: StepState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StepReport {
    pub fn new(step: &str, detail: &str, status: StepState) -> Self {
        Self {
            step: step.to_string(),
            detail: detail.to_string(),
            status,
            error: None,
        }
    }

    pub fn with_error(mut self, error: &str) -> Self {
        self.error = Some(error.to_string());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_spelling() {
        let report = StepReport::new("provision", "worker@example.org", StepState::WaitingUser);
        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"WAITING_USER\""));
        assert!(!json.contains("error"));

        let action: StepAction = serde_json::from_str("\"CONTINUE\"").unwrap();
        assert_eq!(action, StepAction::Continue);
    }
}
