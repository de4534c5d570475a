//! Step-confirmation channel
//!
//! In step-check mode the engine publishes a [`StepReport`] before each
//! discrete action and polls for an operator decision. The standard
//! channel is a pair of JSON files: the engine rewrites the status file,
//! the operator drops an action file, and the engine consumes it.

use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

use rotor_core::domain::step::{StepAction, StepReport};

use crate::files::replace_file;

/// Two-way channel between the engine and a confirming operator.
#[async_trait]
pub trait StepChannel: Send + Sync {
    /// Publishes the step the engine is currently at.
    async fn publish(&self, report: &StepReport) -> Result<()>;

    /// Polls for an operator decision. A decision is consumed on read;
    /// polling again returns `None` until the operator answers again.
    async fn take_action(&self) -> Option<StepAction>;
}

/// On-disk wrapper for the operator's answer.
#[derive(Debug, Serialize, Deserialize)]
struct ActionFile {
    action: StepAction,
}

/// File-based step channel.
pub struct FileStepChannel {
    status_path: PathBuf,
    action_path: PathBuf,
}

impl FileStepChannel {
    pub fn new(status_path: impl Into<PathBuf>, action_path: impl Into<PathBuf>) -> Self {
        Self {
            status_path: status_path.into(),
            action_path: action_path.into(),
        }
    }

    fn consume_action_file(&self) {
        if let Err(e) = std::fs::remove_file(&self.action_path) {
            warn!("failed to remove step action file: {e}");
        }
    }
}

#[async_trait]
impl StepChannel for FileStepChannel {
    async fn publish(&self, report: &StepReport) -> Result<()> {
        let body = serde_json::to_vec_pretty(report).context("failed to serialize step report")?;
        replace_file(&self.status_path, &body)
    }

    async fn take_action(&self) -> Option<StepAction> {
        let body = match std::fs::read_to_string(&self.action_path) {
            Ok(body) => body,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!("failed to read step action file: {e}");
                return None;
            }
        };
        match serde_json::from_str::<ActionFile>(&body) {
            Ok(file) => {
                self.consume_action_file();
                Some(file.action)
            }
            Err(e) => {
                warn!("discarding malformed step action file: {e}");
                self.consume_action_file();
                None
            }
        }
    }
}
