//! Status publication
//!
//! The engine and supervisor describe progress through [`JobStatus`]
//! snapshots. A [`StatusSink`] decides where snapshots go: the standard
//! sink rewrites a JSON file atomically, and the in-memory sink keeps
//! snapshots for inspection in tests.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use tracing::warn;

use rotor_core::domain::status::JobStatus;

use crate::files::replace_file;

/// Destination for job status snapshots.
#[async_trait]
pub trait StatusSink: Send + Sync {
    /// Publishes one full snapshot, replacing the previous one.
    async fn publish(&self, status: &JobStatus) -> Result<()>;
}

/// Publishes snapshots to a JSON file, replaced whole on every update.
pub struct FileStatusSink {
    path: PathBuf,
}

impl FileStatusSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl StatusSink for FileStatusSink {
    async fn publish(&self, status: &JobStatus) -> Result<()> {
        let body = serde_json::to_vec_pretty(status).context("failed to serialize job status")?;
        replace_file(&self.path, &body)
    }
}

/// Keeps every published snapshot in memory.
#[derive(Clone, Default)]
pub struct MemoryStatusSink {
    snapshots: Arc<Mutex<Vec<JobStatus>>>,
}

impl MemoryStatusSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all snapshots published so far.
    pub fn snapshots(&self) -> Vec<JobStatus> {
        self.snapshots.lock().unwrap().clone()
    }

    /// Returns the most recent snapshot, if any.
    pub fn last(&self) -> Option<JobStatus> {
        self.snapshots.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl StatusSink for MemoryStatusSink {
    async fn publish(&self, status: &JobStatus) -> Result<()> {
        self.snapshots.lock().unwrap().push(status.clone());
        Ok(())
    }
}

/// Shared view of the current job status.
///
/// Collaborators mutate the status through [`update`](Self::update); every
/// update stamps `last_updated` and pushes the snapshot to the sink.
/// Publication failures are logged and swallowed so a broken sink never
/// stops a transfer.
pub struct StatusTracker {
    sink: Arc<dyn StatusSink>,
    current: Mutex<JobStatus>,
}

impl StatusTracker {
    pub fn new(sink: Arc<dyn StatusSink>, initial: JobStatus) -> Self {
        Self {
            sink,
            current: Mutex::new(initial),
        }
    }

    /// Applies a mutation to the current status and publishes the result.
    pub async fn update(&self, apply: impl FnOnce(&mut JobStatus)) {
        let snapshot = {
            let mut status = self.current.lock().unwrap();
            apply(&mut status);
            status.last_updated = Utc::now();
            status.clone()
        };
        if let Err(e) = self.sink.publish(&snapshot).await {
            warn!("failed to publish job status: {e:#}");
        }
    }

    /// Returns a copy of the current status.
    pub fn snapshot(&self) -> JobStatus {
        self.current.lock().unwrap().clone()
    }
}
