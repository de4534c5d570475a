//! In-memory doubles for engine tests
//!
//! Recording implementations of the engine's collaborator traits. Each
//! one captures the calls it receives so tests can assert on ordering
//! and cleanup without any network or child processes.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::anyhow;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use rotor_core::config::DomainConfig;
use rotor_core::domain::cycle::CycleResult;
use rotor_core::domain::identity::ProvisionedIdentity;
use rotor_core::domain::step::{StepAction, StepReport};
use rotor_directory::{DirectoryError, DirectoryFactory, DirectoryProvider};

use crate::notify::Notifier;
use crate::status::StatusTracker;
use crate::step::StepChannel;
use crate::supervise::{TransferRequest, TransferRunner};

/// Directory double that mints sequential identities and records every
/// lifecycle call.
#[derive(Default)]
pub struct RecordingDirectory {
    next_id: AtomicU32,
    created: Mutex<Vec<String>>,
    joined: Mutex<Vec<String>>,
    deleted: Mutex<Vec<String>>,
    suspensions: Mutex<Vec<(String, bool)>>,
    listing: Mutex<Vec<String>>,
    group_conflict: AtomicBool,
    fail_creates: AtomicBool,
}

impl RecordingDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// A directory whose listing returns the given identities.
    pub fn with_listing(identities: &[&str]) -> Self {
        let directory = Self::default();
        *directory.listing.lock().unwrap() =
            identities.iter().map(|s| s.to_string()).collect();
        directory
    }

    /// Makes every group grant fail with a conflict.
    pub fn set_group_conflict(&self) {
        self.group_conflict.store(true, Ordering::SeqCst);
    }

    /// Makes every identity creation fail.
    pub fn fail_creates(&self) {
        self.fail_creates.store(true, Ordering::SeqCst);
    }

    pub fn created(&self) -> Vec<String> {
        self.created.lock().unwrap().clone()
    }

    pub fn joined(&self) -> Vec<String> {
        self.joined.lock().unwrap().clone()
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }

    pub fn suspensions(&self) -> Vec<(String, bool)> {
        self.suspensions.lock().unwrap().clone()
    }
}

#[async_trait]
impl DirectoryProvider for RecordingDirectory {
    async fn create_identity(&self) -> rotor_directory::Result<ProvisionedIdentity> {
        if self.fail_creates.load(Ordering::SeqCst) {
            return Err(DirectoryError::api_error(503, "directory unavailable"));
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let email = format!("worker{id}@example.org");
        self.created.lock().unwrap().push(email.clone());
        Ok(ProvisionedIdentity::new(email, format!("pw-{id}")))
    }

    async fn add_to_group(&self, email: &str) -> rotor_directory::Result<()> {
        if self.group_conflict.load(Ordering::SeqCst) {
            return Err(DirectoryError::api_error(409, "member already exists"));
        }
        self.joined.lock().unwrap().push(email.to_string());
        Ok(())
    }

    async fn delete_identity(&self, email: &str) -> rotor_directory::Result<()> {
        self.deleted.lock().unwrap().push(email.to_string());
        Ok(())
    }

    async fn identity_exists(&self, email: &str) -> rotor_directory::Result<bool> {
        if self.listing.lock().unwrap().iter().any(|e| e == email) {
            return Ok(true);
        }
        let created = self.created.lock().unwrap().iter().any(|e| e == email);
        let deleted = self.deleted.lock().unwrap().iter().any(|e| e == email);
        Ok(created && !deleted)
    }

    async fn list_identities(&self) -> rotor_directory::Result<Vec<String>> {
        Ok(self.listing.lock().unwrap().clone())
    }

    async fn set_suspended(&self, email: &str, suspended: bool) -> rotor_directory::Result<()> {
        self.suspensions
            .lock()
            .unwrap()
            .push((email.to_string(), suspended));
        Ok(())
    }
}

/// Factory that always opens the same provider.
pub struct FixedDirectoryFactory {
    provider: Arc<dyn DirectoryProvider>,
}

impl FixedDirectoryFactory {
    pub fn new(provider: Arc<dyn DirectoryProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl DirectoryFactory for FixedDirectoryFactory {
    async fn open(
        &self,
        _domain: &DomainConfig,
    ) -> rotor_directory::Result<Arc<dyn DirectoryProvider>> {
        Ok(Arc::clone(&self.provider))
    }
}

/// Runner double that replays scripted cycle results and records every
/// request it gets.
#[derive(Default)]
pub struct ScriptedRunner {
    results: Mutex<VecDeque<CycleResult>>,
    requests: Mutex<Vec<TransferRequest>>,
    cancel_after: Mutex<Option<(usize, CancellationToken)>>,
}

impl ScriptedRunner {
    pub fn with_results(results: Vec<CycleResult>) -> Self {
        Self {
            results: Mutex::new(results.into()),
            ..Self::default()
        }
    }

    /// Fires the token once the given number of cycles have run.
    pub fn cancel_after(&self, runs: usize, token: CancellationToken) {
        *self.cancel_after.lock().unwrap() = Some((runs, token));
    }

    pub fn requests(&self) -> Vec<TransferRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Identities in the order cycles ran them.
    pub fn identities(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.identity.clone())
            .collect()
    }
}

#[async_trait]
impl TransferRunner for ScriptedRunner {
    async fn run(
        &self,
        request: TransferRequest,
        _tracker: &StatusTracker,
    ) -> anyhow::Result<CycleResult> {
        let runs = {
            let mut requests = self.requests.lock().unwrap();
            requests.push(request);
            requests.len()
        };
        if let Some((after, token)) = self.cancel_after.lock().unwrap().as_ref() {
            if runs >= *after {
                token.cancel();
            }
        }
        self.results
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| anyhow!("no scripted cycle result left"))
    }
}

/// Notifier double that keeps delivered messages.
#[derive(Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, message: &str) {
        self.messages.lock().unwrap().push(message.to_string());
    }
}

/// Step channel double fed from a pre-queued list of decisions.
#[derive(Default)]
pub struct MemoryStepChannel {
    reports: Mutex<Vec<StepReport>>,
    actions: Mutex<VecDeque<StepAction>>,
}

impl MemoryStepChannel {
    pub fn queue_action(&self, action: StepAction) {
        self.actions.lock().unwrap().push_back(action);
    }

    pub fn reports(&self) -> Vec<StepReport> {
        self.reports.lock().unwrap().clone()
    }
}

#[async_trait]
impl StepChannel for MemoryStepChannel {
    async fn publish(&self, report: &StepReport) -> anyhow::Result<()> {
        self.reports.lock().unwrap().push(report.clone());
        Ok(())
    }

    async fn take_action(&self) -> Option<StepAction> {
        self.actions.lock().unwrap().pop_front()
    }
}
