//! Rotation engine
//!
//! Drives one transfer job to a terminal state: provisions an identity,
//! supervises a transfer cycle under it, rotates to a fresh identity when
//! the quota is spent, and cleans up whatever it created. Collaborators
//! (directory, runner, status sink, notifier, step channel) are injected,
//! so the whole loop runs against in-memory doubles in tests.
//!
//! Rotation rules:
//! - ephemeral strategy: mint an identity per cycle, delete it once spent
//! - fixed-list strategy: walk a pre-existing roster, never create or
//!   delete anything
//! - a spent identity's deletion must not delay the next cycle; deletions
//!   run detached and are reaped before the job returns
//! - every identity minted during a job is released during wind-down no
//!   matter how the job ended

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use rotor_core::config::{Config, DomainConfig, RotationStrategy};
use rotor_core::domain::cycle::CycleOutcome;
use rotor_core::domain::identity::ProvisionedIdentity;
use rotor_core::domain::job::{JobOutcome, JobReport, JobSpec, RunMode};
use rotor_core::domain::status::JobStatus;
use rotor_core::domain::step::{StepAction, StepReport, StepState};
use rotor_core::size::round2;
use rotor_directory::DirectoryFactory;

use crate::command::build_transfer_command;
use crate::lifecycle::IdentityManager;
use crate::notify::Notifier;
use crate::status::{StatusSink, StatusTracker};
use crate::step::StepChannel;
use crate::supervise::{TransferRequest, TransferRunner};

/// How often the engine polls the step channel for an operator decision.
const STEP_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Operator verdict at a step gate.
enum GateDecision {
    Proceed,
    Abort,
    Cancelled,
}

/// Job orchestrator over injected collaborators.
pub struct RotationEngine {
    config: Config,
    directory_factory: Arc<dyn DirectoryFactory>,
    runner: Arc<dyn TransferRunner>,
    status_sink: Arc<dyn StatusSink>,
    notifier: Arc<dyn Notifier>,
    step_channel: Option<Arc<dyn StepChannel>>,
}

impl RotationEngine {
    pub fn new(
        config: Config,
        directory_factory: Arc<dyn DirectoryFactory>,
        runner: Arc<dyn TransferRunner>,
        status_sink: Arc<dyn StatusSink>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            config,
            directory_factory,
            runner,
            status_sink,
            notifier,
            step_channel: None,
        }
    }

    /// Gates every provision/transfer/delete action on the given channel.
    pub fn with_step_channel(mut self, channel: Arc<dyn StepChannel>) -> Self {
        self.step_channel = Some(channel);
        self
    }

    /// Runs one job to a terminal state.
    ///
    /// # Arguments
    /// * `job` - Source, destination, and directory domain
    /// * `mode` - Normal or a single dry-run rehearsal cycle
    /// * `cancel` - Checked between cycles; an orderly stop, not a kill
    ///
    /// # Returns
    /// The job report. An `Err` means the engine itself failed (directory
    /// down, tool unspawnable); identities created up to that point are
    /// still released first.
    pub async fn execute_job(
        &self,
        job: &JobSpec,
        mode: RunMode,
        cancel: &CancellationToken,
    ) -> Result<JobReport> {
        let domain = self
            .config
            .domain(&job.domain_reference)
            .ok_or_else(|| anyhow!("job references unknown domain {:?}", job.domain_reference))?;
        let directory = self
            .directory_factory
            .open(domain)
            .await
            .with_context(|| format!("failed to open directory for domain {}", domain.domain_name))?;
        let manager = IdentityManager::new(directory, &self.config, domain);

        let mode_label = if mode.is_dry_run() {
            format!("{} (dry-run)", self.config.transfer.command)
        } else {
            self.config.transfer.command.clone()
        };
        let tracker = StatusTracker::new(
            Arc::clone(&self.status_sink),
            JobStatus::starting(&job.label(), &mode_label),
        );
        // Push the starting snapshot out before any work happens.
        tracker.update(|_| {}).await;

        info!(job = %job.label(), mode = %mode_label, "starting transfer job");
        self.notifier
            .notify(&format!("Starting {}: {}", mode_label, job.label()))
            .await;

        let result = match self.config.rotation_strategy {
            RotationStrategy::Ephemeral => {
                self.run_ephemeral(job, domain, &manager, mode, cancel, &tracker)
                    .await
            }
            RotationStrategy::FixedList => {
                self.run_fixed_list(job, domain, &manager, mode, cancel, &tracker)
                    .await
            }
        };

        match result {
            Ok(report) => {
                let label = terminal_label(report.outcome);
                {
                    let msg = label.to_string();
                    let total = round2(report.total_transferred_gb);
                    tracker
                        .update(move |s| {
                            s.is_running = false;
                            s.status_msg = msg;
                            s.total_transferred_gb = total;
                            s.speed.clear();
                            s.progress.clear();
                        })
                        .await;
                }
                info!(
                    job = %job.label(),
                    outcome = ?report.outcome,
                    cycles = report.cycles_run,
                    moved_gb = report.total_transferred_gb,
                    "transfer job finished"
                );
                self.notifier
                    .notify(&format!(
                        "{}: {} ({:.2} GB in {} cycles)",
                        notification_verb(report.outcome),
                        job.label(),
                        report.total_transferred_gb,
                        report.cycles_run
                    ))
                    .await;
                Ok(report)
            }
            Err(e) => {
                let msg = format!("Failed: {e:#}");
                tracker
                    .update(move |s| {
                        s.is_running = false;
                        s.status_msg = msg;
                    })
                    .await;
                self.notifier
                    .notify(&format!("Job failed: {} ({e:#})", job.label()))
                    .await;
                Err(e)
            }
        }
    }

    /// The ephemeral strategy: mint, transfer, delete, repeat.
    async fn run_ephemeral(
        &self,
        job: &JobSpec,
        domain: &DomainConfig,
        manager: &IdentityManager,
        mode: RunMode,
        cancel: &CancellationToken,
        tracker: &StatusTracker,
    ) -> Result<JobReport> {
        let quota_gb = self.config.upload_limit_gb();
        let max_cycles = self.config.max_identities_per_cycle;
        let stall = Duration::from_secs(self.config.stall_timeout_minutes * 60);
        // Provisioning the next identity overlaps the running transfer,
        // except in dry-run (one cycle only) and step mode (every
        // provision must wait at its gate).
        let overlap = !mode.is_dry_run() && self.step_channel.is_none();

        if cancel.is_cancelled() {
            return Ok(JobReport {
                outcome: JobOutcome::Cancelled,
                cycles_run: 0,
                total_transferred_gb: 0.0,
            });
        }

        let mut current = match self.approve_step("provision", "fresh identity", cancel).await? {
            GateDecision::Proceed => match manager.provision().await {
                Ok(identity) => {
                    self.report_step(StepReport::new(
                        "provision",
                        &identity.email,
                        StepState::Success,
                    ))
                    .await;
                    identity
                }
                Err(e) => {
                    self.report_step(
                        StepReport::new("provision", "fresh identity", StepState::Failed)
                            .with_error(&format!("{e:#}")),
                    )
                    .await;
                    return Err(e);
                }
            },
            GateDecision::Abort => {
                return Ok(JobReport {
                    outcome: JobOutcome::Aborted,
                    cycles_run: 0,
                    total_transferred_gb: 0.0,
                });
            }
            GateDecision::Cancelled => {
                return Ok(JobReport {
                    outcome: JobOutcome::Cancelled,
                    cycles_run: 0,
                    total_transferred_gb: 0.0,
                });
            }
        };

        let mut cycles_run: u32 = 0;
        let mut total_gb: f64 = 0.0;
        let mut failure: Option<anyhow::Error> = None;
        let mut next_handle: Option<JoinHandle<Result<ProvisionedIdentity>>> = None;
        let mut reaping: Vec<JoinHandle<()>> = Vec::new();

        let outcome = loop {
            let detail = format!("cycle {} as {}", cycles_run + 1, current.email);
            match self.approve_step("transfer", &detail, cancel).await? {
                GateDecision::Proceed => {}
                GateDecision::Abort => break JobOutcome::Aborted,
                GateDecision::Cancelled => break JobOutcome::Cancelled,
            }

            let command = build_transfer_command(&self.config, domain, job, &current.email, mode);
            {
                let email = current.email.clone();
                tracker
                    .update(move |s| {
                        s.current_identity = email;
                        s.status_msg = "Transferring".to_string();
                        s.speed.clear();
                        s.progress.clear();
                    })
                    .await;
            }

            if overlap && cycles_run + 1 < max_cycles && next_handle.is_none() {
                let fresh = manager.clone();
                next_handle = Some(tokio::spawn(async move { fresh.provision().await }));
            }

            let request = TransferRequest {
                command,
                identity: current.email.clone(),
                quota_gb,
                stall_timeout: stall,
            };
            let result = match self.runner.run(request, tracker).await {
                Ok(result) => result,
                Err(e) => {
                    self.report_step(
                        StepReport::new("transfer", &current.email, StepState::Failed)
                            .with_error(&format!("{e:#}")),
                    )
                    .await;
                    failure = Some(e);
                    break JobOutcome::Aborted;
                }
            };

            cycles_run += 1;
            total_gb += result.transferred_gb;
            {
                let total = round2(total_gb);
                tracker.update(move |s| s.total_transferred_gb = total).await;
            }

            match result.outcome {
                CycleOutcome::Done => {
                    self.report_step(StepReport::new(
                        "transfer",
                        &current.email,
                        StepState::Success,
                    ))
                    .await;
                    break JobOutcome::Succeeded;
                }
                CycleOutcome::Error => {
                    self.report_step(
                        StepReport::new("transfer", &current.email, StepState::Failed)
                            .with_error(&format!("tool exit {:?}", result.exit_code)),
                    )
                    .await;
                    warn!(
                        identity = %current.email,
                        exit = ?result.exit_code,
                        "transfer cycle failed"
                    );
                    break JobOutcome::Aborted;
                }
                CycleOutcome::QuotaReached | CycleOutcome::Stalled => {
                    self.report_step(StepReport::new(
                        "transfer",
                        &current.email,
                        StepState::Success,
                    ))
                    .await;
                    if mode.is_dry_run() {
                        break JobOutcome::Succeeded;
                    }
                    if cycles_run >= max_cycles {
                        break JobOutcome::Exhausted;
                    }
                    if cancel.is_cancelled() {
                        break JobOutcome::Cancelled;
                    }

                    info!(
                        identity = %current.email,
                        moved_gb = result.transferred_gb,
                        outcome = ?result.outcome,
                        "rotating identity"
                    );
                    self.notifier
                        .notify(&format!(
                            "Rotating identity after {:.2} GB (cycle {}/{})",
                            result.transferred_gb, cycles_run, max_cycles
                        ))
                        .await;

                    match self.approve_step("delete", &current.email, cancel).await? {
                        GateDecision::Proceed => {}
                        GateDecision::Abort => break JobOutcome::Aborted,
                        GateDecision::Cancelled => break JobOutcome::Cancelled,
                    }
                    reaping.push(self.discard(manager, current.email.clone()));
                    self.report_step(StepReport::new("delete", &current.email, StepState::Success))
                        .await;

                    current = if let Some(handle) = next_handle.take() {
                        match handle.await {
                            Ok(Ok(identity)) => identity,
                            Ok(Err(e)) => {
                                failure = Some(e);
                                break JobOutcome::Aborted;
                            }
                            Err(e) => {
                                failure = Some(anyhow!("background provision task failed: {e}"));
                                break JobOutcome::Aborted;
                            }
                        }
                    } else {
                        match self.approve_step("provision", "fresh identity", cancel).await? {
                            GateDecision::Proceed => match manager.provision().await {
                                Ok(identity) => {
                                    self.report_step(StepReport::new(
                                        "provision",
                                        &identity.email,
                                        StepState::Success,
                                    ))
                                    .await;
                                    identity
                                }
                                Err(e) => {
                                    self.report_step(
                                        StepReport::new(
                                            "provision",
                                            "fresh identity",
                                            StepState::Failed,
                                        )
                                        .with_error(&format!("{e:#}")),
                                    )
                                    .await;
                                    failure = Some(e);
                                    break JobOutcome::Aborted;
                                }
                            },
                            GateDecision::Abort => break JobOutcome::Aborted,
                            GateDecision::Cancelled => break JobOutcome::Cancelled,
                        }
                    };
                }
            }
        };

        // Wind-down. Whatever the loop still holds is released: the
        // in-flight spare first, then the current identity, then the
        // detached deletions get reaped.
        if let Some(handle) = next_handle.take() {
            match handle.await {
                Ok(Ok(identity)) => self.release_quietly(manager, &identity.email).await,
                Ok(Err(e)) => warn!("background provision failed during wind-down: {e:#}"),
                Err(e) => warn!("background provision task failed: {e}"),
            }
        }
        self.release_quietly(manager, &current.email).await;
        for handle in reaping {
            if let Err(e) = handle.await {
                warn!("identity deletion task failed: {e}");
            }
        }

        if let Some(e) = failure {
            return Err(e);
        }

        Ok(JobReport {
            outcome,
            cycles_run,
            total_transferred_gb: total_gb,
        })
    }

    /// The fixed-list strategy: walk the roster, one cycle each.
    async fn run_fixed_list(
        &self,
        job: &JobSpec,
        domain: &DomainConfig,
        manager: &IdentityManager,
        mode: RunMode,
        cancel: &CancellationToken,
        tracker: &StatusTracker,
    ) -> Result<JobReport> {
        let roster = manager.load_roster(&self.config).await?;
        if roster.is_empty() {
            anyhow::bail!("fixed-list rotation found no usable identities");
        }
        info!(count = roster.len(), "walking fixed identity roster");

        let quota_gb = self.config.upload_limit_gb();
        let stall = Duration::from_secs(self.config.stall_timeout_minutes * 60);
        let mut cycles_run: u32 = 0;
        let mut total_gb: f64 = 0.0;
        // Running out of roster without finishing is the fixed-list
        // version of exhausting the identity budget.
        let mut outcome = JobOutcome::Exhausted;

        for email in &roster {
            if cancel.is_cancelled() {
                outcome = JobOutcome::Cancelled;
                break;
            }
            let detail = format!("cycle {} as {}", cycles_run + 1, email);
            match self.approve_step("transfer", &detail, cancel).await? {
                GateDecision::Proceed => {}
                GateDecision::Abort => {
                    outcome = JobOutcome::Aborted;
                    break;
                }
                GateDecision::Cancelled => {
                    outcome = JobOutcome::Cancelled;
                    break;
                }
            }

            let command = build_transfer_command(&self.config, domain, job, email, mode);
            {
                let email = email.clone();
                tracker
                    .update(move |s| {
                        s.current_identity = email;
                        s.status_msg = "Transferring".to_string();
                        s.speed.clear();
                        s.progress.clear();
                    })
                    .await;
            }

            let request = TransferRequest {
                command,
                identity: email.clone(),
                quota_gb,
                stall_timeout: stall,
            };
            // Nothing to clean up on failure here; the roster is not ours
            // to delete.
            let result = self.runner.run(request, tracker).await?;

            cycles_run += 1;
            total_gb += result.transferred_gb;
            {
                let total = round2(total_gb);
                tracker.update(move |s| s.total_transferred_gb = total).await;
            }

            match result.outcome {
                CycleOutcome::Done => {
                    self.report_step(StepReport::new("transfer", email, StepState::Success))
                        .await;
                    outcome = JobOutcome::Succeeded;
                    break;
                }
                CycleOutcome::Error => {
                    self.report_step(
                        StepReport::new("transfer", email, StepState::Failed)
                            .with_error(&format!("tool exit {:?}", result.exit_code)),
                    )
                    .await;
                    warn!(identity = %email, exit = ?result.exit_code, "transfer cycle failed");
                    outcome = JobOutcome::Aborted;
                    break;
                }
                CycleOutcome::QuotaReached | CycleOutcome::Stalled => {
                    self.report_step(StepReport::new("transfer", email, StepState::Success))
                        .await;
                    if mode.is_dry_run() {
                        outcome = JobOutcome::Succeeded;
                        break;
                    }
                    self.notifier
                        .notify(&format!(
                            "Quota spent for {email}, moving to the next roster identity"
                        ))
                        .await;
                }
            }
        }

        Ok(JobReport {
            outcome,
            cycles_run,
            total_transferred_gb: total_gb,
        })
    }

    /// Waits at a step gate when a channel is attached.
    async fn approve_step(
        &self,
        step: &str,
        detail: &str,
        cancel: &CancellationToken,
    ) -> Result<GateDecision> {
        let Some(channel) = &self.step_channel else {
            return Ok(GateDecision::Proceed);
        };

        channel
            .publish(&StepReport::new(step, detail, StepState::WaitingUser))
            .await
            .context("failed to publish step gate")?;

        loop {
            if cancel.is_cancelled() {
                return Ok(GateDecision::Cancelled);
            }
            if let Some(action) = channel.take_action().await {
                return match action {
                    StepAction::Continue => {
                        channel
                            .publish(&StepReport::new(step, detail, StepState::Running))
                            .await
                            .context("failed to publish step gate")?;
                        Ok(GateDecision::Proceed)
                    }
                    StepAction::Abort => {
                        info!(step, "operator aborted at step gate");
                        Ok(GateDecision::Abort)
                    }
                };
            }
            tokio::time::sleep(STEP_POLL_INTERVAL).await;
        }
    }

    /// Publishes a step result when a channel is attached. Advisory only;
    /// failures are logged.
    async fn report_step(&self, report: StepReport) {
        if let Some(channel) = &self.step_channel {
            if let Err(e) = channel.publish(&report).await {
                warn!("failed to publish step report: {e:#}");
            }
        }
    }

    /// Deletes a spent identity without blocking the rotation.
    fn discard(&self, manager: &IdentityManager, email: String) -> JoinHandle<()> {
        let manager = manager.clone();
        tokio::spawn(async move {
            if let Err(e) = manager.release(&email).await {
                warn!(email = %email, "failed to delete spent identity: {e:#}");
            }
        })
    }

    async fn release_quietly(&self, manager: &IdentityManager, email: &str) {
        if let Err(e) = manager.release(email).await {
            warn!(email = %email, "failed to release identity: {e:#}");
        }
    }
}

fn terminal_label(outcome: JobOutcome) -> &'static str {
    match outcome {
        JobOutcome::Succeeded => "Completed",
        JobOutcome::Exhausted => "Identity budget exhausted",
        JobOutcome::Aborted => "Aborted",
        JobOutcome::Cancelled => "Cancelled",
    }
}

fn notification_verb(outcome: JobOutcome) -> &'static str {
    match outcome {
        JobOutcome::Succeeded => "Job finished",
        JobOutcome::Exhausted => "Job stopped (identity budget exhausted)",
        JobOutcome::Aborted => "Job aborted",
        JobOutcome::Cancelled => "Job cancelled",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use rotor_core::domain::cycle::CycleResult;
    use rotor_directory::DirectoryProvider;

    use crate::status::MemoryStatusSink;
    use crate::testing::{
        FixedDirectoryFactory, MemoryStepChannel, RecordingDirectory, RecordingNotifier,
        ScriptedRunner,
    };

    struct Harness {
        engine: RotationEngine,
        directory: Arc<RecordingDirectory>,
        runner: Arc<ScriptedRunner>,
        sink: MemoryStatusSink,
        notifier: Arc<RecordingNotifier>,
    }

    fn base_config() -> Config {
        Config {
            max_identities_per_cycle: 3,
            domains: vec![DomainConfig {
                domain_name: "example.org".to_string(),
                admin_email: "admin@example.org".to_string(),
                credential_path: "keys/example.json".to_string(),
                remote_credential_path: None,
                group_email: "uploaders@example.org".to_string(),
            }],
            ..Config::default()
        }
    }

    fn job() -> JobSpec {
        JobSpec {
            source: "local:/archive".to_string(),
            dest: "target:backup".to_string(),
            domain_reference: "example.org".to_string(),
        }
    }

    fn harness(config: Config, results: Vec<CycleResult>) -> Harness {
        harness_with(config, Arc::new(RecordingDirectory::new()), results)
    }

    fn harness_with(
        config: Config,
        directory: Arc<RecordingDirectory>,
        results: Vec<CycleResult>,
    ) -> Harness {
        let runner = Arc::new(ScriptedRunner::with_results(results));
        let sink = MemoryStatusSink::new();
        let notifier = Arc::new(RecordingNotifier::default());
        let provider: Arc<dyn DirectoryProvider> = Arc::clone(&directory) as _;
        let engine = RotationEngine::new(
            config,
            Arc::new(FixedDirectoryFactory::new(provider)),
            Arc::clone(&runner) as _,
            Arc::new(sink.clone()),
            Arc::clone(&notifier) as _,
        );
        Harness {
            engine,
            directory,
            runner,
            sink,
            notifier,
        }
    }

    fn quota(gb: f64) -> CycleResult {
        CycleResult::new(CycleOutcome::QuotaReached, gb, Some(8))
    }

    fn done(gb: f64) -> CycleResult {
        CycleResult::new(CycleOutcome::Done, gb, Some(0))
    }

    fn errored(gb: f64) -> CycleResult {
        CycleResult::new(CycleOutcome::Error, gb, Some(3))
    }

    #[tokio::test]
    async fn test_ephemeral_stops_at_identity_budget() {
        let h = harness(base_config(), vec![quota(233.3), quota(233.3), quota(233.3)]);

        let report = h
            .engine
            .execute_job(&job(), RunMode::Normal, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.outcome, JobOutcome::Exhausted);
        assert_eq!(report.cycles_run, 3);
        assert!((report.total_transferred_gb - 699.9).abs() < 1e-6);
        assert_eq!(h.directory.created().len(), 3);
        let mut deleted = h.directory.deleted();
        deleted.sort();
        assert_eq!(
            deleted,
            vec![
                "worker1@example.org",
                "worker2@example.org",
                "worker3@example.org"
            ]
        );
        let last = h.sink.last().unwrap();
        assert!(!last.is_running);
        assert_eq!(last.status_msg, "Identity budget exhausted");
    }

    #[tokio::test]
    async fn test_ephemeral_completes_early() {
        let mut config = base_config();
        config.max_identities_per_cycle = 10;
        let h = harness(config, vec![quota(650.0), quota(640.0), done(300.0)]);

        let report = h
            .engine
            .execute_job(&job(), RunMode::Normal, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.outcome, JobOutcome::Succeeded);
        assert_eq!(report.cycles_run, 3);
        assert_eq!(report.total_transferred_gb, 1590.0);
        // Every minted identity is gone by the end, including the spare
        // provisioned ahead of the final cycle.
        assert_eq!(h.directory.created().len(), h.directory.deleted().len());
        assert!(h.notifier.messages().iter().any(|m| m.contains("finished")));
        assert_eq!(h.sink.last().unwrap().status_msg, "Completed");
    }

    #[tokio::test]
    async fn test_cycle_error_aborts_with_cleanup() {
        let mut config = base_config();
        config.max_identities_per_cycle = 5;
        let h = harness(config, vec![quota(100.0), errored(5.0)]);

        let report = h
            .engine
            .execute_job(&job(), RunMode::Normal, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.outcome, JobOutcome::Aborted);
        assert_eq!(report.cycles_run, 2);
        assert_eq!(report.total_transferred_gb, 105.0);
        // One identity per cycle plus the spare, all released.
        assert_eq!(h.directory.created().len(), 3);
        assert_eq!(h.directory.deleted().len(), 3);
        assert_eq!(h.sink.last().unwrap().status_msg, "Aborted");
        assert!(h.notifier.messages().iter().any(|m| m.contains("aborted")));
    }

    #[tokio::test]
    async fn test_protected_identity_survives() {
        let mut config = base_config();
        config.max_identities_per_cycle = 10;
        config.protected_identities = vec![" Worker1@Example.ORG ".to_string()];
        let h = harness(config, vec![quota(650.0), done(10.0)]);

        let report = h
            .engine
            .execute_job(&job(), RunMode::Normal, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.outcome, JobOutcome::Succeeded);
        assert!(
            !h.directory
                .deleted()
                .iter()
                .any(|e| e == "worker1@example.org")
        );
        assert_eq!(
            h.directory.deleted().len(),
            h.directory.created().len() - 1
        );
    }

    #[tokio::test]
    async fn test_fixed_list_walks_roster_in_order() {
        let mut config = base_config();
        config.rotation_strategy = RotationStrategy::FixedList;
        let directory = Arc::new(RecordingDirectory::with_listing(&[
            "a@example.org",
            "b@example.org",
            "c@example.org",
            "d@example.org",
            "e@example.org",
        ]));
        let h = harness_with(config, directory, vec![quota(1.0), quota(2.0), quota(3.0)]);

        let report = h
            .engine
            .execute_job(&job(), RunMode::Normal, &CancellationToken::new())
            .await
            .unwrap();

        // The roster is capped at the cycle budget and walked in order.
        assert_eq!(report.outcome, JobOutcome::Exhausted);
        assert_eq!(report.cycles_run, 3);
        assert_eq!(
            h.runner.identities(),
            vec!["a@example.org", "b@example.org", "c@example.org"]
        );
        assert!(h.directory.created().is_empty());
        assert!(h.directory.deleted().is_empty());
        let first = &h.runner.requests()[0];
        assert!(
            first
                .command
                .argv
                .contains(&"--drive-impersonate=a@example.org".to_string())
        );
    }

    #[tokio::test]
    async fn test_fixed_list_finishes_on_done() {
        let mut config = base_config();
        config.rotation_strategy = RotationStrategy::FixedList;
        let directory = Arc::new(RecordingDirectory::with_listing(&[
            "a@example.org",
            "b@example.org",
            "c@example.org",
        ]));
        let h = harness_with(config, directory, vec![quota(5.0), done(1.0)]);

        let report = h
            .engine
            .execute_job(&job(), RunMode::Normal, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.outcome, JobOutcome::Succeeded);
        assert_eq!(report.cycles_run, 2);
        assert_eq!(report.total_transferred_gb, 6.0);
        assert!(h.directory.deleted().is_empty());
    }

    #[tokio::test]
    async fn test_step_gate_abort_stops_before_transfer() {
        let channel = Arc::new(MemoryStepChannel::default());
        channel.queue_action(StepAction::Continue); // provision gate
        channel.queue_action(StepAction::Abort); // transfer gate
        let directory = Arc::new(RecordingDirectory::new());
        let runner = Arc::new(ScriptedRunner::with_results(vec![done(1.0)]));
        let sink = MemoryStatusSink::new();
        let provider: Arc<dyn DirectoryProvider> = Arc::clone(&directory) as _;
        let engine = RotationEngine::new(
            base_config(),
            Arc::new(FixedDirectoryFactory::new(provider)),
            Arc::clone(&runner) as _,
            Arc::new(sink.clone()),
            Arc::new(RecordingNotifier::default()),
        )
        .with_step_channel(Arc::clone(&channel) as _);

        let report = engine
            .execute_job(&job(), RunMode::Normal, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.outcome, JobOutcome::Aborted);
        assert!(runner.requests().is_empty());
        // The aborted job still releases the identity it minted.
        assert_eq!(directory.created().len(), 1);
        assert_eq!(directory.deleted().len(), 1);
        let reports = channel.reports();
        assert_eq!(reports[0].step, "provision");
        assert_eq!(reports[0].status, StepState::WaitingUser);
        assert!(reports.iter().any(|r| r.step == "transfer"));
    }

    #[tokio::test]
    async fn test_cancellation_between_cycles() {
        let mut config = base_config();
        config.max_identities_per_cycle = 5;
        let h = harness(config, vec![quota(100.0), quota(100.0)]);
        let token = CancellationToken::new();
        h.runner.cancel_after(1, token.clone());

        let report = h
            .engine
            .execute_job(&job(), RunMode::Normal, &token)
            .await
            .unwrap();

        assert_eq!(report.outcome, JobOutcome::Cancelled);
        assert_eq!(report.cycles_run, 1);
        // Current and pre-provisioned identities are both released.
        assert_eq!(h.directory.created().len(), 2);
        assert_eq!(h.directory.deleted().len(), 2);
        assert_eq!(h.sink.last().unwrap().status_msg, "Cancelled");
    }

    #[tokio::test]
    async fn test_cancellation_before_start() {
        let h = harness(base_config(), vec![]);
        let token = CancellationToken::new();
        token.cancel();

        let report = h
            .engine
            .execute_job(&job(), RunMode::Normal, &token)
            .await
            .unwrap();

        assert_eq!(report.outcome, JobOutcome::Cancelled);
        assert_eq!(report.cycles_run, 0);
        assert!(h.directory.created().is_empty());
        assert!(h.runner.requests().is_empty());
    }

    #[tokio::test]
    async fn test_dry_run_is_a_single_rehearsal() {
        let h = harness(base_config(), vec![quota(1.2)]);

        let report = h
            .engine
            .execute_job(&job(), RunMode::DryRun, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.outcome, JobOutcome::Succeeded);
        assert_eq!(report.cycles_run, 1);
        // No spare gets provisioned for a rehearsal.
        assert_eq!(h.directory.created().len(), 1);
        assert_eq!(h.directory.deleted().len(), 1);
        let argv = &h.runner.requests()[0].command.argv;
        assert_eq!(argv.last().map(String::as_str), Some("--dry-run"));
        assert!(h.sink.snapshots()[0].mode.contains("dry-run"));
    }

    #[tokio::test]
    async fn test_unknown_domain_is_rejected() {
        let h = harness(base_config(), vec![]);
        let mut bad = job();
        bad.domain_reference = "missing.org".to_string();

        let err = h
            .engine
            .execute_job(&bad, RunMode::Normal, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(err.to_string().contains("missing.org"));
    }

    #[tokio::test]
    async fn test_provision_failure_surfaces_error() {
        let directory = Arc::new(RecordingDirectory::new());
        directory.fail_creates();
        let h = harness_with(base_config(), directory, vec![]);

        let err = h
            .engine
            .execute_job(&job(), RunMode::Normal, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(format!("{err:#}").contains("create"));
        // The terminal status still lands on failure.
        let last = h.sink.last().unwrap();
        assert!(!last.is_running);
        assert!(last.status_msg.starts_with("Failed"));
    }
}
