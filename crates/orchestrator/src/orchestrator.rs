//! Foreground orchestrator.
//!
//! [`Orchestrator`] owns the observable state of every job kind, spawns one
//! runner per active kind, and is the only writer of the job store. It
//! never blocks on a runner: runner events arrive on a single channel and
//! are applied one at a time through [`Orchestrator::handle_message`].
//!
//! On [`mount`](Orchestrator::mount) it reattaches to every job the store
//! still marks as in progress, so a rebuilt foreground resumes monitoring
//! without resubmitting anything.

use std::collections::HashMap;
use std::sync::Arc;

use hirebatch_core::job_events::{
    EVENT_JOB_CANCELLED, EVENT_JOB_COMPLETED, EVENT_JOB_FAILED, EVENT_JOB_PROGRESS,
    EVENT_JOB_RUNNING, EVENT_JOB_SUBMITTED,
};
use hirebatch_core::{
    BatchOutcome, BatchRequest, JobCounters, JobId, JobKind, JobSnapshot, JobStatus,
    PersistedJobRecord, Timestamp,
};
use hirebatch_events::{EventBus, JobUpdate};
use hirebatch_gateway::{GatewayError, ProcessorApi};
use hirebatch_runner::{
    adapter_for, spawn_runner, Gateways, PollConfig, RunnerError, RunnerEvent, RunnerFailure,
    RunnerHandle, RunnerId, RunnerMessage,
};
use hirebatch_store::{FileJobStore, JobStore, StoreError};
use tokio::sync::{broadcast, mpsc};

use crate::config::OrchestratorConfig;
use crate::refresh::ReadModelRefresher;

/// Buffer for runner → orchestrator events. Runners wait when it is full.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Errors returned by orchestrator operations.
#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    /// The kind already has a submitted or running job.
    #[error("A {0} job is already in progress")]
    AlreadyRunning(JobKind),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Runner(#[from] RunnerError),

    /// The processor client could not be built.
    #[error("Failed to build processor client: {0}")]
    Gateway(#[from] GatewayError),
}

/// Everything the orchestrator needs from the outside.
pub struct OrchestratorDeps {
    pub gateways: Gateways,
    pub store: Arc<dyn JobStore>,
    pub refresher: Arc<dyn ReadModelRefresher>,
    pub poll: PollConfig,
}

pub struct Orchestrator {
    gateways: Gateways,
    store: Arc<dyn JobStore>,
    refresher: Arc<dyn ReadModelRefresher>,
    poll: PollConfig,
    /// At most one live runner per kind.
    runners: HashMap<JobKind, RunnerHandle>,
    /// Current (or last) job per kind.
    jobs: HashMap<JobKind, JobSnapshot>,
    events_tx: mpsc::Sender<RunnerMessage>,
    events_rx: mpsc::Receiver<RunnerMessage>,
    bus: EventBus,
    next_runner_id: u64,
}

impl Orchestrator {
    /// Build an orchestrator and reattach to any persisted in-progress jobs.
    ///
    /// Records with `in_progress == false` are stale and are cleared.
    pub async fn mount(deps: OrchestratorDeps) -> Result<Self, OrchestratorError> {
        let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let mut orchestrator = Self {
            gateways: deps.gateways,
            store: deps.store,
            refresher: deps.refresher,
            poll: deps.poll,
            runners: HashMap::new(),
            jobs: HashMap::new(),
            events_tx,
            events_rx,
            bus: EventBus::default(),
            next_runner_id: 1,
        };

        let records = match orchestrator.store.read_all().await {
            Ok(records) => records,
            Err(StoreError::Corrupt(e)) => {
                tracing::error!(error = %e, "Job store document is corrupt, discarding session");
                orchestrator.store.end_session().await?;
                Vec::new()
            }
            Err(e) => return Err(e.into()),
        };
        tracing::info!(count = records.len(), "Loaded persisted job records");

        for record in records {
            if record.should_reattach() {
                orchestrator
                    .reattach(record.kind, record.job_id, record.started_at)
                    .await?;
            } else {
                tracing::info!(
                    kind = %record.kind,
                    job_id = %record.job_id,
                    "Clearing stale job record",
                );
                orchestrator.store.clear(record.kind).await?;
            }
        }

        Ok(orchestrator)
    }

    /// Wire the HTTP processor client and the session file store from
    /// `config`.
    pub async fn from_config(
        config: &OrchestratorConfig,
        refresher: Arc<dyn ReadModelRefresher>,
    ) -> Result<Self, OrchestratorError> {
        let api = ProcessorApi::with_timeout(&config.processor_url, config.request_timeout)?;
        let store = FileJobStore::new(&config.store_dir, &config.session_id);
        tracing::info!(
            processor_url = %api.api_url(),
            store = %store.path().display(),
            "Mounting batch orchestrator",
        );

        Self::mount(OrchestratorDeps {
            gateways: Gateways::from_shared(Arc::new(api)),
            store: Arc::new(store),
            refresher,
            poll: config.poll.clone(),
        })
        .await
    }

    // ---- observable state ----

    /// Current (or last) job of `kind`.
    pub fn job(&self, kind: JobKind) -> Option<&JobSnapshot> {
        self.jobs.get(&kind)
    }

    pub fn is_active(&self, kind: JobKind) -> bool {
        self.jobs.get(&kind).is_some_and(JobSnapshot::is_active)
    }

    pub fn has_active_jobs(&self) -> bool {
        self.jobs.values().any(JobSnapshot::is_active)
    }

    /// Receive a [`JobUpdate`] every time a snapshot changes.
    pub fn subscribe(&self) -> broadcast::Receiver<JobUpdate> {
        self.bus.subscribe()
    }

    // ---- commands ----

    /// Hand `request` to a fresh runner for `kind`.
    ///
    /// The job is marked `Submitted` right away; the job id and the store
    /// record follow when the runner reports [`RunnerEvent::Accepted`].
    pub async fn start_batch(
        &mut self,
        kind: JobKind,
        request: BatchRequest,
    ) -> Result<(), OrchestratorError> {
        if self.is_active(kind) {
            return Err(OrchestratorError::AlreadyRunning(kind));
        }

        let runner = self.spawn(kind).await;
        tracing::info!(
            kind = %kind,
            runner = %runner.id(),
            items = request.item_ids.len(),
            "Starting batch",
        );
        runner.submit(request).await?;
        self.runners.insert(kind, runner);

        self.publish(EVENT_JOB_SUBMITTED, JobSnapshot::submitted(kind));
        Ok(())
    }

    /// Stop monitoring `kind`'s job and forget it. Remote work already
    /// accepted is not retracted.
    pub async fn cancel(&mut self, kind: JobKind) -> Result<(), OrchestratorError> {
        let Some(runner) = self.runners.remove(&kind) else {
            tracing::debug!(kind = %kind, "Nothing to cancel");
            return Ok(());
        };
        runner.release().await;
        self.store.clear(kind).await?;

        if let Some(mut snapshot) = self.jobs.get(&kind).cloned() {
            if snapshot.is_active() {
                snapshot.status = JobStatus::Abandoned;
                snapshot.outcome = None;
                tracing::info!(kind = %kind, job_id = ?snapshot.job_id, "Batch cancelled");
                self.publish(EVENT_JOB_CANCELLED, snapshot);
            }
        }
        Ok(())
    }

    /// Detach from every runner before the foreground goes away.
    ///
    /// Events the runners already reported are applied first, so a job
    /// the processor accepted always has its record. Kinds with a
    /// persisted record keep it so the next mount reattaches; their remote
    /// jobs are never cancelled. Kinds without one are simply released.
    pub async fn teardown(mut self) {
        while let Ok(message) = self.events_rx.try_recv() {
            self.handle_message(message).await;
        }

        let mut released = HashMap::new();
        for (kind, runner) in self.runners.drain() {
            let persisted = match self.store.read(kind).await {
                Ok(record) => record.is_some_and(|r| r.should_reattach()),
                Err(e) => {
                    tracing::error!(kind = %kind, error = %e, "Failed to read job record");
                    false
                }
            };
            if persisted {
                tracing::info!(kind = %kind, runner = %runner.id(), "Detaching from running job");
            } else {
                tracing::info!(
                    kind = %kind,
                    runner = %runner.id(),
                    finished = runner.is_finished(),
                    "Releasing runner",
                );
            }
            released.insert(kind, runner.id());
            runner.release().await;
        }

        // Runners may have reported between the drain and their release.
        while let Ok(message) = self.events_rx.try_recv() {
            if released.get(&message.kind) == Some(&message.runner) {
                self.persist_late(message.kind, message.event).await;
            }
        }
        tracing::info!("Batch orchestrator torn down");
    }

    // ---- event loop ----

    /// Wait for the next runner event.
    pub async fn next_message(&mut self) -> Option<RunnerMessage> {
        self.events_rx.recv().await
    }

    /// Wait for one runner event and apply it.
    pub async fn process_next(&mut self) -> bool {
        match self.next_message().await {
            Some(message) => {
                self.handle_message(message).await;
                true
            }
            None => false,
        }
    }

    /// Apply runner events until no kind has an active job.
    pub async fn run_until_idle(&mut self) {
        while self.has_active_jobs() {
            if !self.process_next().await {
                break;
            }
        }
    }

    /// Apply one runner event to the observable state.
    ///
    /// Events from a runner that is no longer the current one for its kind
    /// are dropped.
    pub async fn handle_message(&mut self, message: RunnerMessage) {
        let RunnerMessage {
            runner,
            kind,
            event,
        } = message;

        let current = self.runners.get(&kind).map(RunnerHandle::id);
        if current != Some(runner) {
            tracing::debug!(
                kind = %kind,
                runner = %runner,
                current = ?current,
                "Ignoring event from stale runner",
            );
            return;
        }

        match event {
            RunnerEvent::Ready => {
                tracing::debug!(kind = %kind, runner = %runner, "Runner ready");
            }
            RunnerEvent::Accepted {
                job_id,
                item_count,
                started_at,
            } => self.on_accepted(kind, job_id, item_count, started_at).await,
            RunnerEvent::Progress { job_id, counters } => {
                self.on_progress(kind, job_id, counters);
            }
            RunnerEvent::Complete {
                job_id, counters, ..
            } => self.on_complete(kind, job_id, counters).await,
            RunnerEvent::Error {
                job_id,
                counters,
                failure,
            } => self.on_error(kind, job_id, counters, failure).await,
        }
    }

    // ---- private helpers ----

    async fn on_accepted(
        &mut self,
        kind: JobKind,
        job_id: JobId,
        item_count: u64,
        started_at: Timestamp,
    ) {
        self.persist(kind, &job_id, started_at).await;

        let mut snapshot = self.snapshot_or_submitted(kind);
        snapshot.job_id = Some(job_id);
        snapshot.status = JobStatus::Running;
        snapshot.started_at = Some(started_at);
        snapshot.counters = JobCounters {
            total: item_count,
            ..JobCounters::default()
        };
        self.publish(EVENT_JOB_RUNNING, snapshot);
    }

    fn on_progress(&mut self, kind: JobKind, job_id: JobId, counters: JobCounters) {
        tracing::debug!(
            kind = %kind,
            job_id = %job_id,
            completed = counters.completed,
            failed = counters.failed,
            percent = ?counters.percent(),
            "Batch progress",
        );
        let mut snapshot = self.snapshot_or_submitted(kind);
        snapshot.job_id = Some(job_id);
        snapshot.status = JobStatus::Running;
        snapshot.counters = counters;
        self.publish(EVENT_JOB_PROGRESS, snapshot);
    }

    async fn on_complete(&mut self, kind: JobKind, job_id: JobId, counters: JobCounters) {
        let outcome = BatchOutcome::from_counters(&counters);

        let mut snapshot = self.snapshot_or_submitted(kind);
        snapshot.job_id = Some(job_id);
        snapshot.counters = counters;
        snapshot.outcome = Some(outcome);
        if outcome.has_usable_result() {
            snapshot.status = JobStatus::Complete;
        } else {
            snapshot.status = JobStatus::Failed;
            snapshot.error = Some(if counters.failed > 0 {
                "Every item in the batch failed".into()
            } else {
                "The processor finished without processing any item".into()
            });
        }

        tracing::info!(
            kind = %kind,
            job_id = ?snapshot.job_id,
            completed = counters.completed,
            failed = counters.failed,
            outcome = outcome.label(),
            "Batch finished",
        );

        self.finish(kind).await;

        if !outcome.has_usable_result() {
            self.publish(EVENT_JOB_FAILED, snapshot);
            return;
        }
        self.publish(EVENT_JOB_COMPLETED, snapshot.clone());
        if let Err(e) = self.refresher.refresh(kind, &snapshot).await {
            tracing::warn!(kind = %kind, error = %e, "Read model refresh failed");
        }
    }

    async fn on_error(
        &mut self,
        kind: JobKind,
        job_id: Option<JobId>,
        counters: JobCounters,
        failure: RunnerFailure,
    ) {
        let mut snapshot = self.snapshot_or_submitted(kind);
        if job_id.is_some() {
            snapshot.job_id = job_id;
        }
        snapshot.counters = counters;
        snapshot.error = Some(failure.to_string());
        if failure.is_timeout() {
            snapshot.status = JobStatus::Abandoned;
            snapshot.outcome = Some(BatchOutcome::TimedOut);
        } else {
            snapshot.status = JobStatus::Failed;
            snapshot.outcome = Some(BatchOutcome::Failed);
        }

        tracing::warn!(
            kind = %kind,
            job_id = ?snapshot.job_id,
            error = %failure,
            "Batch did not complete",
        );

        self.finish(kind).await;
        self.publish(EVENT_JOB_FAILED, snapshot);
    }

    async fn persist(&self, kind: JobKind, job_id: &JobId, started_at: Timestamp) {
        let record = PersistedJobRecord::in_progress(kind, job_id.clone(), started_at);
        if let Err(e) = self.store.write(&record).await {
            tracing::error!(kind = %kind, job_id = %job_id, error = %e, "Failed to persist job record");
        }
    }

    /// Store-only handling of an event that arrived after teardown
    /// released its runner.
    async fn persist_late(&self, kind: JobKind, event: RunnerEvent) {
        match event {
            RunnerEvent::Accepted {
                job_id, started_at, ..
            } => self.persist(kind, &job_id, started_at).await,
            RunnerEvent::Complete { .. } | RunnerEvent::Error { .. } => {
                if let Err(e) = self.store.clear(kind).await {
                    tracing::error!(kind = %kind, error = %e, "Failed to clear job record");
                }
            }
            RunnerEvent::Ready | RunnerEvent::Progress { .. } => {}
        }
    }

    /// Drop the persisted record and release the runner of a finished job.
    async fn finish(&mut self, kind: JobKind) {
        if let Err(e) = self.store.clear(kind).await {
            tracing::error!(kind = %kind, error = %e, "Failed to clear job record");
        }
        if let Some(runner) = self.runners.remove(&kind) {
            runner.release().await;
        }
    }

    async fn reattach(
        &mut self,
        kind: JobKind,
        job_id: JobId,
        started_at: Timestamp,
    ) -> Result<(), OrchestratorError> {
        let runner = self.spawn(kind).await;
        tracing::info!(
            kind = %kind,
            job_id = %job_id,
            runner = %runner.id(),
            "Reattaching to in-progress job",
        );
        runner.reattach(job_id.clone(), started_at).await?;
        self.runners.insert(kind, runner);

        self.publish(
            EVENT_JOB_RUNNING,
            JobSnapshot::reattached(kind, job_id, started_at),
        );
        Ok(())
    }

    /// Spawn a runner for `kind` under a fresh id, releasing any previous
    /// one first.
    async fn spawn(&mut self, kind: JobKind) -> RunnerHandle {
        if let Some(previous) = self.runners.remove(&kind) {
            previous.release().await;
        }
        let id = RunnerId(self.next_runner_id);
        self.next_runner_id += 1;
        spawn_runner(
            id,
            adapter_for(kind),
            self.gateways.clone(),
            self.poll.clone(),
            self.events_tx.clone(),
        )
    }

    fn snapshot_or_submitted(&self, kind: JobKind) -> JobSnapshot {
        self.jobs
            .get(&kind)
            .cloned()
            .unwrap_or_else(|| JobSnapshot::submitted(kind))
    }

    fn publish(&mut self, event_type: &str, snapshot: JobSnapshot) {
        self.jobs.insert(snapshot.kind, snapshot.clone());
        self.bus.publish(JobUpdate::new(event_type, snapshot));
    }
}
