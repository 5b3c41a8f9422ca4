//! The generic runner task.
//!
//! [`spawn_runner`] starts a Tokio task that owns one job kind's
//! submit-and-poll lifecycle and returns a [`RunnerHandle`] for sending it
//! commands. The task emits [`RunnerEvent::Ready`] first, then serves one
//! command at a time: a submit or reattach runs the poll loop to a
//! terminal event before the next command is read. While polling, only
//! cancellation is honoured.
//!
//! The submission call and each progress call are raced against the
//! runner's [`CancellationToken`], so a cancelled runner drops any
//! in-flight request and never reports its result.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use hirebatch_core::{BatchRequest, Job, JobCounters, JobId, JobKind, JobStatus, Timestamp};
use hirebatch_gateway::{ProgressGateway, SubmissionGateway};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::adapter::JobAdapter;
use crate::messages::{RunnerCommand, RunnerEvent, RunnerFailure, RunnerId, RunnerMessage};
use crate::poll::{PollConfig, PollCycle, PollDecision, PollState, ProgressWatermark};

/// Inbound command buffer per runner.
const COMMAND_CHANNEL_CAPACITY: usize = 8;

/// How long [`RunnerHandle::release`] waits for the task before aborting it.
const RELEASE_TIMEOUT: Duration = Duration::from_secs(5);

/// The two processor seams a runner talks to.
#[derive(Clone)]
pub struct Gateways {
    pub submission: Arc<dyn SubmissionGateway>,
    pub progress: Arc<dyn ProgressGateway>,
}

impl Gateways {
    pub fn new(
        submission: Arc<dyn SubmissionGateway>,
        progress: Arc<dyn ProgressGateway>,
    ) -> Self {
        Self {
            submission,
            progress,
        }
    }

    /// Use one value for both seams.
    pub fn from_shared<G>(gateway: Arc<G>) -> Self
    where
        G: SubmissionGateway + ProgressGateway + 'static,
    {
        Self {
            submission: gateway.clone(),
            progress: gateway,
        }
    }
}

/// Errors from talking to a runner.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    /// The runner task has exited and no longer accepts commands.
    #[error("{0} has shut down")]
    Closed(RunnerId),
}

/// Foreground handle to a spawned runner.
pub struct RunnerHandle {
    id: RunnerId,
    kind: JobKind,
    commands: mpsc::Sender<RunnerCommand>,
    cancel: CancellationToken,
    task: tokio::task::JoinHandle<()>,
}

impl RunnerHandle {
    pub fn id(&self) -> RunnerId {
        self.id
    }

    pub fn kind(&self) -> JobKind {
        self.kind
    }

    /// Submit a batch. The job id arrives later as [`RunnerEvent::Accepted`].
    pub async fn submit(&self, request: BatchRequest) -> Result<(), RunnerError> {
        self.send(RunnerCommand::Submit { request }).await
    }

    /// Start polling a job that was submitted before a reload.
    pub async fn reattach(&self, job_id: JobId, started_at: Timestamp) -> Result<(), RunnerError> {
        self.send(RunnerCommand::Reattach { job_id, started_at })
            .await
    }

    /// Stop polling. Remote work already accepted is not retracted.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Cancel the runner and wait briefly for its task to exit.
    pub async fn release(mut self) {
        self.cancel.cancel();
        if tokio::time::timeout(RELEASE_TIMEOUT, &mut self.task)
            .await
            .is_err()
        {
            tracing::warn!(runner = %self.id, kind = %self.kind, "Runner did not stop in time, aborting");
            self.task.abort();
        }
    }

    async fn send(&self, command: RunnerCommand) -> Result<(), RunnerError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| RunnerError::Closed(self.id))
    }
}

/// Spawn a runner for `adapter.kind()` that reports on `events`.
pub fn spawn_runner(
    id: RunnerId,
    adapter: Arc<dyn JobAdapter>,
    gateways: Gateways,
    config: PollConfig,
    events: mpsc::Sender<RunnerMessage>,
) -> RunnerHandle {
    let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
    let cancel = CancellationToken::new();
    let kind = adapter.kind();

    let task = RunnerTask {
        id,
        adapter,
        gateways,
        config: config.normalized(),
        commands: command_rx,
        events,
        cancel: cancel.clone(),
        state: PollState::Idle,
    };
    let task = tokio::spawn(task.run());

    RunnerHandle {
        id,
        kind,
        commands: command_tx,
        cancel,
        task,
    }
}

// ---------------------------------------------------------------------------
// Task internals
// ---------------------------------------------------------------------------

/// Whether the runner should keep serving commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Stop,
}

struct RunnerTask {
    id: RunnerId,
    adapter: Arc<dyn JobAdapter>,
    gateways: Gateways,
    config: PollConfig,
    commands: mpsc::Receiver<RunnerCommand>,
    events: mpsc::Sender<RunnerMessage>,
    cancel: CancellationToken,
    state: PollState,
}

impl RunnerTask {
    fn kind(&self) -> JobKind {
        self.adapter.kind()
    }

    async fn run(mut self) {
        tracing::info!(runner = %self.id, kind = %self.kind(), "Runner started");

        if self.emit(RunnerEvent::Ready).await == Flow::Continue {
            loop {
                let command = tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => break,
                    command = self.commands.recv() => command,
                };

                let flow = match command {
                    None | Some(RunnerCommand::Cancel) => break,
                    Some(RunnerCommand::Submit { request }) => self.submit(request).await,
                    Some(RunnerCommand::Reattach { job_id, started_at }) => {
                        tracing::info!(
                            runner = %self.id,
                            kind = %self.kind(),
                            job_id = %job_id,
                            "Reattaching to persisted job",
                        );
                        let job = Job::new(job_id, self.kind(), started_at);
                        self.monitor(job, 0).await
                    }
                };

                if flow == Flow::Stop {
                    break;
                }
            }
        }

        if self.state == PollState::Polling {
            self.state = PollState::ExternallyCancelled;
        }
        tracing::info!(
            runner = %self.id,
            kind = %self.kind(),
            state = ?self.state,
            "Runner exited",
        );
    }

    /// Submit a batch and, on success, poll it to a terminal event.
    async fn submit(&mut self, request: BatchRequest) -> Flow {
        let payload = match self.adapter.build_payload(&request) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(kind = %self.kind(), error = %e, "Rejecting invalid batch request");
                return self
                    .fail(
                        None,
                        JobCounters::default(),
                        RunnerFailure::InvalidRequest {
                            detail: e.to_string(),
                        },
                    )
                    .await;
            }
        };

        let endpoint = self.adapter.submit_endpoint();
        tracing::info!(
            runner = %self.id,
            kind = %self.kind(),
            items = request.item_ids.len(),
            target_id = %request.target_id,
            "Submitting batch",
        );

        let result = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Flow::Stop,
            result = self.gateways.submission.submit(endpoint, &payload) => result,
        };

        let receipt = match result {
            Ok(receipt) => receipt,
            Err(e) => {
                tracing::error!(kind = %self.kind(), error = %e, "Batch submission failed");
                return self
                    .fail(
                        None,
                        JobCounters::default(),
                        RunnerFailure::Submission {
                            detail: e.to_string(),
                        },
                    )
                    .await;
            }
        };

        let started_at = Utc::now();
        tracing::info!(
            kind = %self.kind(),
            job_id = %receipt.job_id,
            item_count = receipt.item_count,
            "Batch accepted",
        );

        let accepted = RunnerEvent::Accepted {
            job_id: receipt.job_id.clone(),
            item_count: receipt.item_count,
            started_at,
        };
        if self.emit(accepted).await == Flow::Stop {
            return Flow::Stop;
        }

        let job = Job::new(receipt.job_id, self.kind(), started_at);
        self.monitor(job, receipt.item_count).await
    }

    /// Poll `job` until it completes, times out, disappears, or the runner
    /// is cancelled.
    async fn monitor(&mut self, mut job: Job, initial_total: u64) -> Flow {
        self.state = PollState::Polling;
        let endpoint = self.adapter.progress_endpoint(&job.id);
        let mut cycle = PollCycle::new();
        let mut watermark = ProgressWatermark::new(initial_total);

        tracing::debug!(
            kind = %self.kind(),
            job_id = %job.id,
            max_attempts = self.config.max_attempts,
            budget_secs = self.config.budget().as_secs(),
            "Polling job",
        );

        let mut ticker = tokio::time::interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return self.cancelled(&job),
                command = self.commands.recv() => match command {
                    None | Some(RunnerCommand::Cancel) => return self.cancelled(&job),
                    Some(_) => {
                        tracing::warn!(
                            kind = %self.kind(),
                            job_id = %job.id,
                            "Runner busy with a job, ignoring command",
                        );
                        continue;
                    }
                },
                _ = ticker.tick() => {}
            }

            let result = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return self.cancelled(&job),
                result = self.gateways.progress.fetch_progress(&endpoint) => result,
            };

            let decision = match result {
                Ok(Some(snapshot)) => {
                    match watermark.advance(&snapshot) {
                        Some(counters) => {
                            job.counters = counters;
                            let progress = RunnerEvent::Progress {
                                job_id: job.id.clone(),
                                counters,
                            };
                            if self.emit(progress).await == Flow::Stop {
                                return Flow::Stop;
                            }
                        }
                        None => tracing::debug!(
                            kind = %self.kind(),
                            job_id = %job.id,
                            completed = snapshot.completed,
                            failed = snapshot.failed,
                            "Progress went backwards, not publishing",
                        ),
                    }
                    cycle.observe(&snapshot, &self.config)
                }
                Ok(None) => {
                    tracing::warn!(
                        kind = %self.kind(),
                        job_id = %job.id,
                        "Processor has no record of job",
                    );
                    // The poll loop ended on a definitive answer, so the
                    // state is Complete; the failure travels in the event.
                    self.state = PollState::Complete;
                    job.status = JobStatus::Failed;
                    return self
                        .fail(Some(job.id), watermark.current(), RunnerFailure::JobNotFound)
                        .await;
                }
                Err(e) => {
                    tracing::warn!(
                        kind = %self.kind(),
                        job_id = %job.id,
                        attempt = cycle.attempt() + 1,
                        error = %e,
                        "Progress check failed, will retry",
                    );
                    cycle.record_failure(&self.config)
                }
            };

            tracing::debug!(
                kind = %self.kind(),
                job_id = %job.id,
                attempt = cycle.attempt(),
                stable_repeats = cycle.stable_repeats(),
                decision = ?decision,
                "Poll cycle",
            );

            match decision {
                PollDecision::Continue => {}
                PollDecision::Complete(signal) => {
                    self.state = PollState::Complete;
                    job.status = JobStatus::Complete;
                    let counters = watermark.current();
                    tracing::info!(
                        kind = %self.kind(),
                        job_id = %job.id,
                        completed = counters.completed,
                        failed = counters.failed,
                        total = counters.total,
                        signal = ?signal,
                        elapsed_secs = (Utc::now() - job.started_at).num_seconds(),
                        "Batch job complete",
                    );
                    let complete = RunnerEvent::Complete {
                        job_id: job.id,
                        counters,
                        signal,
                        attempts: cycle.attempt(),
                    };
                    return self.emit(complete).await;
                }
                PollDecision::TimedOut => {
                    self.state = PollState::TimedOut;
                    job.status = JobStatus::Abandoned;
                    tracing::warn!(
                        kind = %self.kind(),
                        job_id = %job.id,
                        attempts = cycle.attempt(),
                        "Gave up waiting for batch job",
                    );
                    let attempts = cycle.attempt();
                    return self
                        .fail(
                            Some(job.id),
                            watermark.current(),
                            RunnerFailure::TimedOut { attempts },
                        )
                        .await;
                }
            }
        }
    }

    fn cancelled(&mut self, job: &Job) -> Flow {
        self.state = PollState::ExternallyCancelled;
        tracing::info!(kind = %self.kind(), job_id = %job.id, "Stopped polling (cancelled)");
        Flow::Stop
    }

    async fn fail(
        &self,
        job_id: Option<JobId>,
        counters: JobCounters,
        failure: RunnerFailure,
    ) -> Flow {
        self.emit(RunnerEvent::Error {
            job_id,
            counters,
            failure,
        })
        .await
    }

    /// Send an event to the foreground. Stops the runner when the
    /// receiver is gone or the runner is cancelled mid-send.
    async fn emit(&self, event: RunnerEvent) -> Flow {
        let message = RunnerMessage {
            runner: self.id,
            kind: self.kind(),
            event,
        };
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Flow::Stop,
            sent = self.events.send(message) => match sent {
                Ok(()) => Flow::Continue,
                Err(_) => {
                    tracing::debug!(runner = %self.id, "Event receiver dropped, stopping runner");
                    Flow::Stop
                }
            },
        }
    }
}
