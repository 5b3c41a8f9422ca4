//! Message protocol between the orchestrator and its runners.
//!
//! Commands flow foreground → runner, events flow runner → foreground.
//! Both are serde-tagged on `"type"` so they can be logged or bridged to
//! another transport verbatim.

use std::fmt;

use hirebatch_core::{BatchRequest, JobCounters, JobId, JobKind, Timestamp};
use serde::{Deserialize, Serialize};

pub use crate::poll::CompletionSignal;

/// Identifies one runner instance. A fresh id is issued every time the
/// orchestrator spawns a runner, so events from a released runner can be
/// told apart from its replacement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunnerId(pub u64);

impl fmt::Display for RunnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "runner-{}", self.0)
    }
}

/// Commands accepted by a runner.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunnerCommand {
    /// Submit a new batch, then poll it.
    Submit { request: BatchRequest },
    /// Poll an already-submitted job without resubmitting it.
    Reattach {
        job_id: JobId,
        started_at: Timestamp,
    },
    /// Stop polling and shut the runner down.
    Cancel,
}

/// Events produced by a runner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunnerEvent {
    /// Emitted once when the runner starts, before any command is handled.
    Ready,

    /// The processor issued a job id for a submitted batch.
    Accepted {
        job_id: JobId,
        item_count: u64,
        started_at: Timestamp,
    },

    /// Counters after a successful poll. `completed + failed` never
    /// decreases within one job.
    Progress { job_id: JobId, counters: JobCounters },

    /// Terminal: the job finished. `counters.failed > 0` is a partial
    /// success, not an error.
    Complete {
        job_id: JobId,
        counters: JobCounters,
        signal: CompletionSignal,
        attempts: u32,
    },

    /// Terminal: the job could not be submitted or monitoring gave up.
    /// `job_id` is `None` when submission never produced one.
    Error {
        job_id: Option<JobId>,
        counters: JobCounters,
        failure: RunnerFailure,
    },
}

impl RunnerEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete { .. } | Self::Error { .. })
    }

    pub fn job_id(&self) -> Option<&JobId> {
        match self {
            Self::Ready => None,
            Self::Accepted { job_id, .. }
            | Self::Progress { job_id, .. }
            | Self::Complete { job_id, .. } => Some(job_id),
            Self::Error { job_id, .. } => job_id.as_ref(),
        }
    }
}

/// Why a runner ended a job with an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum RunnerFailure {
    /// The request failed validation or does not belong to this runner.
    InvalidRequest { detail: String },
    /// The processor rejected the batch or could not be reached.
    Submission { detail: String },
    /// The attempt budget ran out with no terminal signal. The remote job
    /// may still be running.
    TimedOut { attempts: u32 },
    /// The processor no longer knows the job.
    JobNotFound,
}

impl RunnerFailure {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::TimedOut { .. })
    }
}

impl fmt::Display for RunnerFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidRequest { detail } => write!(f, "Invalid batch request: {detail}"),
            Self::Submission { detail } => write!(f, "Batch submission failed: {detail}"),
            Self::TimedOut { attempts } => write!(
                f,
                "No completion signal after {attempts} progress checks; the job may still be running"
            ),
            Self::JobNotFound => f.write_str("The processor has no record of this job"),
        }
    }
}

/// An event stamped with its source runner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunnerMessage {
    pub runner: RunnerId,
    pub kind: JobKind,
    pub event: RunnerEvent,
}
