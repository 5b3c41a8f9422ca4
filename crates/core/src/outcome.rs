//! Terminal outcome classification and the observable job snapshot.

use serde::{Deserialize, Serialize};

use crate::job::{JobCounters, JobKind, JobStatus};
use crate::types::{JobId, Timestamp};

/// How a finished batch should be presented to the user.
///
/// Full success, partial success, failure, and timeout are reported
/// separately and must never be folded into a generic "done".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchOutcome {
    /// Every processed item succeeded (`failed == 0`).
    Succeeded,
    /// Some items failed but at least one succeeded.
    PartiallySucceeded,
    /// No usable result.
    Failed,
    /// The attempt budget ran out without a terminal signal.
    TimedOut,
}

impl BatchOutcome {
    /// Classify a completed job from its final counters.
    ///
    /// Nothing processed out of a known non-zero total has no usable
    /// result. Nothing processed with an unknown total counts as a success.
    pub fn from_counters(counters: &JobCounters) -> Self {
        match (counters.completed, counters.failed) {
            (0, 0) if counters.total_known() => Self::Failed,
            (_, 0) => Self::Succeeded,
            (0, _) => Self::Failed,
            _ => Self::PartiallySucceeded,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Succeeded => "Succeeded",
            Self::PartiallySucceeded => "Partially succeeded",
            Self::Failed => "Failed",
            Self::TimedOut => "Timed out",
        }
    }

    /// Whether the batch left anything worth refreshing dependent views for.
    pub fn has_usable_result(self) -> bool {
        matches!(self, Self::Succeeded | Self::PartiallySucceeded)
    }
}

/// Observable state of one kind's current (or last) job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSnapshot {
    pub kind: JobKind,
    /// `None` until the remote processor issues an id.
    pub job_id: Option<JobId>,
    pub status: JobStatus,
    pub counters: JobCounters,
    /// Set once the job reaches a terminal status (except cancellation).
    pub outcome: Option<BatchOutcome>,
    /// Human-readable failure cause.
    pub error: Option<String>,
    pub started_at: Option<Timestamp>,
    /// Whether this job was picked up from a persisted record.
    pub reattached: bool,
}

impl JobSnapshot {
    /// Snapshot for a batch that was just handed to a runner.
    pub fn submitted(kind: JobKind) -> Self {
        Self {
            kind,
            job_id: None,
            status: JobStatus::Submitted,
            counters: JobCounters::default(),
            outcome: None,
            error: None,
            started_at: None,
            reattached: false,
        }
    }

    /// Snapshot for a persisted job being reattached.
    pub fn reattached(kind: JobKind, job_id: JobId, started_at: Timestamp) -> Self {
        Self {
            kind,
            job_id: Some(job_id),
            status: JobStatus::Running,
            counters: JobCounters::default(),
            outcome: None,
            error: None,
            started_at: Some(started_at),
            reattached: true,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }
}
