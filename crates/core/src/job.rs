//! Job kinds, lifecycle status, and progress counters.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::{JobId, Timestamp};

// ---------------------------------------------------------------------------
// JobKind
// ---------------------------------------------------------------------------

/// The three categories of batch work, each owned by its own runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    /// Resume upload parsing and candidate extraction.
    Ingestion,
    /// Candidate screening against a job opening.
    Screening,
    /// Interview invitation dispatch.
    Invitation,
}

impl JobKind {
    /// Every kind, in mount order.
    pub const ALL: [JobKind; 3] = [Self::Ingestion, Self::Screening, Self::Invitation];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ingestion => "ingestion",
            Self::Screening => "screening",
            Self::Invitation => "invitation",
        }
    }

    /// Well-known key under which this kind's persisted record lives.
    pub fn store_key(self) -> String {
        format!("hirebatch.job.{}", self.as_str())
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ingestion" => Ok(Self::Ingestion),
            "screening" => Ok(Self::Screening),
            "invitation" => Ok(Self::Invitation),
            other => Err(CoreError::UnknownKind(other.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// JobStatus
// ---------------------------------------------------------------------------

/// Lifecycle status of a batch job as seen by the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Handed to a runner; no job id yet.
    Submitted,
    /// Accepted by the remote processor and being polled.
    Running,
    /// Finished, fully or partially successful.
    Complete,
    /// Submission rejected or the job produced no usable result.
    Failed,
    /// Monitoring stopped (cancelled or timed out); the remote job may
    /// still be running.
    Abandoned,
}

impl JobStatus {
    pub fn label(self) -> &'static str {
        match self {
            Self::Submitted => "Submitted",
            Self::Running => "Running",
            Self::Complete => "Complete",
            Self::Failed => "Failed",
            Self::Abandoned => "Abandoned",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Failed | Self::Abandoned)
    }

    pub fn is_active(self) -> bool {
        !self.is_terminal()
    }
}

// ---------------------------------------------------------------------------
// JobCounters
// ---------------------------------------------------------------------------

/// Item counters reported by the progress endpoint.
///
/// `total == 0` means the total is not known yet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobCounters {
    pub total: u64,
    pub completed: u64,
    pub failed: u64,
}

impl JobCounters {
    pub fn new(total: u64, completed: u64, failed: u64) -> Self {
        Self {
            total,
            completed,
            failed,
        }
    }

    /// Items that reached a final per-item state.
    pub fn processed(&self) -> u64 {
        self.completed + self.failed
    }

    pub fn total_known(&self) -> bool {
        self.total > 0
    }

    /// Clamp `completed` and `failed` so their sum never exceeds `total`.
    ///
    /// Completed items take precedence over failed ones. No-op while the
    /// total is unknown.
    pub fn clamped_to(self, total: u64) -> Self {
        if total == 0 {
            return self;
        }
        let completed = self.completed.min(total);
        let failed = self.failed.min(total - completed);
        Self {
            total,
            completed,
            failed,
        }
    }

    /// Percentage of processed items, or `None` while the total is unknown.
    pub fn percent(&self) -> Option<u8> {
        if !self.total_known() {
            return None;
        }
        let pct = (self.processed() as f64 / self.total as f64) * 100.0;
        Some(pct.clamp(0.0, 100.0) as u8)
    }
}

// ---------------------------------------------------------------------------
// Job
// ---------------------------------------------------------------------------

/// A batch job accepted by the remote processor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub kind: JobKind,
    pub counters: JobCounters,
    pub status: JobStatus,
    pub started_at: Timestamp,
}

impl Job {
    pub fn new(id: JobId, kind: JobKind, started_at: Timestamp) -> Self {
        Self {
            id,
            kind,
            counters: JobCounters::default(),
            status: JobStatus::Running,
            started_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_round_trips_through_str() {
        for kind in JobKind::ALL {
            assert_eq!(kind.as_str().parse::<JobKind>().unwrap(), kind);
        }
        assert!("payroll".parse::<JobKind>().is_err());
    }

    #[test]
    fn store_keys_are_distinct_per_kind() {
        assert_eq!(JobKind::Ingestion.store_key(), "hirebatch.job.ingestion");
        assert_eq!(JobKind::Invitation.store_key(), "hirebatch.job.invitation");
    }

    #[test]
    fn terminal_statuses() {
        assert!(!JobStatus::Submitted.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
        assert!(JobStatus::Complete.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(JobStatus::Abandoned.is_terminal());
    }

    #[test]
    fn clamp_prefers_completed_over_failed() {
        let c = JobCounters::new(0, 8, 5).clamped_to(10);
        assert_eq!(c, JobCounters::new(10, 8, 2));
    }

    #[test]
    fn clamp_is_noop_without_total() {
        let c = JobCounters::new(0, 8, 5).clamped_to(0);
        assert_eq!(c, JobCounters::new(0, 8, 5));
    }

    #[test]
    fn percent_requires_known_total() {
        assert_eq!(JobCounters::new(0, 3, 0).percent(), None);
        assert_eq!(JobCounters::new(10, 3, 2).percent(), Some(50));
    }
}
