//! The durable record that lets a running job survive a reload.

use chrono::serde::ts_milliseconds;
use serde::{Deserialize, Serialize};

use crate::job::JobKind;
use crate::types::{JobId, Timestamp};

/// One persisted entry per job kind.
///
/// Stored as `{"kind", "jobId", "startedAt" (epoch ms), "inProgress"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedJobRecord {
    pub kind: JobKind,
    pub job_id: JobId,
    #[serde(with = "ts_milliseconds")]
    pub started_at: Timestamp,
    pub in_progress: bool,
}

impl PersistedJobRecord {
    /// Record for a job the remote processor has just accepted.
    pub fn in_progress(kind: JobKind, job_id: JobId, started_at: Timestamp) -> Self {
        Self {
            kind,
            job_id,
            started_at,
            in_progress: true,
        }
    }

    /// Whether mounting should reattach to this job.
    pub fn should_reattach(&self) -> bool {
        self.in_progress
    }
}
