//! Hook for refreshing dependent read models after a batch completes.

use async_trait::async_trait;
use hirebatch_core::{JobKind, JobSnapshot};

/// A refresh that could not be carried out. The job itself is unaffected.
#[derive(Debug, thiserror::Error)]
#[error("Read model refresh failed: {0}")]
pub struct RefreshError(pub String);

/// Reloads whatever views depend on a kind's results, e.g. the candidate
/// list after ingestion or the shortlist after screening.
///
/// Called once per completed job, after the terminal snapshot is recorded.
#[async_trait]
pub trait ReadModelRefresher: Send + Sync {
    async fn refresh(&self, kind: JobKind, snapshot: &JobSnapshot) -> Result<(), RefreshError>;
}

/// Refresher for callers with no dependent views.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopRefresher;

#[async_trait]
impl ReadModelRefresher for NoopRefresher {
    async fn refresh(&self, kind: JobKind, _snapshot: &JobSnapshot) -> Result<(), RefreshError> {
        tracing::debug!(kind = %kind, "No read models to refresh");
        Ok(())
    }
}
