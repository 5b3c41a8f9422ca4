use async_trait::async_trait;
use hirebatch_core::{JobKind, PersistedJobRecord};

/// Errors from a job store backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Store document is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// Durable map from job kind to its persisted record.
///
/// Writes are last-writer-wins.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Insert or replace the record for `record.kind`.
    async fn write(&self, record: &PersistedJobRecord) -> Result<(), StoreError>;

    async fn read(&self, kind: JobKind) -> Result<Option<PersistedJobRecord>, StoreError>;

    /// Remove the record for `kind`. Clearing an absent record is a no-op.
    async fn clear(&self, kind: JobKind) -> Result<(), StoreError>;

    /// Every record currently stored, in [`JobKind::ALL`] order.
    async fn read_all(&self) -> Result<Vec<PersistedJobRecord>, StoreError> {
        let mut records = Vec::new();
        for kind in JobKind::ALL {
            if let Some(record) = self.read(kind).await? {
                records.push(record);
            }
        }
        Ok(records)
    }

    /// Drop everything stored for the current session.
    async fn end_session(&self) -> Result<(), StoreError> {
        for kind in JobKind::ALL {
            self.clear(kind).await?;
        }
        Ok(())
    }
}
