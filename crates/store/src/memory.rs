//! In-memory store. Survives orchestrator rebuilds within one process
//! when shared through an `Arc`, but not a process restart.

use std::collections::HashMap;

use async_trait::async_trait;
use hirebatch_core::{JobKind, PersistedJobRecord};
use tokio::sync::RwLock;

use crate::store::{JobStore, StoreError};

#[derive(Default)]
pub struct MemoryJobStore {
    records: RwLock<HashMap<JobKind, PersistedJobRecord>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn write(&self, record: &PersistedJobRecord) -> Result<(), StoreError> {
        self.records
            .write()
            .await
            .insert(record.kind, record.clone());
        Ok(())
    }

    async fn read(&self, kind: JobKind) -> Result<Option<PersistedJobRecord>, StoreError> {
        Ok(self.records.read().await.get(&kind).cloned())
    }

    async fn clear(&self, kind: JobKind) -> Result<(), StoreError> {
        self.records.write().await.remove(&kind);
        Ok(())
    }
}
