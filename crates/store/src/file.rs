//! JSON-file store, one document per session.
//!
//! The document maps each kind's well-known key (`hirebatch.job.<kind>`)
//! to its record:
//!
//! ```json
//! {
//!   "hirebatch.job.screening": {
//!     "kind": "screening", "jobId": "981", "startedAt": 1700000000000, "inProgress": true
//!   }
//! }
//! ```
//!
//! Every mutation rewrites the whole document through a temp file and a
//! rename, so a crash mid-write leaves the previous document intact.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use hirebatch_core::{JobKind, PersistedJobRecord};
use tokio::sync::Mutex;

use crate::store::{JobStore, StoreError};

type Document = BTreeMap<String, PersistedJobRecord>;

pub struct FileJobStore {
    path: PathBuf,
    /// Serializes read-modify-write cycles within this process.
    lock: Mutex<()>,
}

impl FileJobStore {
    /// Store for `session_id` under `dir`. The directory is created on the
    /// first write.
    pub fn new(dir: impl AsRef<Path>, session_id: &str) -> Self {
        let file_name = format!("session-{}.json", sanitize(session_id));
        Self {
            path: dir.as_ref().join(file_name),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<Document, StoreError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.is_empty() => Ok(Document::new()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Document::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, doc: &Document) -> Result<(), StoreError> {
        if doc.is_empty() {
            return match tokio::fs::remove_file(&self.path).await {
                Err(e) if e.kind() != ErrorKind::NotFound => Err(e.into()),
                _ => Ok(()),
            };
        }

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, serde_json::to_vec_pretty(doc)?).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

/// Keep session ids usable as a file name component.
fn sanitize(session_id: &str) -> String {
    let cleaned: String = session_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "default".to_string()
    } else {
        cleaned
    }
}

#[async_trait]
impl JobStore for FileJobStore {
    async fn write(&self, record: &PersistedJobRecord) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        let mut doc = self.load().await?;
        doc.insert(record.kind.store_key(), record.clone());
        self.save(&doc).await?;
        tracing::debug!(
            kind = %record.kind,
            job_id = %record.job_id,
            path = %self.path.display(),
            "Persisted job record",
        );
        Ok(())
    }

    async fn read(&self, kind: JobKind) -> Result<Option<PersistedJobRecord>, StoreError> {
        let _guard = self.lock.lock().await;
        let mut doc = self.load().await?;
        Ok(doc.remove(&kind.store_key()))
    }

    async fn clear(&self, kind: JobKind) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        let mut doc = self.load().await?;
        if doc.remove(&kind.store_key()).is_some() {
            self.save(&doc).await?;
            tracing::debug!(kind = %kind, "Cleared job record");
        }
        Ok(())
    }

    async fn end_session(&self) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        self.save(&Document::new()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_ids_are_sanitized() {
        assert_eq!(sanitize("tab-01_a"), "tab-01_a");
        assert_eq!(sanitize("../etc/passwd"), "___etc_passwd");
        assert_eq!(sanitize(""), "default");
    }

    #[test]
    fn path_is_scoped_by_session() {
        let a = FileJobStore::new("/tmp/hb", "one");
        let b = FileJobStore::new("/tmp/hb", "two");
        assert_ne!(a.path(), b.path());
        assert!(a.path().ends_with("session-one.json"));
    }
}
