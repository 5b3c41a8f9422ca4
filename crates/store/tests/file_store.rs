//! Integration tests for [`FileJobStore`] on a real temp directory.

use chrono::TimeZone;
use hirebatch_core::{JobKind, PersistedJobRecord};
use hirebatch_store::{FileJobStore, JobStore, StoreError};

fn record(kind: JobKind, id: &str) -> PersistedJobRecord {
    let started = chrono::Utc.timestamp_millis_opt(1_700_000_000_000).unwrap();
    PersistedJobRecord::in_progress(kind, id.into(), started)
}

// ---------------------------------------------------------------------------
// Test: records survive a new store instance (reload)
// ---------------------------------------------------------------------------

#[tokio::test]
async fn record_survives_store_rebuild() {
    let dir = tempfile::tempdir().unwrap();

    let first = FileJobStore::new(dir.path(), "tab-1");
    first.write(&record(JobKind::Ingestion, "ing-1")).await.unwrap();
    drop(first);

    let second = FileJobStore::new(dir.path(), "tab-1");
    let found = second.read(JobKind::Ingestion).await.unwrap();

    assert_eq!(found, Some(record(JobKind::Ingestion, "ing-1")));
}

// ---------------------------------------------------------------------------
// Test: sessions do not see each other's records
// ---------------------------------------------------------------------------

#[tokio::test]
async fn sessions_are_isolated() {
    let dir = tempfile::tempdir().unwrap();
    let a = FileJobStore::new(dir.path(), "a");
    let b = FileJobStore::new(dir.path(), "b");

    a.write(&record(JobKind::Screening, "s-a")).await.unwrap();

    assert!(b.read(JobKind::Screening).await.unwrap().is_none());
}

// ---------------------------------------------------------------------------
// Test: document layout uses the well-known keys
// ---------------------------------------------------------------------------

#[tokio::test]
async fn document_uses_well_known_keys() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileJobStore::new(dir.path(), "s");

    store.write(&record(JobKind::Screening, "981")).await.unwrap();
    store.write(&record(JobKind::Invitation, "inv-3")).await.unwrap();

    let raw = std::fs::read_to_string(store.path()).unwrap();
    let doc: serde_json::Value = serde_json::from_str(&raw).unwrap();

    assert_eq!(doc["hirebatch.job.screening"]["jobId"], "981");
    assert_eq!(doc["hirebatch.job.screening"]["inProgress"], true);
    assert_eq!(doc["hirebatch.job.invitation"]["kind"], "invitation");
    assert!(doc.get("hirebatch.job.ingestion").is_none());
}

// ---------------------------------------------------------------------------
// Test: clear removes one kind, and the file once empty
// ---------------------------------------------------------------------------

#[tokio::test]
async fn clear_removes_only_that_kind() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileJobStore::new(dir.path(), "s");

    store.write(&record(JobKind::Ingestion, "i")).await.unwrap();
    store.write(&record(JobKind::Screening, "s")).await.unwrap();

    store.clear(JobKind::Ingestion).await.unwrap();
    let remaining = store.read_all().await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].kind, JobKind::Screening);

    store.clear(JobKind::Screening).await.unwrap();
    assert!(!store.path().exists());
}

#[tokio::test]
async fn clearing_missing_record_is_noop() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileJobStore::new(dir.path(), "s");

    store.clear(JobKind::Invitation).await.unwrap();
    assert!(store.read_all().await.unwrap().is_empty());
}

#[tokio::test]
async fn end_session_deletes_document() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileJobStore::new(dir.path(), "s");
    store.write(&record(JobKind::Ingestion, "i")).await.unwrap();

    store.end_session().await.unwrap();

    assert!(!store.path().exists());
    assert!(store.read(JobKind::Ingestion).await.unwrap().is_none());
}

// ---------------------------------------------------------------------------
// Test: corrupt document is reported, not silently dropped
// ---------------------------------------------------------------------------

#[tokio::test]
async fn corrupt_document_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileJobStore::new(dir.path(), "s");
    std::fs::write(store.path(), b"{not json").unwrap();

    let result = store.read(JobKind::Screening).await;

    assert!(matches!(result, Err(StoreError::Corrupt(_))));
}
