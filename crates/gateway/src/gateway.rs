//! Gateway traits and the wire types they exchange.

use async_trait::async_trait;
use hirebatch_core::{JobCounters, JobId};
use serde::{Deserialize, Serialize};

/// Errors from the processor gateways.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// The HTTP request itself failed (network, DNS, TLS, decode, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The processor returned a non-2xx status code.
    #[error("Processor API error ({status}): {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// A transport failure that did not originate from `reqwest`.
    #[error("Transport error: {0}")]
    Transport(String),
}

/// What the processor returns after accepting a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawReceipt")]
pub struct SubmitReceipt {
    pub job_id: JobId,
    /// Number of items the processor accepted into the job.
    pub item_count: u64,
}

/// Job ids arrive as strings from some endpoints and integers from others.
#[derive(Deserialize)]
#[serde(untagged)]
enum WireId {
    Text(String),
    Number(u64),
}

#[derive(Deserialize)]
struct RawReceipt {
    #[serde(alias = "jobId")]
    job_id: WireId,
    #[serde(alias = "itemCount", default)]
    item_count: u64,
}

impl From<RawReceipt> for SubmitReceipt {
    fn from(raw: RawReceipt) -> Self {
        let job_id = match raw.job_id {
            WireId::Text(s) => JobId::new(s),
            WireId::Number(n) => JobId::new(n.to_string()),
        };
        Self {
            job_id,
            item_count: raw.item_count,
        }
    }
}

/// Counters returned by a progress query.
///
/// `done`, when present, is authoritative. Its absence means the caller has
/// to infer completion from the counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    #[serde(default)]
    pub total: u64,
    #[serde(default, alias = "processed", alias = "sent")]
    pub completed: u64,
    #[serde(default, alias = "errors")]
    pub failed: u64,
    #[serde(default, alias = "is_done", alias = "doneFlag")]
    pub done: Option<bool>,
}

impl ProgressSnapshot {
    pub fn new(total: u64, completed: u64, failed: u64) -> Self {
        Self {
            total,
            completed,
            failed,
            done: None,
        }
    }

    /// Same counters, explicitly marked finished.
    pub fn finished(mut self) -> Self {
        self.done = Some(true);
        self
    }

    pub fn is_done(&self) -> bool {
        self.done == Some(true)
    }

    pub fn counters(&self) -> JobCounters {
        JobCounters::new(self.total, self.completed, self.failed)
    }
}

/// Hands a batch to the remote processor.
#[async_trait]
pub trait SubmissionGateway: Send + Sync {
    /// POST `payload` to `endpoint` and return the issued job id.
    async fn submit(
        &self,
        endpoint: &str,
        payload: &serde_json::Value,
    ) -> Result<SubmitReceipt, GatewayError>;
}

/// Reads a job's current counters.
#[async_trait]
pub trait ProgressGateway: Send + Sync {
    /// Fetch progress from `endpoint`.
    ///
    /// Returns `Ok(None)` when the processor no longer knows the job.
    async fn fetch_progress(&self, endpoint: &str)
        -> Result<Option<ProgressSnapshot>, GatewayError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn receipt_accepts_string_id() {
        let r: SubmitReceipt =
            serde_json::from_str(r#"{"job_id":"abc-1","item_count":10}"#).unwrap();
        assert_eq!(r.job_id.as_str(), "abc-1");
        assert_eq!(r.item_count, 10);
    }

    #[test]
    fn receipt_accepts_numeric_camel_case_id() {
        let r: SubmitReceipt = serde_json::from_str(r#"{"jobId":981,"itemCount":3}"#).unwrap();
        assert_eq!(r.job_id.as_str(), "981");
        assert_eq!(r.item_count, 3);
    }

    #[test]
    fn snapshot_without_done_flag() {
        let s: ProgressSnapshot =
            serde_json::from_str(r#"{"total":10,"completed":3,"failed":0}"#).unwrap();
        assert_eq!(s.done, None);
        assert!(!s.is_done());
        assert_eq!(s.counters(), JobCounters::new(10, 3, 0));
    }

    #[test]
    fn snapshot_with_done_flag_alias() {
        let s: ProgressSnapshot =
            serde_json::from_str(r#"{"total":4,"processed":4,"errors":1,"doneFlag":true}"#)
                .unwrap();
        assert!(s.is_done());
        assert_eq!(s.completed, 4);
        assert_eq!(s.failed, 1);
    }

    #[test]
    fn snapshot_missing_counters_default_to_zero() {
        let s: ProgressSnapshot = serde_json::from_str("{}").unwrap();
        assert_eq!(s, ProgressSnapshot::default());
    }
}
