//! Shared domain types for batch-job orchestration.
//!
//! Everything here is plain data: job kinds and identifiers, counters,
//! status and outcome classification, submit requests, and the record
//! layout used to reattach to a job after the foreground is rebuilt.

pub mod error;
pub mod job;
pub mod job_events;
pub mod outcome;
pub mod record;
pub mod request;
pub mod types;

pub use error::CoreError;
pub use job::{Job, JobCounters, JobKind, JobStatus};
pub use outcome::{BatchOutcome, JobSnapshot};
pub use record::PersistedJobRecord;
pub use request::{BatchParameters, BatchRequest};
pub use types::{JobId, Timestamp};
