//! Event type names published to observers of the orchestrator.
//!
//! Carried in `JobUpdate::event_type` so subscribers can switch on a
//! stable string without matching the full snapshot.

/// A batch was handed to a runner and is awaiting a job id.
pub const EVENT_JOB_SUBMITTED: &str = "job.submitted";

/// The remote processor issued a job id (or a persisted job was reattached).
pub const EVENT_JOB_RUNNING: &str = "job.running";

/// Counters changed.
pub const EVENT_JOB_PROGRESS: &str = "job.progress";

/// The job reached a terminal success state (full or partial).
pub const EVENT_JOB_COMPLETED: &str = "job.completed";

/// The job failed or monitoring gave up.
pub const EVENT_JOB_FAILED: &str = "job.failed";

/// The job was cancelled locally.
pub const EVENT_JOB_CANCELLED: &str = "job.cancelled";
