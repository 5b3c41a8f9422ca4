//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] fans out [`JobUpdate`]s to any number of observers. It is
//! owned by the orchestrator; observers hold receivers only.

use chrono::{DateTime, Utc};
use hirebatch_core::{JobKind, JobSnapshot};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

// ---------------------------------------------------------------------------
// JobUpdate
// ---------------------------------------------------------------------------

/// A change to one kind's observable job state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobUpdate {
    /// Dot-separated event name, see `hirebatch_core::job_events`.
    pub event_type: String,

    /// The job state after the change.
    pub snapshot: JobSnapshot,

    /// When the update was published (UTC).
    pub timestamp: DateTime<Utc>,
}

impl JobUpdate {
    pub fn new(event_type: impl Into<String>, snapshot: JobSnapshot) -> Self {
        Self {
            event_type: event_type.into(),
            snapshot,
            timestamp: Utc::now(),
        }
    }

    pub fn kind(&self) -> JobKind {
        self.snapshot.kind
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 256;

/// In-process fan-out bus for [`JobUpdate`]s.
///
/// # Usage
///
/// ```rust
/// use hirebatch_core::{JobKind, JobSnapshot};
/// use hirebatch_events::{EventBus, JobUpdate};
///
/// let bus = EventBus::default();
/// let mut rx = bus.subscribe();
///
/// bus.publish(JobUpdate::new("job.submitted", JobSnapshot::submitted(JobKind::Screening)));
/// ```
pub struct EventBus {
    sender: broadcast::Sender<JobUpdate>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full, the oldest un-consumed updates are dropped
    /// and slow receivers will observe a `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an update to all current subscribers.
    ///
    /// If there are no active subscribers the update is silently dropped.
    pub fn publish(&self, update: JobUpdate) {
        tracing::trace!(
            event_type = %update.event_type,
            kind = %update.kind(),
            subscribers = self.subscriber_count(),
            "Publishing job update",
        );
        // Ignore the SendError: it only means there are zero receivers.
        let _ = self.sender.send(update);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobUpdate> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
