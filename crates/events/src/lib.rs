//! Observable job state for UI-facing consumers.
//!
//! The orchestrator publishes a [`JobUpdate`] on the [`EventBus`] every
//! time a job's snapshot changes; views subscribe and re-render.

pub mod bus;

pub use bus::{EventBus, JobUpdate};
