//! Foreground orchestration of batch jobs.
//!
//! [`Orchestrator`] starts, cancels and observes batch jobs, persists
//! enough about each accepted job to reattach after a rebuild, and
//! refreshes dependent read models once a batch completes.

pub mod config;
pub mod orchestrator;
pub mod refresh;

pub use config::OrchestratorConfig;
pub use orchestrator::{Orchestrator, OrchestratorDeps, OrchestratorError};
pub use refresh::{NoopRefresher, ReadModelRefresher, RefreshError};
