//! Clients for the remote batch processor.
//!
//! Two narrow seams are consumed by the runners: [`SubmissionGateway`]
//! hands a batch to the processor and gets back a job id, and
//! [`ProgressGateway`] reads a job's counters. [`ProcessorApi`] implements
//! both over HTTP; [`ScriptedGateway`] replays canned responses in-process.

pub mod api;
pub mod gateway;
pub mod scripted;

pub use api::ProcessorApi;
pub use gateway::{
    GatewayError, ProgressGateway, ProgressSnapshot, SubmissionGateway, SubmitReceipt,
};
pub use scripted::{ProgressStep, ScriptedGateway};
