//! Background task runners for batch jobs.
//!
//! One generic runner task owns the submit-and-poll lifecycle of a single
//! job kind. It talks to the foreground only through a bounded command
//! channel ([`RunnerCommand`]) and an event channel ([`RunnerMessage`]).
//! The kind-specific part is a thin [`JobAdapter`] that shapes the submit
//! payload and picks endpoints; completion detection lives in [`poll`].

pub mod adapter;
pub mod messages;
pub mod poll;
pub mod runner;

pub use adapter::{adapter_for, IngestionAdapter, InvitationAdapter, JobAdapter, ScreeningAdapter};
pub use messages::{
    CompletionSignal, RunnerCommand, RunnerEvent, RunnerFailure, RunnerId, RunnerMessage,
};
pub use poll::{PollConfig, PollCycle, PollDecision, PollState, ProgressWatermark};
pub use runner::{spawn_runner, Gateways, RunnerError, RunnerHandle};
