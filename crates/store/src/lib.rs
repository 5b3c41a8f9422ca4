//! Session-scoped persistence for in-flight batch jobs.
//!
//! Holds at most one [`PersistedJobRecord`] per job kind so that a rebuilt
//! orchestrator can find and reattach to jobs it did not submit itself.
//! Only the orchestrator writes here; runners never touch the store.
//!
//! [`PersistedJobRecord`]: hirebatch_core::PersistedJobRecord

pub mod file;
pub mod memory;
pub mod store;

pub use file::FileJobStore;
pub use memory::MemoryJobStore;
pub use store::{JobStore, StoreError};
