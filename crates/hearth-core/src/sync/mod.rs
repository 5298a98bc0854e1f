//! Eventual-consistency synchronization between the structural and
//! semantic indexes.

mod scheduler;

pub use scheduler::{classify, SyncClass, SyncScheduler, SyncState};
