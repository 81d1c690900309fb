//! Sync engine for mirroring a remote mailbox
//!
//! Provides idempotent sync operations that can be safely retried.

mod engine;
mod history;

pub use engine::{SyncEngine, SyncMode, SyncPhase, SyncStats, synchronize};
pub use history::{HistoryDiff, HistoryRecord};
