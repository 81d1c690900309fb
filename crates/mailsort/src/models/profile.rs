//! Mailbox profile snapshot

use serde::{Deserialize, Serialize};

/// Snapshot of the remote mailbox, fetched once per sync
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    /// Number of messages, excluding spam and trash
    pub total_message_count: u64,
    /// Current position of the remote change log
    pub history_id: u64,
}
