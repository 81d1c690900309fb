//! History records and their aggregation into a single diff

use std::collections::HashSet;

use serde::Serialize;

use crate::models::MessageId;

/// One entry of the remote change log
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HistoryRecord {
    pub history_id: u64,
    pub messages_added: Vec<MessageId>,
    pub labels_added: Vec<MessageId>,
    pub labels_removed: Vec<MessageId>,
    pub messages_deleted: Vec<MessageId>,
}

/// Message IDs touched between two history cursors
///
/// Deletion takes precedence: an ID that was added or relabeled and also
/// deleted inside the same window only counts as deleted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoryDiff {
    pub added: HashSet<MessageId>,
    pub label_changed: HashSet<MessageId>,
    pub deleted: HashSet<MessageId>,
}

impl HistoryDiff {
    /// Aggregate all records of a (possibly multi-page) history listing
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a HistoryRecord>) -> Self {
        let mut diff = Self::default();
        for record in records {
            diff.added.extend(record.messages_added.iter().cloned());
            diff.label_changed.extend(record.labels_added.iter().cloned());
            diff.label_changed.extend(record.labels_removed.iter().cloned());
            diff.deleted.extend(record.messages_deleted.iter().cloned());
        }
        diff
    }

    /// IDs whose details must be (re)fetched: `(added ∪ label_changed) \ deleted`
    ///
    /// Sorted so that repeated runs issue requests in the same order.
    pub fn to_fetch(&self) -> Vec<MessageId> {
        let mut ids: Vec<MessageId> = self
            .added
            .union(&self.label_changed)
            .filter(|id| !self.deleted.contains(*id))
            .cloned()
            .collect();
        ids.sort();
        ids
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.label_changed.is_empty() && self.deleted.is_empty()
    }
}
