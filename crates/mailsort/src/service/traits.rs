//! Remote mail service trait definitions

use serde::Serialize;

use crate::error::Result;
use crate::models::{Label, LabelId, Message, MessageId, Profile};
use crate::sync::HistoryRecord;

/// One page of a listing endpoint
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Token of the following page; `None` or empty on the last page
    pub next_page_token: Option<String>,
}

impl<T> Page<T> {
    pub fn last(items: Vec<T>) -> Self {
        Self {
            items,
            next_page_token: None,
        }
    }
}

/// Trait for the remote mailbox operations the engines consume
///
/// This trait abstracts over the Gmail REST client and in-memory test
/// doubles. Implementations must be shareable across the fetch executor's
/// worker threads.
pub trait MailService: Send + Sync {
    /// Get the mailbox profile (message count and current history ID)
    fn get_profile(&self) -> Result<Profile>;

    /// List one page of message IDs, excluding spam and trash
    fn list_message_ids(&self, page_token: Option<&str>) -> Result<Page<MessageId>>;

    /// Get the metadata of a single message
    fn get_message(&self, id: &MessageId) -> Result<Message>;

    /// List one page of history records newer than `start_history_id`
    ///
    /// Fails with `Error::NotFound` when the start ID is too old to serve.
    fn list_history(
        &self,
        start_history_id: u64,
        page_token: Option<&str>,
    ) -> Result<Page<HistoryRecord>>;

    /// List all labels
    fn list_labels(&self) -> Result<Vec<Label>>;

    /// Create a user label with the given full path
    fn create_label(&self, name: &str) -> Result<Label>;

    /// Add and remove labels on up to one batch of messages
    fn batch_modify(&self, ids: &[MessageId], add: &[LabelId], remove: &[LabelId]) -> Result<()>;
}
