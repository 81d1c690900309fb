//! Local mirror of a remote mailbox

use std::collections::HashMap;

use super::{Label, LabelId, LabelPath, Message, MessageId};

/// Messages, history cursor and labels of one mailbox
///
/// The message map and history cursor are written only by the sync engine.
/// Everything else gets a shared reference and reads through the accessors.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mirror {
    messages: HashMap<MessageId, Message>,
    history_id: u64,
    labels: HashMap<LabelId, Label>,
}

impl Mirror {
    /// Build a mirror from fetched messages
    ///
    /// Spam and trash messages are dropped.
    pub fn new(messages: impl IntoIterator<Item = Message>, history_id: u64) -> Self {
        let messages = messages
            .into_iter()
            .filter(|m| !m.is_spam_or_trash())
            .map(|m| (m.id.clone(), m))
            .collect();
        Self {
            messages,
            history_id,
            labels: HashMap::new(),
        }
    }

    /// Builder method to attach a label set
    pub fn with_labels(mut self, labels: impl IntoIterator<Item = Label>) -> Self {
        self.replace_labels(labels);
        self
    }

    pub fn history_id(&self) -> u64 {
        self.history_id
    }

    pub fn messages(&self) -> impl Iterator<Item = &Message> {
        self.messages.values()
    }

    pub fn message(&self, id: &MessageId) -> Option<&Message> {
        self.messages.get(id)
    }

    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    pub fn labels(&self) -> impl Iterator<Item = &Label> {
        self.labels.values()
    }

    pub fn label(&self, id: &LabelId) -> Option<&Label> {
        self.labels.get(id)
    }

    /// Find a label by its full path, ignoring case and redundant separators
    pub fn find_label(&self, name: &str) -> Option<&Label> {
        let path = LabelPath::parse(name);
        self.labels.values().find(|label| label.path() == path)
    }

    pub fn label_exists(&self, name: &str) -> bool {
        self.find_label(name).is_some()
    }

    /// Labels whose path is `scope` or lies below it; all labels without a scope
    pub fn labels_at_or_below<'a, 's>(
        &'a self,
        scope: Option<&'s LabelPath>,
    ) -> impl Iterator<Item = &'a Label> + use<'a, 's> {
        self.labels
            .values()
            .filter(move |label| scope.is_none_or(|scope| label.path().is_at_or_below(scope)))
    }

    /// Labels of `message` whose path is `scope` or lies below it
    ///
    /// Label IDs missing from the label map are ignored.
    pub fn message_labels_at_or_below(&self, message: &Message, scope: &LabelPath) -> Vec<&Label> {
        message
            .label_ids
            .iter()
            .filter_map(|id| self.labels.get(id))
            .filter(|label| label.path().is_at_or_below(scope))
            .collect()
    }

    /// Upsert fetched messages, drop deleted ones and advance the cursor
    ///
    /// Fetched messages that now carry SPAM or TRASH are removed instead of
    /// stored. The cursor never moves backwards.
    pub(crate) fn apply_changes(
        &mut self,
        fetched: Vec<Message>,
        deleted: impl IntoIterator<Item = MessageId>,
        history_id: u64,
    ) -> (usize, usize) {
        let mut upserted = 0;
        let mut removed = 0;

        for message in fetched {
            if message.is_spam_or_trash() {
                if self.messages.remove(&message.id).is_some() {
                    removed += 1;
                }
            } else {
                self.messages.insert(message.id.clone(), message);
                upserted += 1;
            }
        }

        for id in deleted {
            if self.messages.remove(&id).is_some() {
                removed += 1;
            }
        }

        self.history_id = self.history_id.max(history_id);
        (upserted, removed)
    }

    /// Replace the whole label set
    pub(crate) fn replace_labels(&mut self, labels: impl IntoIterator<Item = Label>) {
        self.labels = labels.into_iter().map(|l| (l.id.clone(), l)).collect();
    }
}
