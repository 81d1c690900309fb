//! Message model representing the mirrored metadata of a Gmail message

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use super::LabelId;

/// Unique identifier for a message (Gmail message ID)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MessageId(pub String);

impl MessageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for MessageId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for MessageId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Metadata of a single message as mirrored locally
///
/// Only `label_ids` ever changes after a message has been fetched, either
/// through a label mutation or because a history diff replaced the message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Gmail message ID
    pub id: MessageId,
    /// Gmail label IDs (e.g., "INBOX", "SENT", "Label_12")
    pub label_ids: BTreeSet<LabelId>,
    /// Selected headers, keyed by header name as sent by Gmail
    pub headers: BTreeMap<String, String>,
    /// Short plain text preview
    pub snippet: String,
}

impl Message {
    /// Create a new message builder
    pub fn builder(id: impl Into<MessageId>) -> MessageBuilder {
        MessageBuilder::new(id.into())
    }

    /// Look up a header value, ignoring the case of the header name
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Raw value of the From header
    pub fn from_header(&self) -> Option<&str> {
        self.header("From")
    }

    /// Value of the Subject header, empty if absent
    pub fn subject(&self) -> &str {
        self.header("Subject").unwrap_or_default()
    }

    pub fn has_label(&self, label_id: &str) -> bool {
        self.label_ids.iter().any(|id| id.as_str() == label_id)
    }

    /// Messages in spam or trash are never kept in the mirror
    pub fn is_spam_or_trash(&self) -> bool {
        self.has_label(LabelId::SPAM) || self.has_label(LabelId::TRASH)
    }
}

/// Builder for creating Message instances
pub struct MessageBuilder {
    id: MessageId,
    label_ids: BTreeSet<LabelId>,
    headers: BTreeMap<String, String>,
    snippet: String,
}

impl MessageBuilder {
    fn new(id: MessageId) -> Self {
        Self {
            id,
            label_ids: BTreeSet::new(),
            headers: BTreeMap::new(),
            snippet: String::new(),
        }
    }

    pub fn from(self, from: impl Into<String>) -> Self {
        self.header("From", from)
    }

    pub fn subject(self, subject: impl Into<String>) -> Self {
        self.header("Subject", subject)
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn snippet(mut self, snippet: impl Into<String>) -> Self {
        self.snippet = snippet.into();
        self
    }

    pub fn label(mut self, label_id: impl Into<LabelId>) -> Self {
        self.label_ids.insert(label_id.into());
        self
    }

    pub fn label_ids<I, L>(mut self, label_ids: I) -> Self
    where
        I: IntoIterator<Item = L>,
        L: Into<LabelId>,
    {
        self.label_ids = label_ids.into_iter().map(Into::into).collect();
        self
    }

    pub fn build(self) -> Message {
        Message {
            id: self.id,
            label_ids: self.label_ids,
            headers: self.headers,
            snippet: self.snippet,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let msg = Message::builder("m1")
            .header("FROM", "Alice <alice@example.com>")
            .subject("Hello")
            .build();

        assert_eq!(msg.from_header(), Some("Alice <alice@example.com>"));
        assert_eq!(msg.header("from"), Some("Alice <alice@example.com>"));
        assert_eq!(msg.subject(), "Hello");
        assert_eq!(msg.header("Cc"), None);
    }

    #[test]
    fn test_spam_or_trash() {
        let inbox = Message::builder("m1").label("INBOX").build();
        let trash = Message::builder("m2").label_ids(["INBOX", "TRASH"]).build();
        let spam = Message::builder("m3").label("SPAM").build();

        assert!(!inbox.is_spam_or_trash());
        assert!(trash.is_spam_or_trash());
        assert!(spam.is_spam_or_trash());
    }

    #[test]
    fn test_missing_subject_is_empty() {
        let msg = Message::builder("m1").build();
        assert_eq!(msg.subject(), "");
        assert!(msg.from_header().is_none());
    }
}
