//! Label model representing a Gmail label and its hierarchical path

use serde::{Deserialize, Serialize};

/// Unique identifier for a label (Gmail label ID)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LabelId(pub String);

impl LabelId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    // Well-known Gmail system labels
    pub const INBOX: &'static str = "INBOX";
    pub const SENT: &'static str = "SENT";
    pub const DRAFT: &'static str = "DRAFT";
    pub const CHAT: &'static str = "CHAT";
    pub const TRASH: &'static str = "TRASH";
    pub const SPAM: &'static str = "SPAM";
    pub const STARRED: &'static str = "STARRED";
    pub const IMPORTANT: &'static str = "IMPORTANT";
    pub const UNREAD: &'static str = "UNREAD";
}

impl From<String> for LabelId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for LabelId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for LabelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Whether a label is owned by Gmail or created by the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LabelKind {
    System,
    User,
}

/// A mail label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Label {
    /// Label ID (e.g., "INBOX", "Label_123")
    pub id: LabelId,
    /// Display name, a '/'-separated path for nested labels
    pub name: String,
    pub kind: LabelKind,
}

impl Label {
    /// Create a user label
    pub fn new(id: impl Into<LabelId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind: LabelKind::User,
        }
    }

    /// Create a system label
    pub fn system(id: impl Into<LabelId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind: LabelKind::System,
        }
    }

    pub fn is_system(&self) -> bool {
        self.kind == LabelKind::System
    }

    /// Parsed hierarchical path of the label name
    pub fn path(&self) -> LabelPath {
        LabelPath::parse(&self.name)
    }
}

/// Case-insensitive hierarchical label path
///
/// `"Inbox/Bills"` and `"inbox//bills/"` parse to the same path
/// `["inbox", "bills"]`. Comparisons are done segment by segment, so
/// `["inbox2"]` is never below `["inbox"]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LabelPath(Vec<String>);

impl LabelPath {
    pub fn parse(name: &str) -> Self {
        Self(
            name.split('/')
                .filter(|segment| !segment.is_empty())
                .map(str::to_lowercase)
                .collect(),
        )
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Last path segment ("bills" for "Inbox/Bills")
    pub fn last(&self) -> Option<&str> {
        self.0.last().map(String::as_str)
    }

    /// True if `self` equals `ancestor` or lies somewhere below it
    pub fn is_at_or_below(&self, ancestor: &LabelPath) -> bool {
        self.0.len() >= ancestor.0.len() && self.0.iter().zip(&ancestor.0).all(|(a, b)| a == b)
    }
}

impl std::fmt::Display for LabelPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0.join("/"))
    }
}
