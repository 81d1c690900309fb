//! Gmail API response normalization
//!
//! Converts Gmail API responses to mirror domain models.

use std::collections::BTreeMap;

use super::api::{
    GmailLabel, GmailMessage, History, HistoryLabelChange, HistoryMessage, ProfileResponse,
};
use crate::error::{Error, Result};
use crate::models::{Label, LabelKind, Message, MessageId, Profile};
use crate::sync::HistoryRecord;

/// Headers kept on mirrored messages
pub(super) const KEPT_HEADERS: [&str; 2] = ["From", "Subject"];

/// Normalize a Gmail API message to a mirror Message
pub fn normalize_message(gmail_msg: GmailMessage) -> Message {
    let headers: BTreeMap<String, String> = gmail_msg
        .payload
        .and_then(|payload| payload.headers)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|h| {
            let name = KEPT_HEADERS
                .iter()
                .find(|kept| kept.eq_ignore_ascii_case(&h.name))?;
            Some((name.to_string(), h.value))
        })
        .collect();

    let mut builder = Message::builder(gmail_msg.id)
        .label_ids(gmail_msg.label_ids.unwrap_or_default())
        .snippet(gmail_msg.snippet);
    for (name, value) in headers {
        builder = builder.header(name, value);
    }
    builder.build()
}

/// Normalize a label resource; anything not marked `system` is a user label
pub fn normalize_label(label: GmailLabel) -> Label {
    let kind = match label.label_type.as_deref() {
        Some(t) if t.eq_ignore_ascii_case("system") => LabelKind::System,
        _ => LabelKind::User,
    };
    Label {
        id: label.id.into(),
        name: label.name,
        kind,
    }
}

/// Normalize a profile response; the history ID arrives as a decimal string
pub fn normalize_profile(profile: ProfileResponse) -> Result<Profile> {
    Ok(Profile {
        total_message_count: profile.messages_total,
        history_id: parse_history_id(&profile.history_id)?,
    })
}

/// Normalize one history record
pub fn normalize_history(history: History) -> Result<HistoryRecord> {
    fn added(items: Option<Vec<HistoryMessage>>) -> Vec<MessageId> {
        items
            .unwrap_or_default()
            .into_iter()
            .map(|item| MessageId::new(item.message.id))
            .collect()
    }
    fn changed(items: Option<Vec<HistoryLabelChange>>) -> Vec<MessageId> {
        items
            .unwrap_or_default()
            .into_iter()
            .map(|item| MessageId::new(item.message.id))
            .collect()
    }

    Ok(HistoryRecord {
        history_id: parse_history_id(&history.id)?,
        messages_added: added(history.messages_added),
        labels_added: changed(history.labels_added),
        labels_removed: changed(history.labels_removed),
        messages_deleted: added(history.messages_deleted),
    })
}

pub(super) fn parse_history_id(raw: &str) -> Result<u64> {
    raw.trim()
        .parse()
        .map_err(|_| Error::protocol(format!("invalid history id '{raw}'")))
}
