//! In-memory mail service
//!
//! Behaves like a small Gmail mailbox: it keeps messages, labels and a
//! change log, paginates listings and records every mutation. Faults can be
//! scripted per call so that the retry and failure paths of the engines can
//! be exercised without a network.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::{MailService, Page};
use crate::error::{Error, Result};
use crate::models::{Label, LabelId, Message, MessageId, Profile};
use crate::sync::HistoryRecord;

/// A scripted failure returned instead of a real response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    RateLimited,
    Network,
    NotFound,
    Auth,
    Protocol(u16),
}

impl Fault {
    fn into_error(self, what: &str) -> Error {
        match self {
            Fault::RateLimited => Error::RateLimited(format!("quota exceeded for {what}")),
            Fault::Network => Error::Network(format!("connection reset while fetching {what}")),
            Fault::NotFound => Error::NotFound(what.to_string()),
            Fault::Auth => Error::Auth("token revoked".to_string()),
            Fault::Protocol(status) => Error::Protocol {
                status: Some(status),
                message: format!("request for {what} rejected"),
            },
        }
    }
}

/// A recorded `batch_modify` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModifyCall {
    pub ids: Vec<MessageId>,
    pub add: Vec<LabelId>,
    pub remove: Vec<LabelId>,
}

#[derive(Default)]
struct State {
    messages: BTreeMap<MessageId, Message>,
    labels: BTreeMap<LabelId, Label>,
    history: Vec<HistoryRecord>,
    history_id: u64,
    /// History at or below this ID has been discarded
    history_floor: u64,
    next_label: u64,
    message_faults: HashMap<MessageId, VecDeque<Fault>>,
    profile_fault: Option<Fault>,
    labels_fault: Option<Fault>,
    history_fault: Option<Fault>,
    create_label_faults: HashSet<String>,
    /// 1-based index of the `batch_modify` call that fails
    failing_modify_call: Option<usize>,
    modify_calls: Vec<ModifyCall>,
    get_message_calls: usize,
    list_history_calls: usize,
}

/// In-memory implementation of MailService
pub struct InMemoryMailService {
    state: Mutex<State>,
    page_size: usize,
}

impl InMemoryMailService {
    /// Create an empty mailbox starting at the given history ID
    pub fn new(history_id: u64) -> Self {
        let state = State {
            history_id,
            history_floor: history_id,
            ..Default::default()
        };
        Self {
            state: Mutex::new(state),
            page_size: 100,
        }
    }

    /// Builder method to set the listing page size
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Builder method to seed messages without writing history
    pub fn with_messages(self, messages: impl IntoIterator<Item = Message>) -> Self {
        {
            let mut state = self.lock();
            for message in messages {
                state.messages.insert(message.id.clone(), message);
            }
        }
        self
    }

    /// Builder method to seed labels
    pub fn with_labels(self, labels: impl IntoIterator<Item = Label>) -> Self {
        {
            let mut state = self.lock();
            for label in labels {
                state.labels.insert(label.id.clone(), label);
            }
        }
        self
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // === Remote-side changes (each one advances the history) ===

    /// Deliver a new message
    pub fn deliver(&self, message: Message) -> u64 {
        let mut state = self.lock();
        let id = message.id.clone();
        state.messages.insert(id.clone(), message);
        state.push_record(HistoryRecord {
            messages_added: vec![id],
            ..Default::default()
        })
    }

    /// Replace the labels of an existing message
    pub fn relabel<I, L>(&self, id: &MessageId, label_ids: I) -> Option<u64>
    where
        I: IntoIterator<Item = L>,
        L: Into<LabelId>,
    {
        let mut state = self.lock();
        let message = state.messages.get_mut(id)?;
        message.label_ids = label_ids.into_iter().map(Into::into).collect();
        Some(state.push_record(HistoryRecord {
            labels_added: vec![id.clone()],
            ..Default::default()
        }))
    }

    /// Permanently delete a message
    pub fn delete(&self, id: &MessageId) -> Option<u64> {
        let mut state = self.lock();
        state.messages.remove(id)?;
        Some(state.push_record(HistoryRecord {
            messages_deleted: vec![id.clone()],
            ..Default::default()
        }))
    }

    /// Drop all history so that incremental listing fails with NotFound
    pub fn expire_history(&self) {
        let mut state = self.lock();
        state.history.clear();
        state.history_floor = state.history_id;
    }

    // === Fault injection ===

    /// Queue faults returned by successive `get_message` calls for `id`
    pub fn fail_message(&self, id: &MessageId, faults: impl IntoIterator<Item = Fault>) {
        self.lock()
            .message_faults
            .entry(id.clone())
            .or_default()
            .extend(faults);
    }

    pub fn fail_profile(&self, fault: Option<Fault>) {
        self.lock().profile_fault = fault;
    }

    pub fn fail_labels(&self, fault: Option<Fault>) {
        self.lock().labels_fault = fault;
    }

    pub fn fail_history(&self, fault: Option<Fault>) {
        self.lock().history_fault = fault;
    }

    /// Make `create_label` fail for the given name
    pub fn fail_create_label(&self, name: &str) {
        self.lock().create_label_faults.insert(name.to_string());
    }

    /// Make the n-th `batch_modify` call (1-based) fail
    pub fn fail_modify_call(&self, n: usize) {
        self.lock().failing_modify_call = Some(n);
    }

    // === Inspection ===

    pub fn message(&self, id: &MessageId) -> Option<Message> {
        self.lock().messages.get(id).cloned()
    }

    /// Messages a full listing would return (no spam or trash)
    pub fn visible_messages(&self) -> Vec<Message> {
        self.lock()
            .messages
            .values()
            .filter(|m| !m.is_spam_or_trash())
            .cloned()
            .collect()
    }

    pub fn labels(&self) -> Vec<Label> {
        self.lock().labels.values().cloned().collect()
    }

    pub fn history_id(&self) -> u64 {
        self.lock().history_id
    }

    pub fn modify_calls(&self) -> Vec<ModifyCall> {
        self.lock().modify_calls.clone()
    }

    pub fn get_message_calls(&self) -> usize {
        self.lock().get_message_calls
    }

    pub fn list_history_calls(&self) -> usize {
        self.lock().list_history_calls
    }
}

impl State {
    fn push_record(&mut self, mut record: HistoryRecord) -> u64 {
        self.history_id += 1;
        record.history_id = self.history_id;
        self.history.push(record);
        self.history_id
    }
}

/// Slice `items` into a page starting at the offset encoded in `page_token`
fn paginate<T: Clone>(items: &[T], page_token: Option<&str>, page_size: usize) -> Result<Page<T>> {
    let offset = match page_token {
        Some(token) => token
            .parse::<usize>()
            .map_err(|_| Error::protocol(format!("invalid page token '{token}'")))?,
        None => 0,
    };
    let end = (offset + page_size).min(items.len());
    let page_items = items.get(offset..end).unwrap_or_default().to_vec();
    let next_page_token = (end < items.len()).then(|| end.to_string());
    Ok(Page {
        items: page_items,
        next_page_token,
    })
}

impl MailService for InMemoryMailService {
    fn get_profile(&self) -> Result<Profile> {
        let state = self.lock();
        if let Some(fault) = state.profile_fault {
            return Err(fault.into_error("profile"));
        }
        Ok(Profile {
            total_message_count: state
                .messages
                .values()
                .filter(|m| !m.is_spam_or_trash())
                .count() as u64,
            history_id: state.history_id,
        })
    }

    fn list_message_ids(&self, page_token: Option<&str>) -> Result<Page<MessageId>> {
        let state = self.lock();
        let ids: Vec<MessageId> = state
            .messages
            .values()
            .filter(|m| !m.is_spam_or_trash())
            .map(|m| m.id.clone())
            .collect();
        paginate(&ids, page_token, self.page_size)
    }

    fn get_message(&self, id: &MessageId) -> Result<Message> {
        let mut state = self.lock();
        state.get_message_calls += 1;
        if let Some(fault) = state.message_faults.get_mut(id).and_then(VecDeque::pop_front) {
            return Err(fault.into_error(id.as_str()));
        }
        state
            .messages
            .get(id)
            .cloned()
            .ok_or_else(|| Error::NotFound(id.to_string()))
    }

    fn list_history(
        &self,
        start_history_id: u64,
        page_token: Option<&str>,
    ) -> Result<Page<HistoryRecord>> {
        let mut state = self.lock();
        state.list_history_calls += 1;
        if let Some(fault) = state.history_fault {
            return Err(fault.into_error("history"));
        }
        if start_history_id < state.history_floor {
            return Err(Error::NotFound(format!("history {start_history_id}")));
        }
        let records: Vec<HistoryRecord> = state
            .history
            .iter()
            .filter(|r| r.history_id > start_history_id)
            .cloned()
            .collect();
        paginate(&records, page_token, self.page_size)
    }

    fn list_labels(&self) -> Result<Vec<Label>> {
        let state = self.lock();
        if let Some(fault) = state.labels_fault {
            return Err(fault.into_error("labels"));
        }
        Ok(state.labels.values().cloned().collect())
    }

    fn create_label(&self, name: &str) -> Result<Label> {
        let mut state = self.lock();
        if state.create_label_faults.contains(name) {
            return Err(Fault::Protocol(409).into_error(name));
        }
        state.next_label += 1;
        let label = Label::new(format!("Label_{}", state.next_label), name);
        state.labels.insert(label.id.clone(), label.clone());
        Ok(label)
    }

    fn batch_modify(&self, ids: &[MessageId], add: &[LabelId], remove: &[LabelId]) -> Result<()> {
        let mut state = self.lock();
        state.modify_calls.push(ModifyCall {
            ids: ids.to_vec(),
            add: add.to_vec(),
            remove: remove.to_vec(),
        });
        if state.failing_modify_call == Some(state.modify_calls.len()) {
            return Err(Fault::Protocol(500).into_error("batchModify"));
        }

        let mut changed = Vec::new();
        for id in ids {
            if let Some(message) = state.messages.get_mut(id) {
                let before: BTreeSet<LabelId> = message.label_ids.clone();
                message.label_ids.extend(add.iter().cloned());
                message.label_ids.retain(|l| !remove.contains(l));
                if message.label_ids != before {
                    changed.push(id.clone());
                }
            }
        }
        if !changed.is_empty() {
            state.push_record(HistoryRecord {
                labels_added: changed,
                ..Default::default()
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(id: &str) -> Message {
        Message::builder(id).from("a@example.com").label("INBOX").build()
    }

    #[test]
    fn test_listing_is_paginated_and_hides_trash() {
        let service = InMemoryMailService::new(1)
            .with_page_size(2)
            .with_messages(vec![
                message("m1"),
                message("m2"),
                message("m3"),
                Message::builder("m4").label("TRASH").build(),
            ]);

        let first = service.list_message_ids(None).unwrap();
        assert_eq!(first.items.len(), 2);
        let token = first.next_page_token.unwrap();
        let second = service.list_message_ids(Some(&token)).unwrap();
        assert_eq!(second.items, vec![MessageId::new("m3")]);
        assert!(second.next_page_token.is_none());
    }

    #[test]
    fn test_changes_advance_history() {
        let service = InMemoryMailService::new(10).with_messages(vec![message("m1")]);
        assert_eq!(service.deliver(message("m2")), 11);
        assert_eq!(service.relabel(&MessageId::new("m1"), ["Label_1"]), Some(12));
        assert_eq!(service.delete(&MessageId::new("m2")), Some(13));
        assert_eq!(service.delete(&MessageId::new("missing")), None);

        let page = service.list_history(11, None).unwrap();
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.items[0].history_id, 12);
    }

    #[test]
    fn test_expired_history_is_not_found() {
        let service = InMemoryMailService::new(10);
        service.deliver(message("m1"));
        service.expire_history();
        assert!(service.list_history(10, None).unwrap_err().is_not_found());
    }

    #[test]
    fn test_scripted_message_faults_are_consumed_in_order() {
        let service = InMemoryMailService::new(1).with_messages(vec![message("m1")]);
        let id = MessageId::new("m1");
        service.fail_message(&id, [Fault::RateLimited, Fault::Network]);

        assert!(matches!(service.get_message(&id), Err(Error::RateLimited(_))));
        assert!(matches!(service.get_message(&id), Err(Error::Network(_))));
        assert!(service.get_message(&id).is_ok());
        assert_eq!(service.get_message_calls(), 3);
    }
}
