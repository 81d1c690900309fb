//! Domain classification of mirrored messages
//!
//! Groups messages by the registrable domain of their sender and, inside
//! each domain, by the sender's fully qualified host name.

mod domain;
mod sender;

use std::collections::BTreeMap;

use log::{debug, warn};

pub use domain::registrable_label;
pub use sender::{fqdn, sender_address};

use crate::models::{LabelId, LabelPath, Message, MessageId, Mirror};

/// `domain -> fqdn -> messages`; message order inside a list is unspecified
pub type DomainGroups<'a> = BTreeMap<String, BTreeMap<String, Vec<&'a Message>>>;

/// Messages carrying any of these labels are never classified
const EXCLUDED_LABELS: [&str; 3] = [LabelId::DRAFT, LabelId::SENT, LabelId::CHAT];

/// Result of classifying a mirror
#[derive(Debug, Default)]
pub struct Classification<'a> {
    pub groups: DomainGroups<'a>,
    /// Messages whose From header holds no usable address
    pub unclassified: Vec<MessageId>,
}

/// Which domains to keep after classification
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum DomainFilter {
    #[default]
    All,
    Include(Vec<String>),
    Exclude(Vec<String>),
}

impl<'a> Classification<'a> {
    pub fn domains(&self) -> impl Iterator<Item = &str> {
        self.groups.keys().map(String::as_str)
    }

    pub fn domain_count(&self) -> usize {
        self.groups.len()
    }

    /// Number of classified messages
    pub fn message_count(&self) -> usize {
        self.groups
            .values()
            .flat_map(BTreeMap::values)
            .map(Vec::len)
            .sum()
    }

    /// All messages of one domain across its hosts
    pub fn domain_messages(&self, domain: &str) -> Vec<&'a Message> {
        self.groups
            .get(domain)
            .map(|hosts| hosts.values().flatten().copied().collect())
            .unwrap_or_default()
    }

    /// Keep only the domains selected by `filter`
    ///
    /// Returns the requested domain names that were not found; they are
    /// also logged and otherwise ignored.
    pub fn apply_filter(&mut self, filter: &DomainFilter) -> Vec<String> {
        let (names, include) = match filter {
            DomainFilter::All => return Vec::new(),
            DomainFilter::Include(names) => (names, true),
            DomainFilter::Exclude(names) => (names, false),
        };

        let wanted: Vec<String> = names.iter().map(|n| n.trim().to_lowercase()).collect();
        let unknown: Vec<String> = wanted
            .iter()
            .filter(|n| !self.groups.contains_key(n.as_str()))
            .cloned()
            .collect();
        for name in &unknown {
            warn!("Domain '{}' not found among classified messages", name);
        }

        self.groups
            .retain(|domain, _| wanted.contains(domain) == include);
        unknown
    }
}

/// Group the messages of `mirror` by sender domain
///
/// With a `scope` label path, only messages holding a label at or below it
/// are considered. Drafts, sent mail and chats are always skipped.
pub fn classify<'a>(mirror: &'a Mirror, scope: Option<&str>) -> Classification<'a> {
    let scope = scope.map(LabelPath::parse);
    let mut classification = Classification::default();

    for message in mirror.messages() {
        if let Some(scope) = &scope
            && mirror.message_labels_at_or_below(message, scope).is_empty()
        {
            continue;
        }
        if EXCLUDED_LABELS.iter().any(|label| message.has_label(label)) {
            continue;
        }

        let Some(host) = message
            .from_header()
            .and_then(sender_address)
            .as_deref()
            .and_then(fqdn)
            .map(str::to_string)
        else {
            warn!(
                "Cannot determine sender of message {} (From: {:?})",
                message.id,
                message.from_header().unwrap_or_default()
            );
            classification.unclassified.push(message.id.clone());
            continue;
        };

        let domain = registrable_label(&host).to_string();
        classification
            .groups
            .entry(domain)
            .or_default()
            .entry(host)
            .or_default()
            .push(message);
    }

    debug!(
        "Classified {} messages into {} domains ({} unclassified)",
        classification.message_count(),
        classification.domain_count(),
        classification.unclassified.len()
    );
    classification
}
