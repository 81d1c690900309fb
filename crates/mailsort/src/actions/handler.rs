//! Action handler for label mutations
//!
//! Turns classifier output into remote label changes. The mirror is only
//! read here; the next sync picks up the changes through the history.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use log::{info, warn};

use crate::classify::Classification;
use crate::config::EngineConfig;
use crate::error::Result;
use crate::fetch::modify_labels;
use crate::labels::{Resolution, find_labels_by_suffix, partition_by_source_label, resolve};
use crate::models::{Label, LabelId, LabelPath, Message, MessageId, Mirror};
use crate::service::MailService;

/// What happened to one domain during sorting
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomainOutcome {
    /// No destination label matched
    NoLabel,
    /// Several destination labels matched; their names
    Ambiguous(Vec<String>),
    /// Messages were moved to `destination`
    Sorted {
        destination: String,
        moved: usize,
        /// Messages already carrying the destination as their source label
        unchanged: usize,
    },
}

/// Per-domain outcomes of a sorting run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SortReport {
    pub outcomes: BTreeMap<String, DomainOutcome>,
}

impl SortReport {
    /// Total number of messages that got the destination label
    pub fn moved(&self) -> usize {
        self.outcomes
            .values()
            .map(|outcome| match outcome {
                DomainOutcome::Sorted { moved, .. } => *moved,
                _ => 0,
            })
            .sum()
    }
}

/// Handler for label actions: creating labels and sorting messages
///
/// Every remote mutation goes through the fetch executor's chunked
/// batch mutator, so a failure stops the run with the applied chunks
/// left in place.
pub struct ActionHandler {
    remote: Arc<dyn MailService>,
    batch_size: usize,
}

impl ActionHandler {
    /// Create a new action handler
    pub fn new(remote: Arc<dyn MailService>, config: &EngineConfig) -> Self {
        Self {
            remote,
            batch_size: config.batch_size,
        }
    }

    /// Create each label in `names` that the mirror does not know yet
    ///
    /// Existence is checked on the full path, ignoring case. The first
    /// failed creation aborts the rest; labels created before it stay.
    /// Returns the labels that were created.
    pub fn create_labels_if_absent<S: AsRef<str>>(
        &self,
        mirror: &Mirror,
        names: &[S],
    ) -> Result<Vec<Label>> {
        let mut seen: HashSet<LabelPath> = HashSet::new();
        let mut created = Vec::new();

        for name in names {
            let name = name.as_ref();
            let path = LabelPath::parse(name);
            if mirror.label_exists(name) || !seen.insert(path) {
                info!("Label '{}' already exists", name);
                continue;
            }

            let label = self.remote.create_label(name).inspect_err(|e| {
                warn!("Failed to create label '{}': {}", name, e);
            })?;
            info!("Created label '{}' ({})", label.name, label.id);
            created.push(label);
        }

        Ok(created)
    }

    /// Move the messages of one domain to its destination label
    ///
    /// `hits` are the destination candidates found for the domain. With
    /// none or several nothing is changed. With exactly one, the messages
    /// are grouped by their label at or below `source` and each group gets
    /// one batched change adding the destination and removing its source.
    /// A group whose source already is the destination is left alone.
    pub fn sort_domain(
        &self,
        mirror: &Mirror,
        domain: &str,
        messages: &[&Message],
        hits: &[&Label],
        source: Option<&str>,
    ) -> Result<DomainOutcome> {
        let destination = match resolve(hits) {
            Resolution::Missing => {
                warn!("{}: no label found, ignoring", domain);
                return Ok(DomainOutcome::NoLabel);
            }
            Resolution::Ambiguous(labels) => {
                let names: Vec<String> = labels.iter().map(|l| l.name.clone()).collect();
                warn!("{}: multiple labels found, ignoring: {:?}", domain, names);
                return Ok(DomainOutcome::Ambiguous(names));
            }
            Resolution::Unique(label) => label,
        };

        let mut moved = 0;
        let mut unchanged = 0;
        for (source_id, bucket) in partition_by_source_label(mirror, messages, source) {
            if source_id.as_ref() == Some(&destination.id) {
                info!(
                    "{}: {} messages already in '{}'",
                    domain,
                    bucket.len(),
                    destination.name
                );
                unchanged += bucket.len();
                continue;
            }

            let remove: Vec<LabelId> = source_id.into_iter().collect();
            match remove.first().and_then(|id| mirror.label(id)) {
                Some(from) => info!(
                    "{}: add label '{}', remove label '{}' on {} messages",
                    domain,
                    destination.name,
                    from.name,
                    bucket.len()
                ),
                None => info!(
                    "{}: add label '{}' on {} messages",
                    domain,
                    destination.name,
                    bucket.len()
                ),
            }

            let ids: Vec<MessageId> = bucket.iter().map(|m| m.id.clone()).collect();
            moved += modify_labels(
                &*self.remote,
                &ids,
                std::slice::from_ref(&destination.id),
                &remove,
                self.batch_size,
            )?;
        }

        Ok(DomainOutcome::Sorted {
            destination: destination.name.clone(),
            moved,
            unchanged,
        })
    }

    /// Sort every classified domain into its label below `destination_scope`
    ///
    /// Stops at the first failed mutation.
    pub fn sort_messages(
        &self,
        mirror: &Mirror,
        classification: &Classification<'_>,
        source: Option<&str>,
        destination_scope: Option<&str>,
    ) -> Result<SortReport> {
        let found = find_labels_by_suffix(mirror, classification.domains(), destination_scope);
        let mut report = SortReport::default();

        for domain in classification.domains() {
            let hits = found.get(domain).map(Vec::as_slice).unwrap_or_default();
            let messages = classification.domain_messages(domain);
            let outcome = self.sort_domain(mirror, domain, &messages, hits, source)?;
            report.outcomes.insert(domain.to_string(), outcome);
        }

        info!("Sorted {} messages", report.moved());
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::classify;
    use crate::service::InMemoryMailService;

    fn setup() -> (Arc<InMemoryMailService>, Mirror) {
        let labels = vec![
            Label::system("INBOX", "INBOX"),
            Label::new("Label_1", "Sorted"),
            Label::new("Label_2", "Sorted/Shops/Example"),
            Label::new("Label_3", "Sorted/Old/Bank"),
            Label::new("Label_4", "Sorted/New/Bank"),
        ];
        let messages = vec![
            Message::builder("m1").from("a@shop.example.com").label("INBOX").build(),
            Message::builder("m2").from("b@mail.example.com").label("INBOX").build(),
            Message::builder("m3").from("c@example.com").label("Label_2").build(),
            Message::builder("m4").from("d@bank.com").label("INBOX").build(),
            Message::builder("m5").from("e@unknown.org").label("INBOX").build(),
        ];
        let remote = InMemoryMailService::new(1)
            .with_messages(messages.clone())
            .with_labels(labels.clone());
        (Arc::new(remote), Mirror::new(messages, 1).with_labels(labels))
    }

    fn handler(remote: &Arc<InMemoryMailService>) -> ActionHandler {
        ActionHandler::new(remote.clone(), &EngineConfig::default())
    }

    #[test]
    fn test_create_labels_skips_existing() {
        let (remote, mirror) = setup();
        let names = ["sorted", "Sorted/example", "Sorted/Example", "Sorted/bank"];
        let created = handler(&remote)
            .create_labels_if_absent(&mirror, &names)
            .unwrap();

        let names: Vec<&str> = created.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, ["Sorted/example", "Sorted/bank"]);
    }

    #[test]
    fn test_create_labels_stops_at_first_failure() {
        let (remote, mirror) = setup();
        remote.fail_create_label("Sorted/b");

        let names = ["Sorted/a", "Sorted/b", "Sorted/c"];
        let result = handler(&remote).create_labels_if_absent(&mirror, &names);

        assert!(result.is_err());
        let names: Vec<String> = remote.labels().into_iter().map(|l| l.name).collect();
        assert!(names.contains(&"Sorted/a".to_string()));
        assert!(!names.contains(&"Sorted/c".to_string()));
    }

    #[test]
    fn test_sort_moves_source_buckets_and_skips_destination() {
        let (remote, mirror) = setup();
        let classification = classify(&mirror, None);

        let report = handler(&remote)
            .sort_messages(&mirror, &classification, Some("inbox"), Some("sorted"))
            .unwrap();

        assert_eq!(
            report.outcomes["example"],
            DomainOutcome::Sorted {
                destination: "Sorted/Shops/Example".into(),
                moved: 3,
                unchanged: 0,
            }
        );
        let calls = remote.modify_calls();
        assert_eq!(calls.len(), 2);
        let inbox_call = calls.iter().find(|c| c.remove == [LabelId::new("INBOX")]).unwrap();
        assert_eq!(inbox_call.add, [LabelId::new("Label_2")]);
        assert_eq!(inbox_call.ids.len(), 2);
        assert!(remote.message(&MessageId::new("m1")).unwrap().has_label("Label_2"));
        assert!(!remote.message(&MessageId::new("m1")).unwrap().has_label("INBOX"));
    }

    #[test]
    fn test_ambiguous_domain_is_not_touched() {
        let (remote, mirror) = setup();
        let classification = classify(&mirror, None);

        let report = handler(&remote)
            .sort_messages(&mirror, &classification, Some("inbox"), Some("sorted"))
            .unwrap();

        assert_eq!(
            report.outcomes["bank"],
            DomainOutcome::Ambiguous(vec!["Sorted/New/Bank".into(), "Sorted/Old/Bank".into()])
        );
        assert_eq!(report.outcomes["unknown"], DomainOutcome::NoLabel);
        assert!(
            remote
                .modify_calls()
                .iter()
                .all(|c| !c.ids.contains(&MessageId::new("m4")))
        );
    }

    #[test]
    fn test_group_already_in_destination_is_skipped() {
        let (remote, mirror) = setup();
        let labels: Vec<&Label> = mirror.label(&LabelId::new("Label_2")).into_iter().collect();
        let m3 = mirror.message(&MessageId::new("m3")).unwrap();

        let outcome = handler(&remote)
            .sort_domain(&mirror, "example", &[m3], &labels, Some("sorted"))
            .unwrap();

        assert_eq!(
            outcome,
            DomainOutcome::Sorted {
                destination: "Sorted/Shops/Example".into(),
                moved: 0,
                unchanged: 1,
            }
        );
        assert!(remote.modify_calls().is_empty());
    }
}
