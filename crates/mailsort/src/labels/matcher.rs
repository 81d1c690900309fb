//! Label lookup by last path segment and source-label partitioning

use std::collections::BTreeMap;

use log::warn;

use crate::models::{Label, LabelId, LabelPath, Message, Mirror};

/// Outcome of looking up a destination label for one domain
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution<'a> {
    Missing,
    Unique(&'a Label),
    /// Every matching label, sorted by name
    Ambiguous(Vec<&'a Label>),
}

/// Turn the hits for one name into a [`Resolution`]
pub fn resolve<'a>(hits: &[&'a Label]) -> Resolution<'a> {
    match hits {
        [] => Resolution::Missing,
        [label] => Resolution::Unique(*label),
        _ => {
            let mut labels = hits.to_vec();
            labels.sort_by(|a, b| a.name.cmp(&b.name));
            Resolution::Ambiguous(labels)
        }
    }
}

/// Find labels whose last path segment equals each of `names`
///
/// Only labels at or below `scope` are considered. Comparison ignores
/// case. A label whose last segment merely contains the name is logged as
/// a near miss and not returned. Every requested name gets an entry, empty
/// when nothing matched.
pub fn find_labels_by_suffix<'a, I, S>(
    mirror: &'a Mirror,
    names: I,
    scope: Option<&str>,
) -> BTreeMap<String, Vec<&'a Label>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let scope = scope.map(LabelPath::parse);
    let candidates: Vec<(&Label, String)> = mirror
        .labels_at_or_below(scope.as_ref())
        .filter_map(|label| {
            let last = label.path().last()?.to_string();
            Some((label, last))
        })
        .collect();

    let mut found = BTreeMap::new();
    for name in names {
        let name = name.as_ref();
        let wanted = name.trim().to_lowercase();
        let mut hits = Vec::new();
        for (label, last) in &candidates {
            if *last == wanted {
                hits.push(*label);
            } else if !wanted.is_empty() && last.contains(&wanted) {
                warn!("Found inexact label match for '{}': '{}'", wanted, label.name);
            }
        }
        found.insert(name.to_string(), hits);
    }
    found
}

/// Group messages by their single label at or below `source`
///
/// The source label itself counts. Messages with none or several such
/// labels, and every message when there is no source, land in the `None`
/// bucket.
pub fn partition_by_source_label<'a>(
    mirror: &Mirror,
    messages: &[&'a Message],
    source: Option<&str>,
) -> BTreeMap<Option<LabelId>, Vec<&'a Message>> {
    let source = source.map(LabelPath::parse);
    let mut buckets: BTreeMap<Option<LabelId>, Vec<&'a Message>> = BTreeMap::new();

    for message in messages {
        let key = source.as_ref().and_then(|source| {
            match mirror.message_labels_at_or_below(message, source).as_slice() {
                [label] => Some(label.id.clone()),
                _ => None,
            }
        });
        buckets.entry(key).or_default().push(*message);
    }
    buckets
}
