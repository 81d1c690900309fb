//! `find`: match sender domains to existing labels and sort messages

use std::collections::BTreeMap;

use anyhow::Result;
use mailsort::{DomainOutcome, Label, classify, find_labels_by_suffix};

use crate::cli::FindArgs;
use crate::session::{Session, check_labels_exist, domain_label, select_domains};

pub fn run(session: &Session, args: &FindArgs) -> Result<()> {
    let mirror = session.synchronize()?;
    let src = args.src_label.as_deref();
    let dst = args.dst_label.as_deref();
    check_labels_exist(&mirror, [src, dst])?;

    let mut classification = classify(&mirror, src);
    select_domains(&mut classification, &args.domains);

    let placement = match dst {
        Some(dst) => format!("from '{}'", dst),
        None => "top level".to_string(),
    };
    println!(
        "Find labels for {} domains {}",
        classification.domain_count(),
        placement
    );

    let found = find_labels_by_suffix(&mirror, classification.domains(), dst);
    print_matches(&found, src, args.verbose);

    if args.sort_messages {
        println!("Sort messages");
        let actions = session.actions();
        for domain in classification.domains() {
            let hits = found.get(domain).map(Vec::as_slice).unwrap_or_default();
            let messages = classification.domain_messages(domain);
            let outcome = actions.sort_domain(&mirror, domain, &messages, hits, src)?;

            let name = domain_label(src, domain);
            match outcome {
                DomainOutcome::NoLabel => println!("{}: no label found, ignore", name),
                DomainOutcome::Ambiguous(labels) => {
                    println!("{}: multiple labels found, ignore: {:?}", name, labels)
                }
                DomainOutcome::Sorted {
                    destination,
                    moved,
                    unchanged,
                } => println!(
                    "{}: {} messages moved to '{}', {} already there",
                    name, moved, destination, unchanged
                ),
            }
        }
    }

    Ok(())
}

/// v: domains with labels, vv: domains without, vvv: both
fn print_matches(found: &BTreeMap<String, Vec<&Label>>, src: Option<&str>, verbose: u8) {
    let with_labels = verbose == 1 || verbose > 2;
    let without_labels = verbose >= 2;

    for (domain, labels) in found {
        if labels.is_empty() {
            if without_labels {
                println!("{}", domain_label(src, domain));
                println!("    no label found");
            }
        } else if with_labels {
            println!("{}", domain_label(src, domain));
            let mut names: Vec<&str> = labels.iter().map(|l| l.name.as_str()).collect();
            names.sort_unstable();
            for name in names {
                println!("    {}", name);
            }
        }
    }
}
