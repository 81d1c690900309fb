//! `analyze`: group messages by sender domain and create domain labels

use anyhow::{Context, Result};
use log::info;
use mailsort::{Classification, classify};

use crate::cli::AnalyzeArgs;
use crate::session::{Session, check_labels_exist, domain_label, select_domains};

pub fn run(session: &Session, args: &AnalyzeArgs) -> Result<()> {
    let mirror = session.synchronize()?;
    check_labels_exist(&mirror, [args.src_label.as_deref()])?;

    let mut classification = classify(&mirror, args.src_label.as_deref());
    select_domains(&mut classification, &args.domains);

    let dst = args.dst_label.as_deref();
    let placement = match dst {
        Some(dst) => format!("under '{}'", dst),
        None => "top level".to_string(),
    };
    println!(
        "{} envisaged labels {}",
        classification.domain_count(),
        placement
    );
    print_details(&classification, dst, args.verbose)?;

    if args.create_labels {
        println!("Create labels");
        let names: Vec<String> = dst
            .map(str::to_string)
            .into_iter()
            .chain(classification.domains().map(|domain| domain_label(dst, domain)))
            .collect();
        let created = session.actions().create_labels_if_absent(&mirror, &names)?;
        info!("Created {} of {} labels", created.len(), names.len());
    }

    Ok(())
}

fn print_details(
    classification: &Classification<'_>,
    dst: Option<&str>,
    verbose: u8,
) -> Result<()> {
    if verbose == 0 {
        return Ok(());
    }

    for (domain, hosts) in &classification.groups {
        println!("{}", domain_label(dst, domain));
        if verbose <= 1 {
            continue;
        }

        for (host, messages) in hosts {
            println!("    {}: {} messages", host, messages.len());
            if verbose <= 2 {
                continue;
            }

            for message in messages {
                if verbose == 3 {
                    println!("        {}", message.snippet);
                } else {
                    let json = serde_json::to_string_pretty(message)
                        .with_context(|| format!("Failed to render message {}", message.id))?;
                    println!("{}", json);
                }
            }
        }
    }
    Ok(())
}
