//! Command line arguments

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};
use mailsort::DomainFilter;

/// Sorts Gmail messages by sender domains.
///
/// Local profiles store the Gmail access token and the message data. A new
/// profile requires a login at Gmail and a download of all message headers,
/// which might take a while. Later runs only fetch what changed.
#[derive(Parser, Debug)]
#[command(name = "gmailsort", version)]
pub struct Cli {
    /// Profile name to store the Gmail access token and message data under
    #[arg(short, long, value_name = "NAME")]
    pub profile: String,

    /// OAuth 2.0 client credentials file of your Google Cloud project
    #[arg(short, long, value_name = "FILE", default_value = "credentials.json")]
    pub credentials: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Default log filter; `-vvvv` on a subcommand turns on debug output
    pub fn log_filter(&self) -> &'static str {
        let verbose = match &self.command {
            Command::Analyze(args) => args.verbose,
            Command::Find(args) => args.verbose,
            Command::Call(_) => 0,
        };
        if verbose >= 4 { "debug" } else { "info" }
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Analyze messages (and create labels on demand)
    ///
    /// Extracts the domain names of the sender addresses of messages under a
    /// source label (e.g., name@info.[example].com) and optionally creates
    /// labels named after these domains.
    Analyze(AnalyzeArgs),

    /// Find labels (and sort messages on demand)
    ///
    /// Looks for labels matching the sender domains of messages under a
    /// source label and optionally sorts the messages, adding the domain
    /// label and removing their source label.
    Find(FindArgs),

    /// Issue raw Gmail API calls
    ///
    /// Methods are addressed by joining their names with an underscore, e.g.
    /// `messages_list` for users.messages.list, followed by key=value
    /// arguments such as labelIds='["INBOX"]'. Without a verb, calls are read
    /// from standard input one per line.
    Call(CallCommand),
}

#[derive(Args, Debug)]
pub struct AnalyzeArgs {
    /// Only analyze messages under this label (SPAM, TRASH, SENT and DRAFT
    /// are always excluded)
    #[arg(short, long, value_name = "LABEL")]
    pub src_label: Option<String>,

    /// Create the resulting labels under this label instead of top level
    #[arg(short, long, value_name = "LABEL")]
    pub dst_label: Option<String>,

    #[command(flatten)]
    pub domains: DomainSelection,

    /// Print details (v: label names, vv: fully qualified domain names,
    /// vvv: message snippets, vvvv: message data)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Actually create the labels (modifies Gmail data)
    #[arg(short = 'l', long)]
    pub create_labels: bool,
}

#[derive(Args, Debug)]
pub struct FindArgs {
    /// Only analyze messages under this label (SPAM, TRASH, SENT and DRAFT
    /// are always excluded)
    #[arg(short, long, value_name = "LABEL")]
    pub src_label: Option<String>,

    /// Look for labels under this label instead of top level
    #[arg(short, long, value_name = "LABEL")]
    pub dst_label: Option<String>,

    #[command(flatten)]
    pub domains: DomainSelection,

    /// Print details (v: domains with labels found, vv: domains without
    /// labels, vvv: both)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Actually sort the messages (modifies Gmail data)
    #[arg(short = 'm', long)]
    pub sort_messages: bool,
}

#[derive(Args, Debug)]
pub struct DomainSelection {
    /// Only process these domains
    #[arg(short, long, value_name = "DOMAIN", conflicts_with = "exclude")]
    pub include: Vec<String>,

    /// Process all domains except these
    #[arg(short, long, value_name = "DOMAIN")]
    pub exclude: Vec<String>,
}

impl DomainSelection {
    pub fn filter(&self) -> DomainFilter {
        if !self.include.is_empty() {
            DomainFilter::Include(self.include.clone())
        } else if !self.exclude.is_empty() {
            DomainFilter::Exclude(self.exclude.clone())
        } else {
            DomainFilter::All
        }
    }
}

#[derive(Args, Debug)]
pub struct CallCommand {
    /// API method, e.g. labels_list
    pub verb: Option<String>,

    /// Method arguments; values are parsed as JSON, else taken as a string
    #[arg(value_name = "KEY=VALUE", requires = "verb")]
    pub args: Vec<String>,
}
