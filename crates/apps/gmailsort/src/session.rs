//! One authenticated profile: its directory, Gmail client and engine settings

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use log::info;
use mailsort::{
    ActionHandler, Classification, DomainFilter, EngineConfig, FileMirrorStore, GmailAuth,
    GmailClient, GmailCredentials, Mirror, SyncEngine,
};

use crate::cli::DomainSelection;

pub struct Session {
    pub profile_dir: PathBuf,
    pub engine: EngineConfig,
    pub client: Arc<GmailClient>,
}

impl Session {
    /// Resolve the profile directory and log in to Gmail
    pub fn open(profile: &str, credentials_file: &Path) -> Result<Self> {
        let engine = EngineConfig::load().context("Failed to load engine settings")?;
        let profile_dir = config::ensure_dir(&engine.profile_dir(profile)?)?;

        let credentials = GmailCredentials::load(credentials_file)?;
        let auth = GmailAuth::for_profile(&credentials, &profile_dir);
        let client = GmailClient::new(auth).with_page_size(engine.page_size);
        client
            .authenticate()
            .with_context(|| format!("Gmail login for profile '{}' failed", profile))?;

        Ok(Self {
            profile_dir,
            engine,
            client: Arc::new(client),
        })
    }

    /// Bring the profile's mirror up to date and return it
    pub fn synchronize(&self) -> Result<Mirror> {
        let store = FileMirrorStore::new(&self.profile_dir)?;
        let (mirror, stats) = SyncEngine::new(&*self.client, &store, &self.engine)
            .run()
            .context("Synchronization failed")?;

        info!(
            "Synchronized {} messages ({:?}: {} fetched, {} removed) in {}ms",
            mirror.message_count(),
            stats.mode,
            stats.messages_fetched,
            stats.messages_removed,
            stats.duration_ms
        );
        Ok(mirror)
    }

    pub fn actions(&self) -> ActionHandler {
        ActionHandler::new(self.client.clone(), &self.engine)
    }
}

/// Fail unless every given label exists in the mirror
pub fn check_labels_exist<'a>(
    mirror: &Mirror,
    labels: impl IntoIterator<Item = Option<&'a str>>,
) -> Result<()> {
    for label in labels.into_iter().flatten() {
        if !mirror.label_exists(label) {
            bail!("Label '{}' does not exist", label);
        }
    }
    Ok(())
}

/// Keep the selected domains, announcing the selection first
///
/// Requested domains that were not classified are logged and ignored.
pub fn select_domains(classification: &mut Classification<'_>, selection: &DomainSelection) {
    let filter = selection.filter();
    match &filter {
        DomainFilter::All => return,
        DomainFilter::Include(names) => {
            println!("Only process {} domains: {:?}", names.len(), names)
        }
        DomainFilter::Exclude(names) => {
            println!("Process all except {} domains: {:?}", names.len(), names)
        }
    }
    classification.apply_filter(&filter);
}

/// Full label name of a domain below an optional parent label
pub fn domain_label(parent: Option<&str>, domain: &str) -> String {
    match parent {
        Some(parent) => format!("{}/{}", parent, domain),
        None => domain.to_string(),
    }
}
