//! Mirror synchronization engine
//!
//! Each call runs a small state machine from a fresh start:
//!
//! ```text
//! FetchProfile ─┬─ no prior mirror ────────────► Bootstrapping ─┐
//!               ├─ remote cursor > local ──────► Diffing ───────┤ (expired → Bootstrapping)
//!               └─ remote cursor <= local ─────► UpToDate ──────┤
//!                                                               ▼
//!                                 RefreshingLabels ─► Committing ─► Done
//! ```
//!
//! The mirror is only handed to the store in `Committing`, so a failure in
//! any earlier phase leaves the durable copy exactly as it was.

use std::collections::HashSet;
use std::time::Instant;

use chrono::{DateTime, Utc};
use log::{debug, info, warn};

use super::HistoryDiff;
use crate::config::EngineConfig;
use crate::error::Result;
use crate::fetch::{fetch_messages, paginate};
use crate::models::{MessageId, Mirror, Profile};
use crate::service::MailService;
use crate::storage::MirrorStore;

/// Phases of one synchronization run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    FetchProfile,
    Bootstrapping,
    Diffing,
    UpToDate,
    RefreshingLabels,
    Committing,
    Done,
}

/// How the message map was brought up to date
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SyncMode {
    /// Full listing and fetch
    #[default]
    Bootstrap,
    /// History diff applied to the prior mirror
    Incremental,
    /// Nothing changed remotely
    NoOp,
}

/// Statistics from a sync operation
#[derive(Debug, Default, Clone)]
pub struct SyncStats {
    pub mode: SyncMode,
    /// Number of message details downloaded
    pub messages_fetched: usize,
    /// Number of messages dropped from the mirror
    pub messages_removed: usize,
    /// Number of history records read
    pub history_records: usize,
    /// Phases entered, in order
    pub phases: Vec<SyncPhase>,
    /// Duration of the sync operation
    pub duration_ms: u64,
    pub completed_at: Option<DateTime<Utc>>,
}

/// State carried between phases
enum Step {
    FetchProfile,
    Bootstrap { profile: Profile },
    Diff { profile: Profile, prior: Mirror },
    UpToDate { prior: Mirror },
    RefreshLabels { mirror: Mirror },
    Commit { mirror: Mirror },
    Done { mirror: Mirror },
}

impl Step {
    fn phase(&self) -> SyncPhase {
        match self {
            Step::FetchProfile => SyncPhase::FetchProfile,
            Step::Bootstrap { .. } => SyncPhase::Bootstrapping,
            Step::Diff { .. } => SyncPhase::Diffing,
            Step::UpToDate { .. } => SyncPhase::UpToDate,
            Step::RefreshLabels { .. } => SyncPhase::RefreshingLabels,
            Step::Commit { .. } => SyncPhase::Committing,
            Step::Done { .. } => SyncPhase::Done,
        }
    }
}

/// Brings the local mirror of one profile in line with the remote mailbox
pub struct SyncEngine<'a> {
    remote: &'a dyn MailService,
    store: &'a dyn MirrorStore,
    config: &'a EngineConfig,
}

impl<'a> SyncEngine<'a> {
    pub fn new(
        remote: &'a dyn MailService,
        store: &'a dyn MirrorStore,
        config: &'a EngineConfig,
    ) -> Self {
        Self {
            remote,
            store,
            config,
        }
    }

    /// Run one synchronization and return the committed mirror
    ///
    /// The first failure aborts the run; no partial mirror is returned and
    /// nothing is written to the store.
    pub fn run(&self) -> Result<(Mirror, SyncStats)> {
        let start = Instant::now();
        let mut stats = SyncStats::default();
        let mut step = Step::FetchProfile;

        let mirror = loop {
            stats.phases.push(step.phase());
            debug!("Sync phase: {:?}", step.phase());

            step = match step {
                Step::FetchProfile => self.fetch_profile()?,
                Step::Bootstrap { profile } => {
                    stats.mode = SyncMode::Bootstrap;
                    let mirror = self.bootstrap(&profile, &mut stats)?;
                    Step::RefreshLabels { mirror }
                }
                Step::Diff { profile, prior } => {
                    stats.mode = SyncMode::Incremental;
                    match self.diff(&profile, prior, &mut stats)? {
                        Some(mirror) => Step::RefreshLabels { mirror },
                        None => Step::Bootstrap { profile },
                    }
                }
                Step::UpToDate { prior } => {
                    stats.mode = SyncMode::NoOp;
                    Step::RefreshLabels { mirror: prior }
                }
                Step::RefreshLabels { mut mirror } => {
                    let labels = self.remote.list_labels()?;
                    debug!("Refreshed {} labels", labels.len());
                    mirror.replace_labels(labels);
                    Step::Commit { mirror }
                }
                Step::Commit { mirror } => {
                    self.store.save(&mirror)?;
                    Step::Done { mirror }
                }
                Step::Done { mirror } => break mirror,
            };
        };

        stats.duration_ms = start.elapsed().as_millis() as u64;
        stats.completed_at = Some(Utc::now());
        info!(
            "Sync complete ({:?}): {} messages, {} fetched, {} removed in {}ms",
            stats.mode,
            mirror.message_count(),
            stats.messages_fetched,
            stats.messages_removed,
            stats.duration_ms
        );
        Ok((mirror, stats))
    }

    fn fetch_profile(&self) -> Result<Step> {
        let profile = self.remote.get_profile()?;
        info!(
            "Mailbox has {} messages at history {}",
            profile.total_message_count, profile.history_id
        );

        let step = match self.store.load()? {
            None => Step::Bootstrap { profile },
            Some(prior) if profile.history_id > prior.history_id() => Step::Diff { profile, prior },
            Some(prior) => {
                if profile.history_id < prior.history_id() {
                    warn!(
                        "Remote history {} is behind local history {}; keeping local mirror",
                        profile.history_id,
                        prior.history_id()
                    );
                }
                Step::UpToDate { prior }
            }
        };
        Ok(step)
    }

    /// Full listing and fetch
    ///
    /// The cursor is the one read before listing started. Messages that
    /// arrive while the listing runs are picked up by the next sync.
    fn bootstrap(&self, profile: &Profile, stats: &mut SyncStats) -> Result<Mirror> {
        info!("Building mirror from scratch");
        let ids = paginate("message ids", |token| self.remote.list_message_ids(token))?;
        info!("Listed {} messages", ids.len());

        let fetched = fetch_messages(self.remote, &ids, self.config)?;
        stats.messages_fetched = fetched.len();
        Ok(Mirror::new(fetched, profile.history_id))
    }

    /// Apply the remote history since the prior cursor
    ///
    /// Returns `None` when the history no longer reaches back to the prior
    /// cursor and the mirror has to be rebuilt.
    fn diff(
        &self,
        profile: &Profile,
        mut prior: Mirror,
        stats: &mut SyncStats,
    ) -> Result<Option<Mirror>> {
        let start_history_id = prior.history_id();
        info!(
            "Applying history {} -> {}",
            start_history_id, profile.history_id
        );

        let records = match paginate("history", |token| {
            self.remote.list_history(start_history_id, token)
        }) {
            Ok(records) => records,
            Err(e) if e.is_not_found() => {
                warn!("History {} has expired, rebuilding mirror", start_history_id);
                return Ok(None);
            }
            Err(e) => return Err(e),
        };
        stats.history_records = records.len();

        let diff = HistoryDiff::from_records(&records);
        let to_fetch = diff.to_fetch();
        debug!(
            "History: {} added, {} relabeled, {} deleted",
            diff.added.len(),
            diff.label_changed.len(),
            diff.deleted.len()
        );

        let fetched = fetch_messages(self.remote, &to_fetch, self.config)?;
        stats.messages_fetched = fetched.len();

        // IDs the service no longer knows are gone even without a deletion record
        let returned: HashSet<&MessageId> = fetched.iter().map(|m| &m.id).collect();
        let vanished: Vec<MessageId> = to_fetch
            .iter()
            .filter(|id| !returned.contains(id))
            .cloned()
            .collect();

        let deleted = diff.deleted.iter().cloned().chain(vanished);
        let (_, removed) = prior.apply_changes(fetched, deleted, profile.history_id);
        stats.messages_removed = removed;
        Ok(Some(prior))
    }
}

/// Run one synchronization and return the committed mirror
pub fn synchronize(
    remote: &dyn MailService,
    store: &dyn MirrorStore,
    config: &EngineConfig,
) -> Result<Mirror> {
    SyncEngine::new(remote, store, config)
        .run()
        .map(|(mirror, _)| mirror)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::models::{Label, Message};
    use crate::service::{Fault, InMemoryMailService};
    use crate::storage::InMemoryMirrorStore;

    fn config() -> EngineConfig {
        EngineConfig {
            concurrency: 2,
            backoff_base_ms: 0,
            ..Default::default()
        }
    }

    fn message(id: &str, from: &str) -> Message {
        Message::builder(id).from(from).label("INBOX").build()
    }

    fn service() -> InMemoryMailService {
        InMemoryMailService::new(100)
            .with_page_size(2)
            .with_messages(vec![
                message("m1", "a@shop.example.com"),
                message("m2", "b@bank.example"),
                message("m3", "c@news.example.org"),
                Message::builder("m4").label("SPAM").build(),
            ])
            .with_labels(vec![
                Label::system("INBOX", "INBOX"),
                Label::new("Label_1", "Shops"),
            ])
    }

    fn run(
        remote: &InMemoryMailService,
        store: &InMemoryMirrorStore,
    ) -> Result<(Mirror, SyncStats)> {
        let config = config();
        SyncEngine::new(remote, store, &config).run()
    }

    #[test]
    fn test_bootstrap_builds_mirror() {
        let remote = service();
        let store = InMemoryMirrorStore::new();

        let (mirror, stats) = run(&remote, &store).unwrap();

        assert_eq!(stats.mode, SyncMode::Bootstrap);
        assert_eq!(mirror.message_count(), 3);
        assert_eq!(mirror.history_id(), 100);
        assert_eq!(mirror.labels().count(), 2);
        assert_eq!(
            stats.phases,
            vec![
                SyncPhase::FetchProfile,
                SyncPhase::Bootstrapping,
                SyncPhase::RefreshingLabels,
                SyncPhase::Committing,
                SyncPhase::Done,
            ]
        );
        assert_eq!(store.save_count(), 1);
    }

    #[test]
    fn test_incremental_applies_history() {
        let remote = service();
        let store = InMemoryMirrorStore::new();
        run(&remote, &store).unwrap();

        remote.deliver(message("m5", "d@shop.example.com"));
        remote.relabel(&MessageId::new("m1"), ["Label_1"]);
        remote.delete(&MessageId::new("m2"));
        remote.relabel(&MessageId::new("m3"), ["TRASH"]);

        let (mirror, stats) = run(&remote, &store).unwrap();

        assert_eq!(stats.mode, SyncMode::Incremental);
        assert_eq!(mirror.history_id(), 104);
        let mut ids: Vec<&str> = mirror.messages().map(|m| m.id.as_str()).collect();
        ids.sort();
        assert_eq!(ids, ["m1", "m5"]);
        assert!(mirror.message(&MessageId::new("m1")).unwrap().has_label("Label_1"));
        assert_eq!(stats.messages_removed, 2);
    }

    #[test]
    fn test_message_added_then_deleted_is_never_fetched() {
        let remote = service();
        let store = InMemoryMirrorStore::new();
        run(&remote, &store).unwrap();
        let calls_before = remote.get_message_calls();

        remote.deliver(message("m5", "d@shop.example.com"));
        remote.delete(&MessageId::new("m5"));

        let (mirror, _) = run(&remote, &store).unwrap();
        assert!(mirror.message(&MessageId::new("m5")).is_none());
        assert_eq!(remote.get_message_calls(), calls_before);
    }

    #[test]
    fn test_unchanged_mailbox_is_noop() {
        let remote = service();
        let store = InMemoryMirrorStore::new();
        let (first, _) = run(&remote, &store).unwrap();

        let (second, stats) = run(&remote, &store).unwrap();

        assert_eq!(stats.mode, SyncMode::NoOp);
        assert_eq!(first, second);
        assert_eq!(remote.list_history_calls(), 0);
    }

    #[test]
    fn test_expired_history_rebuilds() {
        let remote = service();
        let store = InMemoryMirrorStore::new();
        run(&remote, &store).unwrap();

        remote.deliver(message("m5", "d@shop.example.com"));
        remote.expire_history();

        let (mirror, stats) = run(&remote, &store).unwrap();
        assert_eq!(stats.mode, SyncMode::Bootstrap);
        assert!(stats.phases.contains(&SyncPhase::Diffing));
        assert_eq!(mirror.message_count(), 4);
        assert_eq!(mirror.history_id(), 101);
    }

    #[test]
    fn test_failures_leave_store_untouched() {
        let remote = service();
        let store = InMemoryMirrorStore::new();
        let (committed, _) = run(&remote, &store).unwrap();
        remote.deliver(message("m5", "d@shop.example.com"));

        remote.fail_profile(Some(Fault::Auth));
        assert!(matches!(run(&remote, &store), Err(Error::Auth(_))));
        remote.fail_profile(None);

        remote.fail_labels(Some(Fault::Protocol(500)));
        assert!(run(&remote, &store).is_err());
        remote.fail_labels(None);

        remote.fail_message(&MessageId::new("m5"), [Fault::Protocol(400)]);
        assert!(run(&remote, &store).is_err());

        let durable = store.load().unwrap().unwrap();
        assert_eq!(durable.history_id(), committed.history_id());
        assert_eq!(durable.message_count(), committed.message_count());
        assert_eq!(store.save_count(), 1);
    }

    #[test]
    fn test_free_function_returns_mirror() {
        let remote = service();
        let store = InMemoryMirrorStore::new();
        let mirror = synchronize(&remote, &store, &config()).unwrap();
        assert_eq!(mirror.message_count(), 3);
    }
}
