//! Bounded concurrent message detail fetching

use std::sync::{Mutex, PoisonError};

use log::{debug, info};
use rayon::prelude::*;

use super::RetryPolicy;
use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::models::{Message, MessageId};
use crate::service::MailService;

/// Log a progress line every this many completed fetches
const PROGRESS_EVERY: usize = 100;

/// Fetched messages and the completion counter, shared by all workers
struct Collected {
    messages: Vec<Message>,
    done: usize,
}

/// Fetch the details of `ids` on a worker pool, logging progress
///
/// See [`fetch_messages_with_progress`].
pub fn fetch_messages<S>(
    remote: &S,
    ids: &[MessageId],
    config: &EngineConfig,
) -> Result<Vec<Message>>
where
    S: MailService + ?Sized,
{
    fetch_messages_with_progress(remote, ids, config, |done, total| {
        if done % PROGRESS_EVERY == 0 || done == total {
            info!("Downloaded {}/{} messages", done, total);
        }
    })
}

/// Fetch the details of `ids` on a worker pool
///
/// The pool holds `config.concurrency` threads, lives for this call only
/// and is torn down before returning. Each ID is retried on its own
/// according to the configured [`RetryPolicy`]; IDs the service no longer
/// knows are skipped. The first permanent failure stops the batch and the
/// messages fetched so far are discarded.
///
/// `on_progress(done, total)` runs on the worker threads after every ID,
/// skipped ones included. The order of the returned messages is unspecified.
pub fn fetch_messages_with_progress<S, P>(
    remote: &S,
    ids: &[MessageId],
    config: &EngineConfig,
    on_progress: P,
) -> Result<Vec<Message>>
where
    S: MailService + ?Sized,
    P: Fn(usize, usize) + Sync,
{
    let total = ids.len();
    if total == 0 {
        return Ok(Vec::new());
    }

    let policy = RetryPolicy::from(config);
    let workers = config.concurrency.max(1);
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|i| format!("fetch-{i}"))
        .build()
        .map_err(|e| Error::WorkerPool(e.to_string()))?;

    debug!("Fetching {} messages with {} workers", total, workers);

    let collected = Mutex::new(Collected {
        messages: Vec::with_capacity(total),
        done: 0,
    });

    pool.install(|| {
        ids.par_iter().try_for_each(|id| -> Result<()> {
            let fetched = policy.run(id.as_str(), || remote.get_message(id))?;
            let done = {
                let mut collected = collected.lock().unwrap_or_else(PoisonError::into_inner);
                if let Some(message) = fetched {
                    collected.messages.push(message);
                }
                collected.done += 1;
                collected.done
            };
            on_progress(done, total);
            Ok(())
        })
    })?;

    let collected = collected
        .into_inner()
        .unwrap_or_else(PoisonError::into_inner);
    Ok(collected.messages)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    use super::*;
    use crate::models::{Label, LabelId, Profile};
    use crate::service::{Fault, InMemoryMailService, Page};
    use crate::sync::HistoryRecord;

    /// Counts `get_message` calls running at the same time
    struct InFlight {
        inner: InMemoryMailService,
        current: AtomicUsize,
        peak: AtomicUsize,
    }

    impl InFlight {
        fn new(inner: InMemoryMailService) -> Self {
            Self {
                inner,
                current: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            }
        }
    }

    impl MailService for InFlight {
        fn get_profile(&self) -> Result<Profile> {
            self.inner.get_profile()
        }

        fn list_message_ids(&self, page_token: Option<&str>) -> Result<Page<MessageId>> {
            self.inner.list_message_ids(page_token)
        }

        fn get_message(&self, id: &MessageId) -> Result<Message> {
            let running = self.current.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(running, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(20));
            self.current.fetch_sub(1, Ordering::SeqCst);
            self.inner.get_message(id)
        }

        fn list_history(
            &self,
            start_history_id: u64,
            page_token: Option<&str>,
        ) -> Result<Page<HistoryRecord>> {
            self.inner.list_history(start_history_id, page_token)
        }

        fn list_labels(&self) -> Result<Vec<Label>> {
            self.inner.list_labels()
        }

        fn create_label(&self, name: &str) -> Result<Label> {
            self.inner.create_label(name)
        }

        fn batch_modify(
            &self,
            ids: &[MessageId],
            add: &[LabelId],
            remove: &[LabelId],
        ) -> Result<()> {
            self.inner.batch_modify(ids, add, remove)
        }
    }

    fn config() -> EngineConfig {
        EngineConfig {
            concurrency: 4,
            max_retries: 3,
            backoff_base_ms: 0,
            ..Default::default()
        }
    }

    fn mailbox(count: usize) -> (InMemoryMailService, Vec<MessageId>) {
        let messages: Vec<Message> = (0..count)
            .map(|i| Message::builder(format!("m{i:03}")).from("a@example.com").build())
            .collect();
        let ids = messages.iter().map(|m| m.id.clone()).collect();
        (InMemoryMailService::new(1).with_messages(messages), ids)
    }

    #[test]
    fn test_fetches_every_id() {
        let (service, ids) = mailbox(50);
        let calls = AtomicUsize::new(0);

        let mut fetched = fetch_messages_with_progress(&service, &ids, &config(), |_, total| {
            assert_eq!(total, 50);
            calls.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

        fetched.sort_by(|a, b| a.id.cmp(&b.id));
        let fetched_ids: Vec<MessageId> = fetched.into_iter().map(|m| m.id).collect();
        assert_eq!(fetched_ids, ids);
        assert_eq!(calls.load(Ordering::SeqCst), 50);
    }

    #[test]
    fn test_concurrency_is_bounded_by_config() {
        let (inner, ids) = mailbox(40);
        let service = InFlight::new(inner);
        let config = config();

        let fetched = fetch_messages(&service, &ids, &config).unwrap();

        assert_eq!(fetched.len(), 40);
        assert_eq!(service.peak.load(Ordering::SeqCst), config.concurrency);
        assert_eq!(service.current.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_single_worker_fetches_sequentially() {
        let (inner, ids) = mailbox(6);
        let service = InFlight::new(inner);
        let config = EngineConfig {
            concurrency: 1,
            ..config()
        };

        fetch_messages(&service, &ids, &config).unwrap();
        assert_eq!(service.peak.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_missing_ids_are_skipped() {
        let (service, mut ids) = mailbox(3);
        ids.push(MessageId::new("gone"));
        service.fail_message(&ids[0], [Fault::NotFound]);

        let fetched = fetch_messages(&service, &ids, &config()).unwrap();
        assert_eq!(fetched.len(), 2);
    }

    #[test]
    fn test_transient_faults_are_retried() {
        let (service, ids) = mailbox(5);
        service.fail_message(&ids[2], [Fault::RateLimited, Fault::Network, Fault::RateLimited]);

        let fetched = fetch_messages(&service, &ids, &config()).unwrap();
        assert_eq!(fetched.len(), 5);
        assert_eq!(service.get_message_calls(), 8);
    }

    #[test]
    fn test_permanent_fault_fails_batch() {
        let (service, ids) = mailbox(20);
        service.fail_message(&ids[7], [Fault::Protocol(400)]);

        let result = fetch_messages(&service, &ids, &config());
        assert!(matches!(result, Err(Error::Protocol { status: Some(400), .. })));
    }

    #[test]
    fn test_exhausted_budget_fails_batch() {
        let (service, ids) = mailbox(2);
        service.fail_message(&ids[1], [Fault::RateLimited; 4]);

        let result = fetch_messages(&service, &ids, &config());
        assert!(matches!(result, Err(Error::RetriesExhausted { attempts: 4, .. })));
    }

    #[test]
    fn test_empty_batch_makes_no_calls() {
        let (service, _) = mailbox(2);
        assert!(fetch_messages(&service, &[], &config()).unwrap().is_empty());
        assert_eq!(service.get_message_calls(), 0);
    }
}
