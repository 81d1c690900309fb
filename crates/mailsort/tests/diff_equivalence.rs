//! Incremental sync must end in the same mirror as a fresh bootstrap
//!
//! Random sequences of remote changes are applied to an in-memory mailbox
//! with syncs interleaved at random points. After a final sync, the
//! incrementally maintained mirror is compared against one built from
//! scratch.

use mailsort::{
    EngineConfig, InMemoryMailService, InMemoryMirrorStore, Label, Message, MessageId, Mirror,
    synchronize,
};
use proptest::prelude::*;
use proptest::sample::Index;

const SENDERS: [&str; 4] = [
    "a@shop.example.com",
    "Bank <b@bank.co.uk>",
    "c@news.example.org",
    "d@friends.net",
];

const LABEL_SETS: [&[&str]; 5] = [
    &["INBOX"],
    &["INBOX", "UNREAD"],
    &["Label_1"],
    &["TRASH"],
    &["SPAM", "INBOX"],
];

#[derive(Debug, Clone)]
enum Op {
    Deliver(usize),
    Relabel(Index, usize),
    Delete(Index),
    Sync,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..SENDERS.len()).prop_map(Op::Deliver),
        (any::<Index>(), 0..LABEL_SETS.len()).prop_map(|(i, l)| Op::Relabel(i, l)),
        any::<Index>().prop_map(Op::Delete),
        Just(Op::Sync),
    ]
}

fn config() -> EngineConfig {
    EngineConfig {
        concurrency: 3,
        backoff_base_ms: 0,
        ..Default::default()
    }
}

fn sorted_messages(mirror: &Mirror) -> Vec<Message> {
    let mut messages: Vec<Message> = mirror.messages().cloned().collect();
    messages.sort_by(|a, b| a.id.cmp(&b.id));
    messages
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn incremental_sync_matches_bootstrap(
        initial in 0usize..6,
        ops in prop::collection::vec(op(), 0..40)
    ) {
        let mut next_id = 0usize;
        let mut new_message = |sender: usize| {
            next_id += 1;
            Message::builder(format!("m{next_id:03}"))
                .from(SENDERS[sender % SENDERS.len()])
                .label("INBOX")
                .build()
        };

        let seed: Vec<Message> = (0..initial).map(&mut new_message).collect();
        let mut live: Vec<MessageId> = seed.iter().map(|m| m.id.clone()).collect();
        let remote = InMemoryMailService::new(100)
            .with_page_size(4)
            .with_messages(seed)
            .with_labels(vec![
                Label::system("INBOX", "INBOX"),
                Label::new("Label_1", "Sorted/Shops"),
            ]);

        let store = InMemoryMirrorStore::new();
        synchronize(&remote, &store, &config()).unwrap();

        for op in ops {
            match op {
                Op::Deliver(sender) => {
                    let message = new_message(sender);
                    live.push(message.id.clone());
                    remote.deliver(message);
                }
                Op::Relabel(index, labels) if !live.is_empty() => {
                    let id = index.get(&live).clone();
                    remote.relabel(&id, LABEL_SETS[labels].iter().copied());
                }
                Op::Delete(index) if !live.is_empty() => {
                    let id = live.remove(index.index(live.len()));
                    remote.delete(&id);
                }
                Op::Sync => {
                    synchronize(&remote, &store, &config()).unwrap();
                }
                _ => {}
            }
        }

        let incremental = synchronize(&remote, &store, &config()).unwrap();
        let fresh = synchronize(&remote, &InMemoryMirrorStore::new(), &config()).unwrap();

        prop_assert_eq!(incremental.history_id(), remote.history_id());
        prop_assert_eq!(incremental.history_id(), fresh.history_id());
        prop_assert_eq!(sorted_messages(&incremental), sorted_messages(&fresh));
        prop_assert!(incremental.messages().all(|m| !m.is_spam_or_trash()));
    }
}
