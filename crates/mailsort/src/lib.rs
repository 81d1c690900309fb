//! Mailsort crate - mirror a Gmail mailbox and sort it by sender domain
//!
//! This crate provides:
//! - Domain models (Message, Label, Mirror)
//! - Gmail API client and OAuth authentication
//! - A fetch executor with bounded concurrency and retry/backoff
//! - An all-or-nothing sync engine driven by the remote history
//! - Sender-domain classification and hierarchical label matching
//! - Action handlers for label creation and message sorting
//!
//! All remote access goes through the [`MailService`] trait, so every
//! engine can run against [`InMemoryMailService`] in tests.

pub mod actions;
pub mod classify;
pub mod commands;
pub mod config;
pub mod error;
pub mod fetch;
pub mod gmail;
pub mod labels;
pub mod models;
pub mod service;
pub mod storage;
pub mod sync;

pub use actions::{ActionHandler, DomainOutcome, SortReport};
pub use classify::{Classification, DomainFilter, DomainGroups, classify};
pub use commands::{CallArgs, CallTable};
pub use config::{EngineConfig, GmailCredentials};
pub use error::{Error, Result};
pub use fetch::{RetryPolicy, fetch_messages, modify_labels, paginate};
pub use gmail::{GmailAuth, GmailClient};
pub use labels::{Resolution, find_labels_by_suffix, partition_by_source_label};
pub use models::{Label, LabelId, LabelKind, LabelPath, Message, MessageId, Mirror, Profile};
pub use service::{Fault, InMemoryMailService, MailService, Page};
pub use storage::{FileMirrorStore, InMemoryMirrorStore, MirrorStore};
pub use sync::{HistoryDiff, HistoryRecord, SyncEngine, SyncMode, SyncPhase, SyncStats, synchronize};
