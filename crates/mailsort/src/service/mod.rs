//! Remote mail service abstraction
//!
//! The sync engine, fetch executor and label actions talk to the mailbox
//! only through the [`MailService`] trait. [`crate::gmail::GmailClient`]
//! implements it over HTTP; [`InMemoryMailService`] implements it in memory.

mod memory;
mod traits;

pub use memory::{Fault, InMemoryMailService, ModifyCall};
pub use traits::{MailService, Page};
