//! Domain models for mirrored mail entities

mod label;
mod message;
mod mirror;
mod profile;

pub use label::{Label, LabelId, LabelKind, LabelPath};
pub use message::{Message, MessageBuilder, MessageId};
pub use mirror::Mirror;
pub use profile::Profile;
