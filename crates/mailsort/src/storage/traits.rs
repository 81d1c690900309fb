//! Storage trait definitions

use crate::error::Result;
use crate::models::Mirror;

/// Durable copy of one profile's mirror
///
/// Only the message map and the history cursor are persisted; labels are
/// refetched on every sync. `save` must be all-or-nothing: after a failed
/// save, `load` still returns the previous copy.
pub trait MirrorStore: Send + Sync {
    /// Load the last committed mirror, or `None` if nothing was saved yet
    fn load(&self) -> Result<Option<Mirror>>;

    /// Replace the committed mirror
    fn save(&self, mirror: &Mirror) -> Result<()>;

    /// Forget the committed mirror so that the next sync bootstraps
    fn delete(&self) -> Result<()>;
}
