//! In-memory mirror storage, used by tests and dry runs

use std::sync::{PoisonError, RwLock};

use super::MirrorStore;
use crate::error::{Error, Result};
use crate::models::Mirror;

#[derive(Default)]
struct Slot {
    mirror: Option<Mirror>,
    saves: usize,
    fail_saves: bool,
}

/// In-memory implementation of MirrorStore
///
/// Drops labels on save, like the file store does.
#[derive(Default)]
pub struct InMemoryMirrorStore {
    slot: RwLock<Slot>,
}

impl InMemoryMirrorStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that already holds a committed mirror
    pub fn with_mirror(mirror: &Mirror) -> Self {
        let store = Self::new();
        store.write().mirror = Some(strip_labels(mirror));
        store
    }

    /// Make every following save fail with a storage error
    pub fn fail_saves(&self, fail: bool) {
        self.write().fail_saves = fail;
    }

    /// Number of successful saves
    pub fn save_count(&self) -> usize {
        self.read().saves
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Slot> {
        self.slot.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Slot> {
        self.slot.write().unwrap_or_else(PoisonError::into_inner)
    }
}

fn strip_labels(mirror: &Mirror) -> Mirror {
    Mirror::new(mirror.messages().cloned(), mirror.history_id())
}

impl MirrorStore for InMemoryMirrorStore {
    fn load(&self) -> Result<Option<Mirror>> {
        Ok(self.read().mirror.clone())
    }

    fn save(&self, mirror: &Mirror) -> Result<()> {
        let mut slot = self.write();
        if slot.fail_saves {
            return Err(Error::Storage("disk full".to_string()));
        }
        slot.mirror = Some(strip_labels(mirror));
        slot.saves += 1;
        Ok(())
    }

    fn delete(&self) -> Result<()> {
        self.write().mirror = None;
        Ok(())
    }
}
