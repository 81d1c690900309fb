//! File-based mirror storage with zstd compression

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use log::debug;
use serde::{Deserialize, Serialize};

use super::MirrorStore;
use crate::error::{Error, Result};
use crate::models::{Message, Mirror};

/// Name of the mirror file inside a profile directory
pub const MIRROR_FILE: &str = "mirror.json.zst";

/// Layout version of the persisted document
const FORMAT_VERSION: u32 = 1;

#[derive(Serialize)]
struct MirrorRecordRef<'a> {
    version: u32,
    history_id: u64,
    messages: Vec<&'a Message>,
}

#[derive(Deserialize)]
struct MirrorRecord {
    version: u32,
    history_id: u64,
    messages: Vec<Message>,
}

/// File-based mirror storage
///
/// Directory structure:
/// ```text
/// profiles/
///   work/
///     mirror.json.zst      # {version, history_id, messages}
///     token.json           # OAuth tokens (see GmailAuth)
/// ```
pub struct FileMirrorStore {
    path: PathBuf,
    compression_level: i32,
}

impl FileMirrorStore {
    /// Create a store for the profile directory `dir`, creating it if needed
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir).map_err(|e| {
            Error::Storage(format!("Failed to create profile directory {}: {e}", dir.display()))
        })?;
        Ok(Self {
            path: dir.join(MIRROR_FILE),
            compression_level: 3,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        self.path.with_extension("zst.tmp")
    }
}

impl MirrorStore for FileMirrorStore {
    fn load(&self) -> Result<Option<Mirror>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let compressed = fs::read(&self.path)?;
        let mut decoder = zstd::Decoder::new(compressed.as_slice())?;
        let mut json = Vec::new();
        decoder
            .read_to_end(&mut json)
            .map_err(|e| Error::Storage(format!("Failed to decompress mirror: {e}")))?;

        let record: MirrorRecord = serde_json::from_slice(&json)
            .map_err(|e| Error::Storage(format!("Failed to parse mirror: {e}")))?;
        if record.version != FORMAT_VERSION {
            return Err(Error::Storage(format!(
                "Mirror at {} has format version {} (expected {}); delete it to rebuild",
                self.path.display(),
                record.version,
                FORMAT_VERSION
            )));
        }

        debug!(
            "Loaded mirror with {} messages at history {}",
            record.messages.len(),
            record.history_id
        );
        Ok(Some(Mirror::new(record.messages, record.history_id)))
    }

    fn save(&self, mirror: &Mirror) -> Result<()> {
        let mut messages: Vec<&Message> = mirror.messages().collect();
        messages.sort_by(|a, b| a.id.cmp(&b.id));
        let record = MirrorRecordRef {
            version: FORMAT_VERSION,
            history_id: mirror.history_id(),
            messages,
        };

        let json = serde_json::to_vec(&record)
            .map_err(|e| Error::Storage(format!("Failed to serialize mirror: {e}")))?;
        let compressed = zstd::encode_all(json.as_slice(), self.compression_level)
            .map_err(|e| Error::Storage(format!("Failed to compress mirror: {e}")))?;

        // Write atomically (write to temp, then rename)
        let temp_path = self.temp_path();
        fs::write(&temp_path, &compressed)?;
        fs::rename(&temp_path, &self.path)?;

        debug!("Saved mirror to {}", self.path.display());
        Ok(())
    }

    fn delete(&self) -> Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MessageId;
    use tempfile::tempdir;

    fn mirror() -> Mirror {
        Mirror::new(
            vec![
                Message::builder("m1")
                    .from("Shop <news@shop.example.com>")
                    .subject("Sale")
                    .label("INBOX")
                    .build(),
                Message::builder("m2").from("bank@bank.example").label("Label_7").build(),
            ],
            42,
        )
    }

    #[test]
    fn test_load_without_file() {
        let dir = tempdir().unwrap();
        let store = FileMirrorStore::new(dir.path().join("work")).unwrap();
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let store = FileMirrorStore::new(dir.path().join("work")).unwrap();

        store.save(&mirror()).unwrap();
        let loaded = store.load().unwrap().unwrap();

        assert_eq!(loaded, mirror());
        assert_eq!(loaded.history_id(), 42);
        let m1 = loaded.message(&MessageId::new("m1")).unwrap();
        assert_eq!(m1.subject(), "Sale");
        assert!(!store.temp_path().exists());
    }

    #[test]
    fn test_labels_are_not_persisted() {
        let dir = tempdir().unwrap();
        let store = FileMirrorStore::new(dir.path()).unwrap();

        let labelled = mirror().with_labels(vec![crate::models::Label::new("Label_7", "Banks")]);
        store.save(&labelled).unwrap();

        assert_eq!(store.load().unwrap().unwrap().labels().count(), 0);
    }

    #[test]
    fn test_version_mismatch_is_storage_error() {
        let dir = tempdir().unwrap();
        let store = FileMirrorStore::new(dir.path()).unwrap();

        let json = br#"{"version":99,"history_id":1,"messages":[]}"#;
        fs::write(store.path(), zstd::encode_all(&json[..], 3).unwrap()).unwrap();

        assert!(matches!(store.load(), Err(Error::Storage(_))));
    }

    #[test]
    fn test_corrupt_file_is_storage_error() {
        let dir = tempdir().unwrap();
        let store = FileMirrorStore::new(dir.path()).unwrap();
        fs::write(store.path(), b"not zstd").unwrap();

        assert!(matches!(store.load(), Err(Error::Storage(_))));
    }

    #[test]
    fn test_delete() {
        let dir = tempdir().unwrap();
        let store = FileMirrorStore::new(dir.path()).unwrap();
        store.save(&mirror()).unwrap();

        store.delete().unwrap();
        assert!(store.load().unwrap().is_none());
        store.delete().unwrap();
    }
}
