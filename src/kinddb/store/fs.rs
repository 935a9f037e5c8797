use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use uuid::Uuid;

use super::memory::MemoryStore;
use super::KeyValueStore;
use crate::error::{KindError, Result};
use crate::key::Key;
use crate::value::Record;

/// One line of the data file. Keys are written as urlsafe tokens.
#[derive(Debug, Serialize, Deserialize)]
struct StoredEntry {
    key: String,
    record: Record,
}

/// A [`MemoryStore`] mirrored to a JSON file.
///
/// The whole file is read once on open and rewritten on every `put`. Writes go to a temp
/// file in the same directory, then rename over the data file.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    inner: MemoryStore,
}

impl FileStore {
    /// Open the data file at `path`. A missing file is an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let inner = if path.exists() {
            let content = fs::read_to_string(&path).map_err(KindError::Io)?;
            let stored: Vec<StoredEntry> =
                serde_json::from_str(&content).map_err(KindError::Serialization)?;
            let entries = stored
                .into_iter()
                .map(|entry| Ok((Key::from_urlsafe(&entry.key)?, entry.record)))
                .collect::<Result<Vec<_>>>()?;
            debug!(path = %path.display(), entries = entries.len(), "opened file store");
            MemoryStore::from_entries(entries)
        } else {
            MemoryStore::new()
        };
        Ok(Self { path, inner })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write `entries` as the full contents of the data file.
    fn flush(&self, entries: Vec<(Key, Record)>) -> Result<()> {
        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        if !dir.exists() {
            fs::create_dir_all(&dir).map_err(KindError::Io)?;
        }
        let stored: Vec<StoredEntry> = entries
            .into_iter()
            .map(|(key, record)| StoredEntry {
                key: key.urlsafe(),
                record,
            })
            .collect();
        let content = serde_json::to_string_pretty(&stored).map_err(KindError::Serialization)?;

        let tmp_file = dir.join(format!(".kinddb-{}.tmp", Uuid::new_v4()));
        fs::write(&tmp_file, content).map_err(KindError::Io)?;
        fs::rename(&tmp_file, &self.path).map_err(KindError::Io)?;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &Key) -> Result<Option<Record>> {
        self.inner.get(key)
    }

    fn put(&self, key: &Key, record: Record) -> Result<Key> {
        // Nothing becomes visible in memory until the file has been replaced.
        let mut snapshot = self.inner.entries();
        match snapshot.iter_mut().find(|(k, _)| k == key) {
            Some(entry) => entry.1 = record.clone(),
            None => snapshot.push((key.clone(), record.clone())),
        }
        self.flush(snapshot)?;
        self.inner.put(key, record)
    }

    fn keys(&self) -> Result<Vec<Key>> {
        self.inner.keys()
    }
}
