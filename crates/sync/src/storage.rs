// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Local key-value persistence.
//!
//! The sync client keeps two records, both under the `tandem.sync` namespace:
//! - `tandem.sync.offline_queue`: pending items as JSON Lines, one per line
//! - `tandem.sync.device_id`: this install's device id
//!
//! [`Storage`] is the host-provided contract; [`SyncStore`] layers typed
//! access on top of it.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing::warn;

use crate::queue::{OfflineQueueItem, QueueItemKind};

/// Namespace shared by all keys the client writes.
pub const NAMESPACE: &str = "tandem.sync";

/// Key of the persisted offline queue.
pub const QUEUE_KEY: &str = "tandem.sync.offline_queue";

/// Key of the persisted device id.
pub const DEVICE_ID_KEY: &str = "tandem.sync.device_id";

/// Error type for storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Key contains characters that cannot name a file.
    #[error("invalid storage key: {0}")]
    InvalidKey(String),

    /// The in-memory store's lock was poisoned.
    #[error("storage lock poisoned")]
    Poisoned,
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// String key-value persistence provided by the host.
pub trait Storage: Send + Sync {
    /// Reads a value; `None` if the key was never set.
    fn get(&self, key: &str) -> StorageResult<Option<String>>;

    /// Replaces a value.
    fn set(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Deletes a value. Removing a missing key is not an error.
    fn remove(&self, key: &str) -> StorageResult<()>;
}

/// Stores each key as a file in one directory.
///
/// Writes go to a temporary file which is fsynced and then renamed over the
/// old value, so a crash never leaves a torn record behind.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    /// Opens (creating if needed) a storage directory.
    pub fn open(dir: &Path) -> StorageResult<Self> {
        fs::create_dir_all(dir)?;
        Ok(FileStorage {
            dir: dir.to_path_buf(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> StorageResult<PathBuf> {
        let valid = !key.is_empty()
            && !key.starts_with('.')
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
        if !valid {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(key))
    }
}

impl Storage for FileStorage {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        let path = self.path_for(key)?;
        let tmp = self.dir.join(format!("{key}.tmp"));
        let mut file = File::create(&tmp)?;
        file.write_all(value.as_bytes())?;
        file.sync_all()?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-memory storage. Clones share the same map, so dropping a client and
/// building a new one over a clone behaves like an app restart.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    values: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let values = self.values.lock().map_err(|_| StorageError::Poisoned)?;
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        let mut values = self.values.lock().map_err(|_| StorageError::Poisoned)?;
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        let mut values = self.values.lock().map_err(|_| StorageError::Poisoned)?;
        values.remove(key);
        Ok(())
    }
}

/// Typed access to the client's persisted records.
pub struct SyncStore<S> {
    storage: S,
    max_offline_messages: usize,
}

impl<S: Storage> SyncStore<S> {
    /// Wraps `storage`, keeping at most `max_offline_messages` queued
    /// conversation messages.
    pub fn new(storage: S, max_offline_messages: usize) -> Self {
        SyncStore {
            storage,
            max_offline_messages,
        }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn into_storage(self) -> S {
        self.storage
    }

    /// Reads the persisted queue in FIFO order.
    ///
    /// Blank lines are skipped. Lines that fail to parse are logged and
    /// skipped rather than poisoning the whole queue.
    pub fn load_queue(&self) -> StorageResult<Vec<OfflineQueueItem>> {
        let Some(content) = self.storage.get(QUEUE_KEY)? else {
            return Ok(Vec::new());
        };

        let mut items = Vec::new();
        for (index, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<OfflineQueueItem>(line) {
                Ok(item) => items.push(item),
                Err(e) => warn!(line = index + 1, error = %e, "skipping corrupt queue entry"),
            }
        }
        Ok(items)
    }

    /// Persists the queue, evicting the oldest conversation messages beyond
    /// the cap. Returns the evicted items.
    pub fn save_queue(&self, items: &[OfflineQueueItem]) -> StorageResult<Vec<OfflineQueueItem>> {
        let message_count = items
            .iter()
            .filter(|item| item.kind == QueueItemKind::Message)
            .count();
        let mut excess = message_count.saturating_sub(self.max_offline_messages);

        let mut kept = Vec::with_capacity(items.len());
        let mut evicted = Vec::new();
        for item in items {
            if excess > 0 && item.kind == QueueItemKind::Message {
                excess -= 1;
                evicted.push(item.clone());
            } else {
                kept.push(item);
            }
        }

        if kept.is_empty() {
            self.storage.remove(QUEUE_KEY)?;
            return Ok(evicted);
        }

        let mut content = String::new();
        for item in kept {
            content.push_str(&serde_json::to_string(item)?);
            content.push('\n');
        }
        self.storage.set(QUEUE_KEY, &content)?;
        Ok(evicted)
    }

    /// Reads the persisted device id.
    pub fn load_device_id(&self) -> StorageResult<Option<String>> {
        Ok(self
            .storage
            .get(DEVICE_ID_KEY)?
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty()))
    }

    pub fn save_device_id(&self, device_id: &str) -> StorageResult<()> {
        self.storage.set(DEVICE_ID_KEY, device_id)
    }
}

#[cfg(test)]
#[path = "storage_tests.rs"]
mod tests;
