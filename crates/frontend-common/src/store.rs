//! Durable token storage
//!
//! Stores are synchronous key/value maps, mirroring browser local storage.
//! Reads never fail: a missing or unreadable entry is simply absent.

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use thiserror::Error;
use tracing::{debug, warn};

/// Keys of the persisted session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StorageKey {
    AccessToken,
    RefreshToken,
    User,
}

impl StorageKey {
    pub const ALL: [Self; 3] = [Self::AccessToken, Self::RefreshToken, Self::User];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AccessToken => "accessToken",
            Self::RefreshToken => "refreshToken",
            Self::User => "user",
        }
    }
}

/// Storage failures
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage is disabled")]
    Disabled,

    #[error("Storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to encode stored value: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Synchronous key/value persistence for session credentials
pub trait TokenStore: Send + Sync {
    /// Overwrite `key` with `value`
    fn save(&self, key: StorageKey, value: &str) -> Result<(), StoreError>;

    /// Value stored under `key`, if any
    fn load(&self, key: StorageKey) -> Option<String>;

    /// Remove a single key
    fn clear(&self, key: StorageKey) -> Result<(), StoreError>;

    /// Remove every session key
    fn clear_all(&self) -> Result<(), StoreError> {
        for key in StorageKey::ALL {
            self.clear(key)?;
        }
        Ok(())
    }
}

/// JSON helpers on top of any [`TokenStore`]
pub trait TokenStoreExt: TokenStore {
    fn save_json<T: Serialize>(&self, key: StorageKey, value: &T) -> Result<(), StoreError> {
        let encoded = serde_json::to_string(value)?;
        self.save(key, &encoded)
    }

    /// Decoded value under `key`; values that no longer decode load as absent
    fn load_json<T: DeserializeOwned>(&self, key: StorageKey) -> Option<T> {
        let raw = self.load(key)?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                debug!(key = key.as_str(), error = %e, "Ignoring undecodable stored value");
                None
            }
        }
    }
}

impl<S: TokenStore + ?Sized> TokenStoreExt for S {}

/// Process-lifetime store
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    entries: Mutex<BTreeMap<StorageKey, String>>,
    fail_writes: AtomicBool,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store that rejects every write, like disabled or full browser storage
    pub fn with_write_failures() -> Self {
        let store = Self::default();
        store.set_fail_writes(true);
        store
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TokenStore for MemoryTokenStore {
    fn save(&self, key: StorageKey, value: &str) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Disabled);
        }
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, value.to_string());
        Ok(())
    }

    fn load(&self, key: StorageKey) -> Option<String> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
            .cloned()
    }

    fn clear(&self, key: StorageKey) -> Result<(), StoreError> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&key);
        Ok(())
    }

    fn clear_all(&self) -> Result<(), StoreError> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        Ok(())
    }
}

/// Store backed by a single JSON document on disk
///
/// Every write replaces the whole document through a temporary file and a
/// rename, so readers never observe a partial write.
#[derive(Debug)]
pub struct FileTokenStore {
    path: PathBuf,
    // Serializes read-modify-write cycles within the process
    lock: Mutex<()>,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_document(&self) -> BTreeMap<String, String> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return BTreeMap::new(),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Failed to read session file");
                return BTreeMap::new();
            }
        };

        serde_json::from_str(&content).unwrap_or_else(|e| {
            warn!(path = %self.path.display(), error = %e, "Session file is corrupt, ignoring it");
            BTreeMap::new()
        })
    }

    fn write_document(&self, document: &BTreeMap<String, String>) -> Result<(), StoreError> {
        if document.is_empty() {
            return match fs::remove_file(&self.path) {
                Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e.into()),
                _ => Ok(()),
            };
        }

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let tmp_path = self.path.with_extension("json.tmp");
        {
            let mut options = fs::OpenOptions::new();
            options.write(true).create(true).truncate(true);
            // Credentials are readable by the owner only
            #[cfg(unix)]
            {
                use std::os::unix::fs::OpenOptionsExt;
                options.mode(0o600);
            }

            let mut file = options.open(&tmp_path)?;
            file.write_all(serde_json::to_string_pretty(document)?.as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }

    fn update<F>(&self, f: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut BTreeMap<String, String>),
    {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut document = self.read_document();
        f(&mut document);
        self.write_document(&document)
    }
}

impl TokenStore for FileTokenStore {
    fn save(&self, key: StorageKey, value: &str) -> Result<(), StoreError> {
        self.update(|doc| {
            doc.insert(key.as_str().to_string(), value.to_string());
        })
    }

    fn load(&self, key: StorageKey) -> Option<String> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.read_document().remove(key.as_str())
    }

    fn clear(&self, key: StorageKey) -> Result<(), StoreError> {
        self.update(|doc| {
            doc.remove(key.as_str());
        })
    }

    fn clear_all(&self) -> Result<(), StoreError> {
        self.update(|doc| {
            for key in StorageKey::ALL {
                doc.remove(key.as_str());
            }
        })
    }
}
