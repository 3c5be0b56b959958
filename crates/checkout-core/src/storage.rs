//! # Durable Key-Value Storage
//!
//! Persistence port used by the cart store. Writes are synchronous: a
//! mutation is only visible once its storage write returned `Ok`.
//!
//! - `MemoryKeyValueStore`: in-process map, for tests and ephemeral sessions
//! - `FileKeyValueStore`: a single JSON object on disk, survives restarts

use crate::error::{CheckoutError, CheckoutResult};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Port for durable string key-value storage.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> CheckoutResult<Option<String>>;

    fn set(&self, key: &str, value: &str) -> CheckoutResult<()>;

    fn remove(&self, key: &str) -> CheckoutResult<()>;
}

/// Type alias for a shared storage backend
pub type SharedKeyValueStore = Arc<dyn KeyValueStore>;

/// Key namespace for persisted session state.
///
/// `Global` reproduces the device-wide keys; `User` prefixes them so that two
/// accounts on one device never see each other's cart.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum StorageScope {
    #[default]
    Global,
    User(String),
}

impl StorageScope {
    pub fn for_user(user_id: impl Into<String>) -> Self {
        StorageScope::User(user_id.into())
    }

    /// Fully-qualified key for `name` within this scope
    pub fn key(&self, name: &str) -> String {
        match self {
            StorageScope::Global => name.to_string(),
            StorageScope::User(user) => format!("user:{}:{}", user, name),
        }
    }

    /// Stable label folded into order fingerprints
    pub fn label(&self) -> &str {
        match self {
            StorageScope::Global => "",
            StorageScope::User(user) => user,
        }
    }
}

fn lock_poisoned<T>(_: T) -> CheckoutError {
    CheckoutError::Storage("storage lock poisoned".to_string())
}

/// In-memory storage, substitutable for durable storage in tests.
#[derive(Debug, Default, Clone)]
pub struct MemoryKeyValueStore {
    entries: Arc<Mutex<BTreeMap<String, String>>>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys
    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KeyValueStore for MemoryKeyValueStore {
    fn get(&self, key: &str) -> CheckoutResult<Option<String>> {
        let entries = self.entries.lock().map_err(lock_poisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> CheckoutResult<()> {
        let mut entries = self.entries.lock().map_err(lock_poisoned)?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> CheckoutResult<()> {
        let mut entries = self.entries.lock().map_err(lock_poisoned)?;
        entries.remove(key);
        Ok(())
    }
}

/// File-backed storage: the whole map is rewritten on every change.
///
/// Writes go to a sibling temp file first and are renamed into place, so a
/// crash mid-write leaves the previous state intact.
#[derive(Debug)]
pub struct FileKeyValueStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileKeyValueStore {
    /// Open (or lazily create) the store at `path`
    pub fn open(path: impl Into<PathBuf>) -> CheckoutResult<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    CheckoutError::Storage(format!("cannot create {}: {}", parent.display(), e))
                })?;
            }
        }
        Ok(Self {
            path,
            lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_map(&self) -> CheckoutResult<BTreeMap<String, String>> {
        match std::fs::read_to_string(&self.path) {
            Ok(raw) if raw.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(raw) => Ok(serde_json::from_str(&raw)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(CheckoutError::Storage(format!(
                "cannot read {}: {}",
                self.path.display(),
                e
            ))),
        }
    }

    fn write_map(&self, map: &BTreeMap<String, String>) -> CheckoutResult<()> {
        let body = serde_json::to_string_pretty(map)?;
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, body)
            .and_then(|_| std::fs::rename(&tmp, &self.path))
            .map_err(|e| {
                CheckoutError::Storage(format!("cannot write {}: {}", self.path.display(), e))
            })?;
        debug!(path = %self.path.display(), keys = map.len(), "storage flushed");
        Ok(())
    }
}

impl KeyValueStore for FileKeyValueStore {
    fn get(&self, key: &str) -> CheckoutResult<Option<String>> {
        let _guard = self.lock.lock().map_err(lock_poisoned)?;
        Ok(self.read_map()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> CheckoutResult<()> {
        let _guard = self.lock.lock().map_err(lock_poisoned)?;
        let mut map = self.read_map()?;
        map.insert(key.to_string(), value.to_string());
        self.write_map(&map)
    }

    fn remove(&self, key: &str) -> CheckoutResult<()> {
        let _guard = self.lock.lock().map_err(lock_poisoned)?;
        let mut map = self.read_map()?;
        if map.remove(key).is_some() {
            self.write_map(&map)?;
        }
        Ok(())
    }
}
