//! Durable key-value stores.
//!
//! | Implementation | Backing |
//! |----------------|---------|
//! | [`MemoryDataStore`] | Process memory, lost on exit |
//! | [`FileDataStore`] | One JSON file per key in a directory |

// ============================================================================
// Imports
// ============================================================================

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde_json::Value;
use tracing::{debug, trace};

use crate::error::{Error, Result};

// ============================================================================
// DataStore
// ============================================================================

/// Durable key-value store holding JSON values.
#[async_trait]
pub trait DataStore: Send + Sync {
    /// Reads a value. Missing keys read as `None`.
    async fn get_item(&self, key: &str) -> Result<Option<Value>>;

    /// Writes a value, replacing any previous one.
    async fn set_item(&self, key: &str, value: Value) -> Result<()>;

    /// Deletes a value. Deleting a missing key succeeds.
    async fn remove_item(&self, key: &str) -> Result<()>;
}

// ============================================================================
// MemoryDataStore
// ============================================================================

/// In-memory data store.
///
/// Writes can be made to fail to exercise error paths.
#[derive(Debug, Default)]
pub struct MemoryDataStore {
    items: Mutex<FxHashMap<String, Value>>,
    writes: AtomicUsize,
    fail_writes: AtomicBool,
}

impl MemoryDataStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with items.
    #[must_use]
    pub fn with_items<I, K>(items: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let store = Self::default();
        store
            .items
            .lock()
            .extend(items.into_iter().map(|(k, v)| (k.into(), v)));
        store
    }

    /// Returns a value without going through the async API.
    #[must_use]
    pub fn peek(&self, key: &str) -> Option<Value> {
        self.items.lock().get(key).cloned()
    }

    /// Returns every key, sorted.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<_> = self.items.lock().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Returns the number of successful writes and removals.
    #[inline]
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Makes every following write or removal fail.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_writable(&self, key: &str) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Error::storage(key, "writes disabled"));
        }
        Ok(())
    }
}

#[async_trait]
impl DataStore for MemoryDataStore {
    async fn get_item(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.peek(key))
    }

    async fn set_item(&self, key: &str, value: Value) -> Result<()> {
        self.check_writable(key)?;
        self.items.lock().insert(key.to_string(), value);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn remove_item(&self, key: &str) -> Result<()> {
        self.check_writable(key)?;
        self.items.lock().remove(key);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ============================================================================
// FileDataStore
// ============================================================================

/// File-backed data store with one `<key>.json` file per key.
#[derive(Debug, Clone)]
pub struct FileDataStore {
    dir: PathBuf,
}

impl FileDataStore {
    /// Opens a store rooted at `dir`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the directory cannot be created.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        debug!(dir = %dir.display(), "FileDataStore opened");
        Ok(Self { dir })
    }

    /// Returns the root directory.
    #[inline]
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(Error::storage(key, "key contains unsupported characters"));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }
}

#[async_trait]
impl DataStore for FileDataStore {
    async fn get_item(&self, key: &str) -> Result<Option<Value>> {
        let path = self.path_for(key)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(text) => {
                let value = serde_json::from_str(&text)
                    .map_err(|e| Error::storage(key, format!("corrupt value: {e}")))?;
                Ok(Some(value))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn set_item(&self, key: &str, value: Value) -> Result<()> {
        let path = self.path_for(key)?;
        let tmp = path.with_extension("json.tmp");
        let text = serde_json::to_string(&value)?;

        tokio::fs::write(&tmp, text).await?;
        tokio::fs::rename(&tmp, &path).await?;

        trace!(key, "Item written");
        Ok(())
    }

    async fn remove_item(&self, key: &str) -> Result<()> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
