//! Durable key-value storage for client state.
//!
//! The client persists three keys: the chat session id, the watched set, and
//! the favorite set. [`FileStore`] keeps them in one JSON object on disk and
//! rewrites the whole file atomically on every `set`; [`MemoryStore`] is the
//! non-durable variant for tests and `--ephemeral` runs.
//!
//! A store that cannot read or write its file keeps working from memory. The
//! error goes back to the caller, which logs it and carries on.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use thiserror::Error;

pub const SESSION_KEY: &str = "chat_session_id";
pub const WATCHED_KEY: &str = "watchedVideos";
pub const FAVORITES_KEY: &str = "favorites";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read state file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("state file {path} is not valid JSON: {source}")]
    Corrupt {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("failed to write state file {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to encode state: {0}")]
    Encode(#[from] serde_json::Error),
}

pub trait LocalStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;

    /// Store `value` under `key`. The value is visible to `get` even when the
    /// durable write fails.
    fn set(&self, key: &str, value: String) -> Result<(), StoreError>;
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl LocalStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn set(&self, key: &str, value: String) -> Result<(), StoreError> {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value);
        Ok(())
    }
}

/// JSON-object file store, e.g. `~/.lectern/state.json`.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    values: Mutex<BTreeMap<String, String>>,
}

impl FileStore {
    /// Open `path`, loading whatever it holds.
    ///
    /// A missing file is an empty store. An unreadable or corrupt file is
    /// reported and the store starts empty; the next `set` replaces it.
    pub fn open(path: impl Into<PathBuf>) -> (Self, Option<StoreError>) {
        let path = path.into();
        lectern_utils::recover_bak_file(&path);

        let (values, error) = match Self::read(&path) {
            Ok(values) => (values, None),
            Err(e) => (BTreeMap::new(), Some(e)),
        };

        let store = Self {
            path,
            values: Mutex::new(values),
        };
        (store, error)
    }

    fn read(path: &Path) -> Result<BTreeMap<String, String>, StoreError> {
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(source) => {
                return Err(StoreError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        serde_json::from_slice(&bytes).map_err(|source| StoreError::Corrupt {
            path: path.to_path_buf(),
            source,
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LocalStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn set(&self, key: &str, value: String) -> Result<(), StoreError> {
        let mut values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        values.insert(key.to_string(), value);
        let bytes = serde_json::to_vec_pretty(&*values)?;
        // Written under the lock so concurrent sets land in order.
        lectern_utils::atomic_write(&self.path, &bytes).map_err(|source| StoreError::Write {
            path: self.path.clone(),
            source,
        })
    }
}
