//! Snapshot persistence - load before and store after every cycle
//!
//! The tracker only ever reads and writes the whole `TrackerSnapshot`, so a
//! failed write leaves the previously stored snapshot in place. Every
//! load, modify, store unit runs under `StateStore::lock`, which for the
//! JSON file store is an advisory lock shared by all processes using the
//! same state file.

use crate::domain::snapshot::TrackerSnapshot;
use fs4::fs_std::FileExt;
use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("store serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("store unavailable")]
    Unavailable,
}

/// Exclusive access to the stored snapshot, released on drop
#[derive(Debug, Default)]
pub struct StoreLock {
    _file: Option<File>,
}

/// Persistent key-value store for the tracker snapshot
pub trait StateStore: Send {
    fn load(&self) -> Result<TrackerSnapshot, StoreError>;
    fn store(&self, snapshot: &TrackerSnapshot) -> Result<(), StoreError>;

    /// Block until no other writer holds the snapshot
    fn lock(&self) -> Result<StoreLock, StoreError> {
        Ok(StoreLock::default())
    }
}

/// In-memory store with failure injection
#[derive(Debug, Default)]
pub struct MemoryStore {
    snapshot: Mutex<TrackerSnapshot>,
    fail_loads: AtomicBool,
    fail_stores: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_snapshot(snapshot: TrackerSnapshot) -> Self {
        Self { snapshot: Mutex::new(snapshot), ..Self::default() }
    }

    /// Copy of the currently stored snapshot
    pub fn snapshot(&self) -> TrackerSnapshot {
        self.snapshot.lock().clone()
    }

    pub fn set_fail_loads(&self, fail: bool) {
        self.fail_loads.store(fail, Ordering::Relaxed);
    }

    pub fn set_fail_stores(&self, fail: bool) {
        self.fail_stores.store(fail, Ordering::Relaxed);
    }
}

impl StateStore for MemoryStore {
    fn load(&self) -> Result<TrackerSnapshot, StoreError> {
        if self.fail_loads.load(Ordering::Relaxed) {
            return Err(StoreError::Unavailable);
        }
        Ok(self.snapshot.lock().clone())
    }

    fn store(&self, snapshot: &TrackerSnapshot) -> Result<(), StoreError> {
        if self.fail_stores.load(Ordering::Relaxed) {
            return Err(StoreError::Unavailable);
        }
        *self.snapshot.lock() = snapshot.clone();
        Ok(())
    }
}

impl<S: StateStore + Sync> StateStore for std::sync::Arc<S> {
    fn load(&self) -> Result<TrackerSnapshot, StoreError> {
        (**self).load()
    }

    fn store(&self, snapshot: &TrackerSnapshot) -> Result<(), StoreError> {
        (**self).store(snapshot)
    }

    fn lock(&self) -> Result<StoreLock, StoreError> {
        (**self).lock()
    }
}

/// JSON file store. A missing file loads as the initial snapshot.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref().to_path_buf();
        info!(path = %path.display(), "json_store_initialized");
        Self { path }
    }

    fn dir(&self) -> &Path {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        }
    }

    fn lock_path(&self) -> PathBuf {
        let mut name = self.path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        name.push(".lock");
        self.path.with_file_name(name)
    }
}

impl StateStore for JsonFileStore {
    fn load(&self) -> Result<TrackerSnapshot, StoreError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "json_store_missing_initial_state");
                return Ok(TrackerSnapshot::default());
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_str(&content)?)
    }

    fn store(&self, snapshot: &TrackerSnapshot) -> Result<(), StoreError> {
        let dir = self.dir();
        if !dir.exists() {
            fs::create_dir_all(dir)?;
        }

        let json = serde_json::to_vec_pretty(snapshot)?;
        let mut temp = tempfile::NamedTempFile::new_in(dir)?;
        temp.write_all(&json)?;
        temp.as_file().sync_all()?;
        temp.persist(&self.path).map_err(|e| e.error)?;

        debug!(path = %self.path.display(), bytes = %json.len(), "json_store_written");
        Ok(())
    }

    fn lock(&self) -> Result<StoreLock, StoreError> {
        let dir = self.dir();
        if !dir.exists() {
            fs::create_dir_all(dir)?;
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(self.lock_path())?;
        file.lock_exclusive()?;
        Ok(StoreLock { _file: Some(file) })
    }
}
