//! The `PersistenceStore` contract and its two implementations.
//!
//! The contract is deliberately narrow: load the whole snapshot, save the
//! whole snapshot. No partial-field updates exist, so a saved snapshot is
//! always internally consistent — the atomicity requirement is on `save`,
//! which must never leave a truncated or mixed-version document behind.

use std::future::Future;
use std::io::ErrorKind;
use std::path::PathBuf;

use tokio::sync::Mutex;

use crate::{Snapshot, StoreError};

/// Durable, key-addressed snapshot storage.
///
/// `save` must have durable-replace semantics: after a crash at any point,
/// a subsequent `load` observes either the previous snapshot or the new
/// one in full, never a mixture.
pub trait PersistenceStore: Send + Sync + 'static {
    /// Reads the current snapshot. A store with no prior state returns
    /// the empty snapshot.
    fn load(&self) -> impl Future<Output = Result<Snapshot, StoreError>> + Send;

    /// Atomically replaces the stored snapshot.
    fn save(&self, snapshot: &Snapshot) -> impl Future<Output = Result<(), StoreError>> + Send;
}

// ---------------------------------------------------------------------------
// JsonFileStore
// ---------------------------------------------------------------------------

/// File-backed store: one pretty-printed JSON document, replaced via
/// write-to-temp-then-rename.
///
/// The rename is what makes `save` atomic — the filesystem swaps the
/// document in one step, so a crash mid-write leaves the temp file behind
/// and the real document untouched.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    /// Opens a store at `path`, creating parent directories as needed.
    /// The file itself is created lazily on the first save.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        Ok(Self { path })
    }

    fn tmp_path(&self) -> PathBuf {
        self.path.with_extension("tmp")
    }
}

impl PersistenceStore for JsonFileStore {
    async fn load(&self) -> Result<Snapshot, StoreError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Snapshot::default()),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, snapshot: &Snapshot) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(snapshot)?;
        let tmp = self.tmp_path();
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

/// In-memory store for tests and ephemeral development runs.
///
/// Same contract as [`JsonFileStore`], no disk involved.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Snapshot>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-seeded with `snapshot`.
    pub fn with_snapshot(snapshot: Snapshot) -> Self {
        Self {
            inner: Mutex::new(snapshot),
        }
    }
}

impl PersistenceStore for MemoryStore {
    async fn load(&self) -> Result<Snapshot, StoreError> {
        Ok(self.inner.lock().await.clone())
    }

    async fn save(&self, snapshot: &Snapshot) -> Result<(), StoreError> {
        *self.inner.lock().await = snapshot.clone();
        Ok(())
    }
}

// =========================================================================
// Tests
// =========================================================================
