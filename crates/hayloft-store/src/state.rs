//! `StateHandle`: serialized read-mutate-write cycles over the snapshot.
//!
//! The store contract has no built-in mutual exclusion — two tasks that
//! both load, mutate, and save would silently drop one task's write (the
//! classic lost update). Every component therefore goes through this
//! handle, which wraps each logical operation in an optimistic version
//! check:
//!
//! ```text
//!   capture version ──→ load ──→ apply closure ──→ version unchanged?
//!                                                   ├─ yes: save, bump
//!                                                   └─ no:  retry fresh
//! ```
//!
//! A conflicting commit forces the loser to re-run its closure against the
//! fresh snapshot, so interleaved operations on the same user or session
//! always observe each other's effects. The closure runs outside the
//! commit guard; only load and save are serialized.

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::{PersistenceStore, Snapshot, StoreError};

/// Shared handle through which all snapshot access flows.
///
/// Cheap to share — components hold `Arc<StateHandle<S>>` clones of the
/// one handle the server builds at startup.
pub struct StateHandle<S> {
    store: S,
    /// Commit guard. Holds the count of committed updates; a mismatch
    /// between capture and commit means another update landed in between.
    version: Mutex<u64>,
}

impl<S: PersistenceStore> StateHandle<S> {
    /// Wraps a store in a fresh handle.
    pub fn new(store: S) -> Arc<Self> {
        Arc::new(Self {
            store,
            version: Mutex::new(0),
        })
    }

    /// Loads the snapshot and applies a pure read.
    ///
    /// Reads never block updates: `save` is atomic, so a concurrent load
    /// observes either the previous or the new snapshot in full.
    pub async fn read<R>(&self, f: impl FnOnce(&Snapshot) -> R) -> Result<R, StoreError> {
        let snapshot = self.store.load().await?;
        Ok(f(&snapshot))
    }

    /// Runs one atomic read-mutate-write cycle.
    ///
    /// `apply` may be re-run when a concurrent update commits first, so it
    /// must be a function of the snapshot alone. If `apply` returns an
    /// error, nothing is saved; if the save itself fails, the mutation is
    /// discarded and the error surfaces — the durable snapshot is never
    /// partially written.
    pub async fn update<R, E, F>(&self, mut apply: F) -> Result<R, E>
    where
        F: FnMut(&mut Snapshot) -> Result<R, E>,
        E: From<StoreError>,
    {
        loop {
            let (seen, mut snapshot) = {
                let version = self.version.lock().await;
                let snapshot = self.store.load().await.map_err(E::from)?;
                (*version, snapshot)
            };

            let out = apply(&mut snapshot)?;

            let mut version = self.version.lock().await;
            if *version != seen {
                // Another update committed while we were mutating; our
                // snapshot is stale. Retry against the fresh state.
                tracing::trace!("snapshot version conflict, retrying update");
                continue;
            }
            self.store.save(&snapshot).await.map_err(E::from)?;
            *version += 1;
            return Ok(out);
        }
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    //! Naming convention: `test_{function}_{scenario}_{expected}`.

    use super::*;
    use crate::{MemoryStore, WalletId};

    #[tokio::test]
    async fn test_update_applies_and_persists_mutation() {
        let state = StateHandle::new(MemoryStore::new());
        let wallet = WalletId::from("wallet-a");

        state
            .update::<_, StoreError, _>(|snapshot| {
                snapshot.user_or_create(&wallet).saved_points_total = 30;
                Ok(())
            })
            .await
            .unwrap();

        let total = state
            .read(|snapshot| snapshot.users[&wallet].saved_points_total)
            .await
            .unwrap();
        assert_eq!(total, 30);
    }

    #[tokio::test]
    async fn test_update_error_discards_mutation() {
        let state = StateHandle::new(MemoryStore::new());
        let wallet = WalletId::from("wallet-a");

        let result: Result<(), StoreError> = state
            .update(|snapshot| {
                snapshot.user_or_create(&wallet);
                Err(StoreError::Io(std::io::Error::other("boom")))
            })
            .await;

        assert!(result.is_err());
        let users = state.read(|snapshot| snapshot.users.len()).await.unwrap();
        assert_eq!(users, 0, "failed update must not persist anything");
    }

    #[tokio::test]
    async fn test_update_concurrent_increments_all_land() {
        // The lost-update hazard this handle exists to remove: many tasks
        // read-mutate-write the same counter concurrently, and every
        // increment must survive.
        let state = StateHandle::new(MemoryStore::new());
        let wallet = WalletId::from("wallet-contended");

        let mut tasks = Vec::new();
        for _ in 0..16 {
            let state = Arc::clone(&state);
            let wallet = wallet.clone();
            tasks.push(tokio::spawn(async move {
                state
                    .update::<_, StoreError, _>(|snapshot| {
                        snapshot.user_or_create(&wallet).total_achievements += 1;
                        Ok(())
                    })
                    .await
            }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let total = state
            .read(|snapshot| snapshot.users[&wallet].total_achievements)
            .await
            .unwrap();
        assert_eq!(total, 16);
    }
}
