//! Durable state for Hayloft.
//!
//! This crate owns the data model and the only two ways to touch it:
//!
//! 1. **Model** — [`User`], the tagged [`Session`] variant
//!    (challenge | play), and the whole-state [`Snapshot`] document.
//! 2. **Persistence** — the [`PersistenceStore`] load/atomic-save
//!    contract ([`JsonFileStore`], [`MemoryStore`]) plus [`StateHandle`],
//!    which serializes every read-mutate-write cycle with an optimistic
//!    version check.
//!
//! # How it fits in the stack
//!
//! ```text
//! auth / session / ledger / rank  ← mutate state through StateHandle
//!     ↕
//! Store layer (this crate)        ← owns the snapshot and its durability
//! ```

#![allow(async_fn_in_trait)]

mod error;
mod model;
mod state;
mod store;

pub use error::StoreError;
pub use model::{
    now_ms, PendingWithdrawal, PlaySession, Session, SessionId, Snapshot, User, WalletId,
};
pub use state::StateHandle;
pub use store::{JsonFileStore, MemoryStore, PersistenceStore};
