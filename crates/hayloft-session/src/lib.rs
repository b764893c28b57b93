//! Play-session lifecycle for Hayloft.
//!
//! This crate owns the server side of a round:
//!
//! 1. **Session minting** — an alive play session bound to a wallet
//!    ([`SessionManager::start_session`])
//! 2. **Liveness** — clamped heartbeat accrual of server-trusted elapsed
//!    time ([`SessionManager::heartbeat`]) and the periodic sweep that
//!    ends silent sessions ([`SessionManager::sweep`])
//! 3. **Identity** — wallet rebinding with the abandon-round policy
//!    ([`SessionManager::rebind_wallet`])
//! 4. **Round end** — idempotent settlement and terminal transition
//!    ([`SessionManager::end_round`])
//!
//! # How it fits in the stack
//!
//! ```text
//! HTTP API (above)      ← heartbeat / gameover / disconnect endpoints
//!     ↕
//! Session layer (this crate) ── uses the ledger's watermark settlement
//!     ↕
//! Store layer (below)   ← sessions and users in the snapshot
//! ```

mod config;
mod error;
mod manager;

pub use config::SessionConfig;
pub use error::SessionError;
pub use manager::{Heartbeat, SessionManager, SweepReport};
